//! Job runner: executes one dataset end to end.
//!
//! A run moves through fixed checkpoints (connect, fetch, transform, write,
//! finalize), persisting the job record at each step so pollers observe
//! progress. Run failures are captured on the job record rather than
//! propagated: a failed fetch produces a `Failed` job, not an error from
//! [`JobRunner::run`].

use std::time::Instant;

use chrono::Utc;
use tracing::{error, info};

use crate::client::transport::ApiTransport;
use crate::client::{ApiClient, QueryOptions, QueryResult};
use crate::dataset::{Dataset, DatasetParams, LastWrite};
use crate::error::SyncResult;
use crate::grid::Spreadsheet;
use crate::jobs::{Checkpoint, Job, JobResult};
use crate::query;
use crate::registry::DatasetRegistry;
use crate::scheduler::RunExecutor;
use crate::session::{SessionStore, TokenRefresher};
use crate::store::{DatasetStore, JobStore};
use crate::table::{CellValue, DataTable};
use crate::transform;
use crate::writer::OutputWriter;

/// Runs datasets: fetch, transform, write, record.
#[derive(Debug, Clone)]
pub struct JobRunner<T, Se, R, G, D, J> {
    client: ApiClient<T, Se, R>,
    writer: OutputWriter<G>,
    registry: DatasetRegistry<D>,
    jobs: J,
}

impl<T, Se, R, G, D, J> JobRunner<T, Se, R, G, D, J>
where
    T: ApiTransport + Sync,
    Se: SessionStore + Sync,
    R: TokenRefresher + Sync,
    G: Spreadsheet + Sync,
    D: DatasetStore + Sync,
    J: JobStore + Sync,
{
    pub fn new(
        client: ApiClient<T, Se, R>,
        writer: OutputWriter<G>,
        registry: DatasetRegistry<D>,
        jobs: J,
    ) -> Self {
        Self {
            client,
            writer,
            registry,
            jobs,
        }
    }

    /// Runs a dataset by id.
    ///
    /// Returns the terminal job record; run failures are recorded on the job.
    /// The error path is reserved for failures to look up the dataset or to
    /// persist the job itself.
    pub async fn run(&self, dataset_id: &str) -> SyncResult<Job> {
        let dataset = self.registry.require(dataset_id).await?;
        self.run_dataset(dataset).await
    }

    /// Runs every dataset sequentially, in store order.
    pub async fn run_all(&self) -> SyncResult<Vec<Job>> {
        let mut jobs = Vec::new();
        for dataset in self.registry.list().await? {
            jobs.push(self.run_dataset(dataset).await?);
        }

        Ok(jobs)
    }

    async fn run_dataset(&self, dataset: Dataset) -> SyncResult<Job> {
        let mut job = Job::new(&dataset.id);
        self.jobs.put_job(job.clone()).await?;

        let started = Instant::now();
        match self.execute_steps(&dataset, &mut job, started).await {
            Ok(result) => {
                info!(
                    dataset_id = %dataset.id,
                    rows = result.rows,
                    duration_ms = result.duration_ms,
                    "run completed"
                );
                job.complete(result);
            }
            Err(err) => {
                error!(dataset_id = %dataset.id, error = %err, "run failed");
                job.fail(err.user_message());
            }
        }

        self.jobs.put_job(job.clone()).await?;

        Ok(job)
    }

    async fn execute_steps(
        &self,
        dataset: &Dataset,
        job: &mut Job,
        started: Instant,
    ) -> SyncResult<JobResult> {
        // The company-info probe verifies the session (refreshing the token
        // if needed) before the real fetch starts.
        self.advance(job, Checkpoint::Connecting).await?;
        self.client.company_info().await?;

        self.advance(job, Checkpoint::Fetching).await?;
        let fetched = match &dataset.params {
            DatasetParams::Query { query: text } => {
                let parsed = query::parse(text)?;
                let options = QueryOptions {
                    start_position: dataset.pagination.start_position,
                    max_results: dataset.pagination.max_results,
                };
                Fetched::Query(self.client.query(&parsed, options).await?)
            }
            DatasetParams::Standard { report, filters } => {
                let filters = filters
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()));
                Fetched::Report(self.client.report(report, filters).await?)
            }
        };

        self.advance(job, Checkpoint::Transforming).await?;
        let table = match fetched {
            Fetched::Query(result) => match result.total_count {
                Some(count) => count_table(count),
                None => transform::query_rows_to_table(&result.rows),
            },
            Fetched::Report(report) => transform::report_to_table(&report),
        };

        self.advance(job, Checkpoint::Writing).await?;
        let outcome = self
            .writer
            .write(&dataset.target, &table, dataset.last_write.as_ref())
            .await?;

        self.advance(job, Checkpoint::Finalizing).await?;
        self.registry
            .record_last_write(
                &dataset.id,
                LastWrite {
                    rows: outcome.rows,
                    cols: outcome.cols,
                    wrote_at: Utc::now(),
                    sheet_id: outcome.sheet_id,
                    range_a1: outcome.range_a1.clone(),
                    schema_hash: outcome.schema_hash.clone(),
                },
            )
            .await?;

        Ok(JobResult {
            rows: outcome.rows,
            cols: outcome.cols,
            sheet_name: outcome.sheet_name,
            range_a1: outcome.range_a1,
            duration_ms: started.elapsed().as_millis() as u64,
            schema_changed: outcome.schema_changed,
            warnings: outcome.warnings,
        })
    }

    async fn advance(&self, job: &mut Job, checkpoint: Checkpoint) -> SyncResult<()> {
        job.checkpoint(checkpoint);
        self.jobs.put_job(job.clone()).await
    }
}

enum Fetched {
    Query(QueryResult),
    Report(serde_json::Value),
}

/// Single-cell table for `COUNT(*)` query results.
fn count_table(count: u64) -> DataTable {
    let mut table = DataTable::new(vec!["Count".to_string()]);
    table.push_row(vec![CellValue::Number(count as f64)]);
    table
}

impl<T, Se, R, G, D, J> RunExecutor for JobRunner<T, Se, R, G, D, J>
where
    T: ApiTransport + Sync,
    Se: SessionStore + Sync,
    R: TokenRefresher + Sync,
    G: Spreadsheet + Sync,
    D: DatasetStore + Sync,
    J: JobStore + Sync,
{
    async fn execute(&self, dataset: Dataset) -> SyncResult<Job> {
        self.run_dataset(dataset).await
    }
}
