//! Ephemeral job records tracking a single dataset run.
//!
//! A job is created when a run starts, mutated in place as progress advances
//! through fixed checkpoints, and reaches exactly one terminal state. Jobs are
//! never reused across runs; a polling caller observes coarse-grained progress
//! through the checkpoint percentages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job identifier (UUID text, `job_<id>` key shape in the store).
pub type JobId = String;

/// Lifecycle state of a job. `Running` transitions to exactly one of the
/// terminal states; a run cut off by the host's wall-clock ceiling is left
/// `Running` with no further update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

/// Fixed progress checkpoints a run passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Connecting,
    Fetching,
    Transforming,
    Writing,
    Finalizing,
}

impl Checkpoint {
    /// Progress percentage reported at this checkpoint.
    pub fn progress(self) -> u8 {
        match self {
            Checkpoint::Connecting => 10,
            Checkpoint::Fetching => 30,
            Checkpoint::Transforming => 60,
            Checkpoint::Writing => 80,
            Checkpoint::Finalizing => 95,
        }
    }

    /// Human-readable progress message.
    pub fn message(self) -> &'static str {
        match self {
            Checkpoint::Connecting => "connecting to the remote service",
            Checkpoint::Fetching => "fetching data",
            Checkpoint::Transforming => "transforming results",
            Checkpoint::Writing => "writing output",
            Checkpoint::Finalizing => "finalizing run",
        }
    }
}

/// Result envelope carried by a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub rows: u32,
    pub cols: u32,
    pub sheet_name: String,
    pub range_a1: String,
    pub duration_ms: u64,
    /// True when the schema fingerprint changed relative to the previous run.
    pub schema_changed: bool,
    /// Warnings raised during the write, echoed into the job message.
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// A single dataset run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub dataset_id: String,
    pub status: JobStatus,
    /// 0-100, monotonically non-decreasing.
    pub progress: u8,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result: Option<JobResult>,
}

impl Job {
    /// Creates a fresh running job for a dataset.
    pub fn new(dataset_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            dataset_id: dataset_id.into(),
            status: JobStatus::Running,
            progress: 0,
            message: "starting".to_string(),
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            result: None,
        }
    }

    /// Advances to a checkpoint. Progress never moves backwards.
    pub fn checkpoint(&mut self, checkpoint: Checkpoint) {
        self.progress = self.progress.max(checkpoint.progress());
        self.message = checkpoint.message().to_string();
    }

    /// Marks the job completed with its result envelope. Write warnings are
    /// folded into the message so pollers see them without reading the result.
    pub fn complete(&mut self, result: JobResult) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.message = if result.warnings.is_empty() {
            "completed".to_string()
        } else {
            format!("completed with warnings: {}", result.warnings.join("; "))
        };
        self.finished_at = Some(Utc::now());
        self.result = Some(result);
    }

    /// Marks the job failed with a human-readable message.
    pub fn fail(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.status = JobStatus::Failed;
        self.message = error.clone();
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.status != JobStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_monotone() {
        let mut job = Job::new("ds-1");
        job.checkpoint(Checkpoint::Writing);
        assert_eq!(job.progress, 80);

        // A stale earlier checkpoint cannot move progress backwards.
        job.checkpoint(Checkpoint::Fetching);
        assert_eq!(job.progress, 80);
    }

    #[test]
    fn completion_is_terminal() {
        let mut job = Job::new("ds-1");
        job.complete(JobResult {
            rows: 2,
            cols: 3,
            sheet_name: "Data".into(),
            range_a1: "A1:C3".into(),
            duration_ms: 12,
            schema_changed: false,
            warnings: Vec::new(),
        });

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.message, "completed");
        assert!(job.is_terminal());
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn completion_message_carries_write_warnings() {
        let mut job = Job::new("ds-1");
        job.complete(JobResult {
            rows: 1,
            cols: 1,
            sheet_name: "Data".into(),
            range_a1: "A1:A2".into(),
            duration_ms: 3,
            schema_changed: true,
            warnings: vec!["output schema changed since the previous run".into()],
        });

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.message.contains("schema changed"));
    }

    #[test]
    fn failure_records_error_message() {
        let mut job = Job::new("ds-1");
        job.fail("Query rejected: unknown entity");

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("Query rejected: unknown entity"));
    }
}
