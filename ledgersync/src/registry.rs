//! Dataset registry: the single owner of dataset records.
//!
//! All creation, mutation, and deletion of datasets flows through the
//! registry, which validates inputs before touching the store and bumps the
//! record's version counter on every mutation.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::dataset::{
    Dataset, DatasetParams, LastWrite, Pagination, Schedule, Target, validate_name,
};
use crate::error::{ErrorKind, SyncResult};
use crate::query;
use crate::store::DatasetStore;
use crate::sync_error;

/// Input for creating a dataset.
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub name: String,
    pub params: DatasetParams,
    pub target: Target,
    pub pagination: Pagination,
    pub schedule: Option<Schedule>,
}

/// Partial update applied to an existing dataset. `None` fields are left
/// untouched; `schedule` uses a double option so that `Some(None)` clears the
/// schedule while `None` keeps it.
#[derive(Debug, Clone, Default)]
pub struct DatasetUpdate {
    pub name: Option<String>,
    pub params: Option<DatasetParams>,
    pub target: Option<Target>,
    pub pagination: Option<Pagination>,
    pub schedule: Option<Option<Schedule>>,
}

/// Registry of dataset definitions backed by a [`DatasetStore`].
#[derive(Debug, Clone)]
pub struct DatasetRegistry<S> {
    store: S,
}

impl<S> DatasetRegistry<S>
where
    S: DatasetStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Validates and persists a new dataset, returning the stored record.
    pub async fn create(&self, new: NewDataset) -> SyncResult<Dataset> {
        validate_name(&new.name)?;
        validate_params(&new.params)?;
        if let Some(schedule) = &new.schedule {
            schedule.validate()?;
        }

        let mut target = new.target;
        target.normalize();

        let now = Utc::now();
        let dataset = Dataset {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            params: new.params,
            target,
            pagination: new.pagination,
            schedule: new.schedule,
            last_write: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.store.put_dataset(dataset.clone()).await?;
        info!(dataset_id = %dataset.id, name = %dataset.name, "dataset created");

        Ok(dataset)
    }

    /// Applies a partial update and persists the result.
    pub async fn update(&self, id: &str, update: DatasetUpdate) -> SyncResult<Dataset> {
        let mut dataset = self.require(id).await?;

        if let Some(name) = update.name {
            validate_name(&name)?;
            dataset.name = name;
        }

        if let Some(params) = update.params {
            validate_params(&params)?;
            dataset.params = params;
        }

        if let Some(mut target) = update.target {
            target.normalize();
            dataset.target = target;
        }

        if let Some(pagination) = update.pagination {
            dataset.pagination = pagination;
        }

        if let Some(schedule) = update.schedule {
            if let Some(schedule) = &schedule {
                schedule.validate()?;
            }
            dataset.schedule = schedule;
        }

        dataset.version += 1;
        dataset.updated_at = Utc::now();

        self.store.put_dataset(dataset.clone()).await?;
        info!(dataset_id = %dataset.id, version = dataset.version, "dataset updated");

        Ok(dataset)
    }

    /// Deletes a dataset record.
    ///
    /// Trigger detachment is the scheduler's concern; callers that own a
    /// scheduler should disable the schedule before deleting.
    pub async fn delete(&self, id: &str) -> SyncResult<()> {
        if !self.store.delete_dataset(id).await? {
            return Err(sync_error!(ErrorKind::NotFound, "Dataset not found"));
        }
        info!(dataset_id = %id, "dataset deleted");

        Ok(())
    }

    pub async fn get(&self, id: &str) -> SyncResult<Option<Dataset>> {
        self.store.get_dataset(id).await
    }

    /// Returns the dataset or a [`ErrorKind::NotFound`] error.
    pub async fn require(&self, id: &str) -> SyncResult<Dataset> {
        self.store
            .get_dataset(id)
            .await?
            .ok_or_else(|| sync_error!(ErrorKind::NotFound, "Dataset not found"))
    }

    pub async fn list(&self) -> SyncResult<Vec<Dataset>> {
        self.store.list_datasets().await
    }

    /// Records the outcome of a successful write on the dataset, bumping the
    /// version so pollers observe the change.
    pub async fn record_last_write(&self, id: &str, last_write: LastWrite) -> SyncResult<Dataset> {
        let mut dataset = self.require(id).await?;
        dataset.last_write = Some(last_write);
        dataset.version += 1;
        dataset.updated_at = Utc::now();

        self.store.put_dataset(dataset.clone()).await?;

        Ok(dataset)
    }
}

/// Validates fetch parameters without touching the network.
fn validate_params(params: &DatasetParams) -> SyncResult<()> {
    match params {
        DatasetParams::Standard { report, .. } => {
            if report.trim().is_empty() {
                return Err(sync_error!(
                    ErrorKind::ValidationError,
                    "Standard dataset requires a report name"
                ));
            }
        }
        DatasetParams::Query { query: text } => {
            // Reject malformed queries and disallowed entities at save time.
            query::parse(text)?;
        }
    }

    Ok(())
}
