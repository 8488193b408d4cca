use std::future::Future;

use crate::dataset::{Dataset, DatasetId};
use crate::error::SyncResult;
use crate::jobs::{Job, JobId};

/// Trait for persisting dataset records.
///
/// Implementations wrap the host's key-value store. The key-space shape is one
/// record per dataset (`dataset_<id>`) plus a separate index list; the traits
/// expose typed records and keep the key encoding an implementation detail.
///
/// Implementations should ensure thread-safety and handle concurrent access.
pub trait DatasetStore {
    /// Returns the dataset with the given id, if present.
    fn get_dataset(
        &self,
        id: &str,
    ) -> impl Future<Output = SyncResult<Option<Dataset>>> + Send;

    /// Returns every dataset, ordered by id.
    fn list_datasets(&self) -> impl Future<Output = SyncResult<Vec<Dataset>>> + Send;

    /// Inserts or replaces a dataset record and its index entry.
    fn put_dataset(&self, dataset: Dataset) -> impl Future<Output = SyncResult<()>> + Send;

    /// Deletes a dataset record; returns whether it existed.
    fn delete_dataset(&self, id: &str) -> impl Future<Output = SyncResult<bool>> + Send;
}

/// Trait for ephemeral job records (`job_<id>` keys).
///
/// Jobs are short-lived: created at run start, mutated in place as progress
/// advances, queryable while active, and never reused across runs.
pub trait JobStore {
    fn get_job(&self, id: &str) -> impl Future<Output = SyncResult<Option<Job>>> + Send;

    fn put_job(&self, job: Job) -> impl Future<Output = SyncResult<()>> + Send;

    fn delete_job(&self, id: &JobId) -> impl Future<Output = SyncResult<bool>> + Send;
}

/// Trait for the bidirectional dataset ↔ trigger mapping.
///
/// Kept consistent with the host trigger subsystem's actual trigger set by the
/// scheduler's reconciliation pass.
pub trait TriggerStore {
    /// Resolves the trigger currently mapped to a dataset.
    fn trigger_for_dataset(
        &self,
        dataset_id: &str,
    ) -> impl Future<Output = SyncResult<Option<String>>> + Send;

    /// Resolves the dataset a trigger belongs to.
    fn dataset_for_trigger(
        &self,
        trigger_id: &str,
    ) -> impl Future<Output = SyncResult<Option<DatasetId>>> + Send;

    /// Records both directions of the mapping, replacing any previous entry
    /// for the dataset.
    fn link_trigger(
        &self,
        dataset_id: &str,
        trigger_id: &str,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Removes the mapping for a dataset; returns the trigger id it pointed at.
    fn unlink_dataset(
        &self,
        dataset_id: &str,
    ) -> impl Future<Output = SyncResult<Option<String>>> + Send;

    /// Removes the mapping for a trigger; returns the dataset id it pointed at.
    fn unlink_trigger(
        &self,
        trigger_id: &str,
    ) -> impl Future<Output = SyncResult<Option<DatasetId>>> + Send;

    /// Returns every (dataset id, trigger id) pair.
    fn trigger_mappings(
        &self,
    ) -> impl Future<Output = SyncResult<Vec<(DatasetId, String)>>> + Send;
}
