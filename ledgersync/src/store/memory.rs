use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::dataset::{Dataset, DatasetId};
use crate::error::SyncResult;
use crate::jobs::{Job, JobId};
use crate::store::base::{DatasetStore, JobStore, TriggerStore};

/// Inner state of [`MemoryStore`].
#[derive(Debug, Default)]
struct Inner {
    /// Dataset records keyed by id; the map doubles as the index list.
    datasets: BTreeMap<DatasetId, Dataset>,
    /// Ephemeral job records keyed by id.
    jobs: HashMap<JobId, Job>,
    /// Forward half of the trigger mapping.
    dataset_to_trigger: HashMap<DatasetId, String>,
    /// Reverse half of the trigger mapping.
    trigger_to_dataset: HashMap<String, DatasetId>,
}

/// In-memory storage for dataset, job, and trigger-mapping records.
///
/// [`MemoryStore`] implements [`DatasetStore`], [`JobStore`], and
/// [`TriggerStore`], providing a complete storage solution that keeps all data
/// in memory. This is ideal for testing, development, and scenarios where
/// persistence is not required; all records are lost on process restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Creates a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DatasetStore for MemoryStore {
    async fn get_dataset(&self, id: &str) -> SyncResult<Option<Dataset>> {
        let inner = self.inner.lock().await;

        Ok(inner.datasets.get(id).cloned())
    }

    async fn list_datasets(&self) -> SyncResult<Vec<Dataset>> {
        let inner = self.inner.lock().await;

        Ok(inner.datasets.values().cloned().collect())
    }

    async fn put_dataset(&self, dataset: Dataset) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.datasets.insert(dataset.id.clone(), dataset);

        Ok(())
    }

    async fn delete_dataset(&self, id: &str) -> SyncResult<bool> {
        let mut inner = self.inner.lock().await;

        Ok(inner.datasets.remove(id).is_some())
    }
}

impl JobStore for MemoryStore {
    async fn get_job(&self, id: &str) -> SyncResult<Option<Job>> {
        let inner = self.inner.lock().await;

        Ok(inner.jobs.get(id).cloned())
    }

    async fn put_job(&self, job: Job) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.jobs.insert(job.id.clone(), job);

        Ok(())
    }

    async fn delete_job(&self, id: &JobId) -> SyncResult<bool> {
        let mut inner = self.inner.lock().await;

        Ok(inner.jobs.remove(id).is_some())
    }
}

impl TriggerStore for MemoryStore {
    async fn trigger_for_dataset(&self, dataset_id: &str) -> SyncResult<Option<String>> {
        let inner = self.inner.lock().await;

        Ok(inner.dataset_to_trigger.get(dataset_id).cloned())
    }

    async fn dataset_for_trigger(&self, trigger_id: &str) -> SyncResult<Option<DatasetId>> {
        let inner = self.inner.lock().await;

        Ok(inner.trigger_to_dataset.get(trigger_id).cloned())
    }

    async fn link_trigger(&self, dataset_id: &str, trigger_id: &str) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        // Replace any previous mapping for this dataset, both directions.
        if let Some(old_trigger) = inner.dataset_to_trigger.remove(dataset_id) {
            inner.trigger_to_dataset.remove(&old_trigger);
        }

        inner
            .dataset_to_trigger
            .insert(dataset_id.to_string(), trigger_id.to_string());
        inner
            .trigger_to_dataset
            .insert(trigger_id.to_string(), dataset_id.to_string());

        Ok(())
    }

    async fn unlink_dataset(&self, dataset_id: &str) -> SyncResult<Option<String>> {
        let mut inner = self.inner.lock().await;

        let trigger_id = inner.dataset_to_trigger.remove(dataset_id);
        if let Some(trigger_id) = &trigger_id {
            inner.trigger_to_dataset.remove(trigger_id);
        }

        Ok(trigger_id)
    }

    async fn unlink_trigger(&self, trigger_id: &str) -> SyncResult<Option<DatasetId>> {
        let mut inner = self.inner.lock().await;

        let dataset_id = inner.trigger_to_dataset.remove(trigger_id);
        if let Some(dataset_id) = &dataset_id {
            inner.dataset_to_trigger.remove(dataset_id);
        }

        Ok(dataset_id)
    }

    async fn trigger_mappings(&self) -> SyncResult<Vec<(DatasetId, String)>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .dataset_to_trigger
            .iter()
            .map(|(dataset, trigger)| (dataset.clone(), trigger.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trigger_mapping_stays_bidirectional() {
        let store = MemoryStore::new();

        store.link_trigger("ds-1", "trig-1").await.unwrap();
        assert_eq!(
            store.dataset_for_trigger("trig-1").await.unwrap(),
            Some("ds-1".to_string())
        );

        // Relinking the dataset drops the stale reverse entry.
        store.link_trigger("ds-1", "trig-2").await.unwrap();
        assert_eq!(store.dataset_for_trigger("trig-1").await.unwrap(), None);
        assert_eq!(
            store.trigger_for_dataset("ds-1").await.unwrap(),
            Some("trig-2".to_string())
        );
    }

    #[tokio::test]
    async fn unlink_removes_both_directions() {
        let store = MemoryStore::new();
        store.link_trigger("ds-1", "trig-1").await.unwrap();

        let trigger = store.unlink_dataset("ds-1").await.unwrap();
        assert_eq!(trigger, Some("trig-1".to_string()));
        assert_eq!(store.dataset_for_trigger("trig-1").await.unwrap(), None);
        assert!(store.trigger_mappings().await.unwrap().is_empty());
    }
}
