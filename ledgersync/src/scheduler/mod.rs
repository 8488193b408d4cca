//! Trigger scheduling: enable/disable, fire handling, and reconciliation.
//!
//! The scheduler owns the mapping between datasets and the host's recurring
//! triggers. It is written to be crash-consistent against a host that can
//! lose or leak triggers: every fire re-validates the mapping, orphaned
//! triggers are deleted on sight, and [`Scheduler::reconcile`] repairs drift
//! in both directions.

pub mod lock;
pub mod triggers;

use std::collections::BTreeSet;
use std::future::Future;

use tracing::{debug, info, warn};

use crate::dataset::Dataset;
use crate::error::{ErrorKind, SyncResult};
use crate::jobs::Job;
use crate::scheduler::lock::RealmLock;
use crate::scheduler::triggers::TriggerHost;
use crate::session::SessionStore;
use crate::store::{DatasetStore, TriggerStore};
use crate::sync_error;

/// Trait for the component that actually runs a dataset when its trigger
/// fires. The job runner implements this.
pub trait RunExecutor {
    /// Runs the dataset to completion, returning the terminal job record.
    fn execute(&self, dataset: Dataset) -> impl Future<Output = SyncResult<Job>> + Send;
}

/// Repairs applied by a reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Host triggers deleted because no mapping referenced them.
    pub orphan_triggers_removed: u32,
    /// Mappings dropped because their host trigger no longer existed.
    pub stale_mappings_removed: u32,
    /// Triggers recreated for datasets whose schedule is still enabled.
    pub triggers_recreated: u32,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Trigger cap usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerHeadroom {
    pub cap: u32,
    pub used: u32,
    pub remaining: u32,
    /// True when the host would refuse the next trigger creation.
    pub limit_exceeded: bool,
}

/// Scheduler over a record store, the host trigger subsystem, the per-realm
/// lock, and a run executor.
#[derive(Debug, Clone)]
pub struct Scheduler<St, H, L, Se, E> {
    store: St,
    host: H,
    lock: L,
    session: Se,
    executor: E,
}

impl<St, H, L, Se, E> Scheduler<St, H, L, Se, E>
where
    St: DatasetStore + TriggerStore,
    H: TriggerHost,
    L: RealmLock,
    Se: SessionStore,
    E: RunExecutor,
{
    pub fn new(store: St, host: H, lock: L, session: Se, executor: E) -> Self {
        Self {
            store,
            host,
            lock,
            session,
            executor,
        }
    }

    /// Creates a host trigger matching the dataset's enabled schedule and
    /// returns its id.
    ///
    /// Any previously mapped trigger is deleted first so that a schedule edit
    /// reshapes the host trigger; after the call exactly one live trigger is
    /// mapped to the dataset.
    pub async fn enable(&self, dataset_id: &str) -> SyncResult<String> {
        let dataset = self
            .store
            .get_dataset(dataset_id)
            .await?
            .ok_or_else(|| sync_error!(ErrorKind::NotFound, "Dataset not found"))?;

        let schedule = match &dataset.schedule {
            Some(schedule) if schedule.enabled => schedule.clone(),
            _ => {
                return Err(sync_error!(
                    ErrorKind::InvalidState,
                    "Dataset has no enabled schedule"
                ));
            }
        };

        if let Some(existing) = self.store.trigger_for_dataset(dataset_id).await? {
            // Deleting first frees cap headroom and guarantees the new
            // trigger carries the current schedule shape.
            self.host.delete_trigger(&existing).await?;
            self.store.unlink_dataset(dataset_id).await?;
            debug!(dataset_id, trigger_id = %existing, "replacing existing trigger");
        }

        let trigger_id = self.host.create_trigger(&schedule).await?;
        self.store.link_trigger(dataset_id, &trigger_id).await?;
        info!(dataset_id, trigger_id = %trigger_id, "schedule enabled");

        Ok(trigger_id)
    }

    /// Removes the dataset's trigger and mapping. Idempotent.
    pub async fn disable(&self, dataset_id: &str) -> SyncResult<()> {
        if let Some(trigger_id) = self.store.unlink_dataset(dataset_id).await? {
            self.host.delete_trigger(&trigger_id).await?;
            info!(dataset_id, trigger_id = %trigger_id, "schedule disabled");
        }

        Ok(())
    }

    /// Handles a trigger firing.
    ///
    /// Never propagates an error into the host's trigger callback: failures
    /// are logged and the fire is dropped. Returns the job when a run was
    /// started, `None` when the fire was skipped (orphan trigger, disabled
    /// schedule, or realm lock contention).
    pub async fn handle_trigger_fire(&self, trigger_id: &str) -> Option<Job> {
        match self.try_handle_fire(trigger_id).await {
            Ok(job) => job,
            Err(err) => {
                warn!(trigger_id, error = %err, "trigger fire failed");
                None
            }
        }
    }

    async fn try_handle_fire(&self, trigger_id: &str) -> SyncResult<Option<Job>> {
        let Some(dataset_id) = self.store.dataset_for_trigger(trigger_id).await? else {
            // Orphan: the host kept firing a trigger nothing maps to.
            self.host.delete_trigger(trigger_id).await?;
            info!(trigger_id, "removed orphan trigger");
            return Ok(None);
        };

        let dataset = match self.store.get_dataset(&dataset_id).await? {
            Some(dataset) if dataset.schedule_enabled() => dataset,
            _ => {
                // The dataset is gone or its schedule was turned off without
                // going through `disable`; clean up on the way out.
                self.store.unlink_trigger(trigger_id).await?;
                self.host.delete_trigger(trigger_id).await?;
                info!(trigger_id, dataset_id = %dataset_id, "removed trigger without an enabled schedule");
                return Ok(None);
            }
        };

        let realm_id = self.session.realm_id().await?;
        let Some(token) = self.lock.acquire(&realm_id).await? else {
            debug!(dataset_id = %dataset.id, "realm lock held, skipping scheduled run");
            return Ok(None);
        };

        let result = self.executor.execute(dataset).await;
        // Release before inspecting the result so a failed run cannot leak
        // the lock.
        self.lock.release(token).await?;

        match result {
            Ok(job) => Ok(Some(job)),
            Err(err) => {
                warn!(dataset_id = %dataset_id, error = %err, "scheduled run failed");
                Ok(None)
            }
        }
    }

    /// Repairs drift between the stored mapping and the host's trigger set.
    pub async fn reconcile(&self) -> SyncResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let live: BTreeSet<String> = self.host.list_triggers().await?.into_iter().collect();

        for (dataset_id, trigger_id) in self.store.trigger_mappings().await? {
            if live.contains(&trigger_id) {
                continue;
            }

            self.store.unlink_dataset(&dataset_id).await?;
            report.stale_mappings_removed += 1;

            let still_enabled = self
                .store
                .get_dataset(&dataset_id)
                .await?
                .is_some_and(|dataset| dataset.schedule_enabled());
            if still_enabled {
                match self.enable(&dataset_id).await {
                    Ok(_) => report.triggers_recreated += 1,
                    Err(err) => {
                        warn!(dataset_id = %dataset_id, error = %err, "failed to recreate trigger");
                    }
                }
            }
        }

        for trigger_id in live {
            let Some(dataset_id) = self.store.dataset_for_trigger(&trigger_id).await? else {
                self.host.delete_trigger(&trigger_id).await?;
                report.orphan_triggers_removed += 1;
                continue;
            };

            // A live trigger must resolve back to an enabled dataset; one
            // mapped to a deleted dataset or a disabled schedule goes too.
            let enabled = self
                .store
                .get_dataset(&dataset_id)
                .await?
                .is_some_and(|dataset| dataset.schedule_enabled());
            if !enabled {
                self.store.unlink_trigger(&trigger_id).await?;
                self.host.delete_trigger(&trigger_id).await?;
                report.orphan_triggers_removed += 1;
            }
        }

        if !report.is_clean() {
            info!(?report, "reconciled trigger state");
        }

        Ok(report)
    }

    /// Reports how much of the host's trigger cap remains.
    pub async fn headroom(&self) -> SyncResult<TriggerHeadroom> {
        let cap = self.host.trigger_cap();
        let used = self.host.list_triggers().await?.len() as u32;

        Ok(TriggerHeadroom {
            cap,
            used,
            remaining: cap.saturating_sub(used),
            limit_exceeded: used >= cap,
        })
    }
}
