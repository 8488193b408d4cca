//! Recurring trigger host abstraction.
//!
//! The host platform owns the actual recurring triggers; the engine only
//! creates and deletes them and reconciles its mapping against the host's
//! view. Hosts cap the number of triggers a document may own, so creation can
//! fail with [`ErrorKind::TriggerLimitExceeded`].

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::dataset::{Schedule, ScheduleFrequency};
use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;

/// Trait for the host's recurring trigger subsystem.
pub trait TriggerHost {
    /// Creates a recurring trigger matching the schedule; returns its id.
    ///
    /// Fails with [`ErrorKind::TriggerLimitExceeded`] when the host refuses to
    /// create another trigger.
    fn create_trigger(&self, schedule: &Schedule) -> impl Future<Output = SyncResult<String>> + Send;

    /// Deletes a trigger. Deleting an unknown id is a no-op.
    fn delete_trigger(&self, trigger_id: &str) -> impl Future<Output = SyncResult<()>> + Send;

    /// Lists the ids of every trigger the engine owns.
    fn list_triggers(&self) -> impl Future<Output = SyncResult<Vec<String>>> + Send;

    /// The host's trigger cap.
    fn trigger_cap(&self) -> u32;
}

/// In-memory trigger host with a configurable cap. Remembers the schedule
/// each trigger was created from so tests can assert its shape.
#[derive(Debug, Clone)]
pub struct MemoryTriggerHost {
    cap: u32,
    triggers: Arc<Mutex<BTreeMap<String, Schedule>>>,
}

impl MemoryTriggerHost {
    pub fn new(cap: u32) -> Self {
        Self {
            cap,
            triggers: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Registers a trigger id directly, bypassing the schedule. Lets tests
    /// fabricate orphans the engine has no mapping for.
    pub async fn insert_raw(&self, trigger_id: impl Into<String>) {
        let placeholder = Schedule {
            enabled: true,
            frequency: ScheduleFrequency::Hourly,
            time_of_day: None,
            day_of_week: None,
            day_of_month: None,
        };
        self.triggers.lock().await.insert(trigger_id.into(), placeholder);
    }

    pub async fn contains(&self, trigger_id: &str) -> bool {
        self.triggers.lock().await.contains_key(trigger_id)
    }

    /// The schedule the trigger was created from, if it is live.
    pub async fn schedule_of(&self, trigger_id: &str) -> Option<Schedule> {
        self.triggers.lock().await.get(trigger_id).cloned()
    }
}

impl TriggerHost for MemoryTriggerHost {
    async fn create_trigger(&self, schedule: &Schedule) -> SyncResult<String> {
        let mut triggers = self.triggers.lock().await;

        if triggers.len() as u32 >= self.cap {
            return Err(sync_error!(
                ErrorKind::TriggerLimitExceeded,
                "Trigger cap reached",
                format!("cap {}", self.cap)
            ));
        }

        let id = Uuid::new_v4().to_string();
        triggers.insert(id.clone(), schedule.clone());

        Ok(id)
    }

    async fn delete_trigger(&self, trigger_id: &str) -> SyncResult<()> {
        self.triggers.lock().await.remove(trigger_id);

        Ok(())
    }

    async fn list_triggers(&self) -> SyncResult<Vec<String>> {
        Ok(self.triggers.lock().await.keys().cloned().collect())
    }

    fn trigger_cap(&self) -> u32 {
        self.cap
    }
}
