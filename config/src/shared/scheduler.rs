use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration for the recurring-schedule trigger manager.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Hard per-user cap on concurrent recurring triggers imposed by the host.
    #[serde(default = "default_trigger_cap")]
    pub trigger_cap: u32,
    /// Time-to-live, in milliseconds, of the realm-scoped execution lock.
    ///
    /// The lock expires on its own after this interval so that a run cut off by
    /// the host's wall-clock ceiling cannot wedge future scheduled runs.
    #[serde(default = "default_lock_ttl_ms")]
    pub lock_ttl_ms: u64,
}

impl SchedulerConfig {
    /// Default host trigger cap.
    pub const DEFAULT_TRIGGER_CAP: u32 = 20;

    /// Default realm lock time-to-live in milliseconds.
    pub const DEFAULT_LOCK_TTL_MS: u64 = 30_000;

    /// Validates scheduler configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.trigger_cap == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "scheduler.trigger_cap",
                constraint: "must be greater than 0",
            });
        }

        if self.lock_ttl_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "scheduler.lock_ttl_ms",
                constraint: "must be greater than 0",
            });
        }

        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            trigger_cap: default_trigger_cap(),
            lock_ttl_ms: default_lock_ttl_ms(),
        }
    }
}

fn default_trigger_cap() -> u32 {
    SchedulerConfig::DEFAULT_TRIGGER_CAP
}

fn default_lock_ttl_ms() -> u64 {
    SchedulerConfig::DEFAULT_LOCK_TTL_MS
}
