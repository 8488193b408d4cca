use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{ApiClientConfig, SchedulerConfig, ValidationError, WriterConfig};

/// Top-level configuration for a LedgerSync engine instance.
///
/// Aggregates the per-component settings and is the type services deserialize
/// through [`crate::load_config`].
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Remote API client settings.
    #[serde(default)]
    pub client: ApiClientConfig,
    /// Output writer settings.
    #[serde(default)]
    pub writer: WriterConfig,
    /// Scheduler and locking settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    /// Validates all component configuration sections.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.client.validate()?;
        self.writer.validate()?;
        self.scheduler.validate()?;

        Ok(())
    }
}

impl Config for EngineConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
