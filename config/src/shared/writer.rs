use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration for the tabular output writer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WriterConfig {
    /// Cell count (rows × cols) above which a write emits a sizing warning.
    #[serde(default = "default_soft_cell_limit")]
    pub soft_cell_limit: u64,
    /// Cell count (rows × cols) above which a write is rejected outright.
    #[serde(default = "default_hard_cell_limit")]
    pub hard_cell_limit: u64,
}

impl WriterConfig {
    /// Default soft warning threshold.
    pub const DEFAULT_SOFT_CELL_LIMIT: u64 = 100_000;

    /// Default hard rejection threshold.
    pub const DEFAULT_HARD_CELL_LIMIT: u64 = 1_000_000;

    /// Validates writer configuration settings.
    ///
    /// Ensures both ceilings are non-zero and ordered.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hard_cell_limit == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "writer.hard_cell_limit",
                constraint: "must be greater than 0",
            });
        }

        if self.soft_cell_limit > self.hard_cell_limit {
            return Err(ValidationError::InvalidFieldValue {
                field: "writer.soft_cell_limit",
                constraint: "must not exceed hard_cell_limit",
            });
        }

        Ok(())
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            soft_cell_limit: default_soft_cell_limit(),
            hard_cell_limit: default_hard_cell_limit(),
        }
    }
}

fn default_soft_cell_limit() -> u64 {
    WriterConfig::DEFAULT_SOFT_CELL_LIMIT
}

fn default_hard_cell_limit() -> u64 {
    WriterConfig::DEFAULT_HARD_CELL_LIMIT
}
