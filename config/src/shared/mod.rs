//! Shared configuration types for the LedgerSync engine.

mod api;
mod engine;
mod scheduler;
mod writer;

pub use api::ApiClientConfig;
pub use engine::EngineConfig;
pub use scheduler::SchedulerConfig;
pub use writer::WriterConfig;

use thiserror::Error;

/// Errors raised when validating configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A numeric or string field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue {
        field: &'static str,
        constraint: &'static str,
    },
}
