//! Typed configuration for the LedgerSync engine.
//!
//! Configuration is loaded hierarchically from a `configuration/` directory
//! (base file plus environment overrides) and `APP_`-prefixed environment
//! variables, then deserialized into the typed structures in [`shared`].

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
