//! Dataset execution and scheduling engine.
//!
//! Connects a hosted spreadsheet document to a remote accounting service:
//! datasets describe what to fetch (a standard report or an ad-hoc
//! read-query) and where to write it, the job runner executes them through a
//! resilient API client, and the scheduler keeps recurring host triggers in
//! step with each dataset's schedule.

pub mod client;
pub mod dataset;
pub mod error;
pub mod grid;
pub mod jobs;
mod macros;
pub mod query;
pub mod registry;
pub mod runner;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod table;
pub mod transform;
pub mod writer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
