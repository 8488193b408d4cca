//! Typed record stores: trait definitions and the in-memory implementation.

pub mod base;
pub mod memory;

pub use base::{DatasetStore, JobStore, TriggerStore};
pub use memory::MemoryStore;
