//! Document surface: A1 addressing, the [`Spreadsheet`] trait, and an
//! in-memory implementation.

pub mod address;
pub mod base;
pub mod memory;

pub use address::{A1ParseError, CellRef, GridRange};
pub use base::{SheetId, SheetInfo, Spreadsheet};
pub use memory::MemorySpreadsheet;
