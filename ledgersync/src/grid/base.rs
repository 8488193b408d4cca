use std::future::Future;

use crate::error::SyncResult;
use crate::grid::address::{CellRef, GridRange};
use crate::table::{CellValue, DataTable};

/// Stable identifier of a sheet within the document.
pub type SheetId = i64;

/// Identity of a resolved sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub id: SheetId,
    pub name: String,
}

/// Trait for the host document surface the output writer mutates.
///
/// Implementations wrap whatever spreadsheet backend the engine runs against:
/// sheet lookup and creation, rectangular reads/writes, region clears, and
/// named-range maintenance. All operations are scoped to a single document.
///
/// Implementations should ensure thread-safety and handle concurrent access.
pub trait Spreadsheet {
    /// Resolves a sheet by its stable id.
    fn sheet_by_id(&self, id: SheetId) -> impl Future<Output = SyncResult<Option<SheetInfo>>> + Send;

    /// Resolves a sheet by its display name.
    fn sheet_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = SyncResult<Option<SheetInfo>>> + Send;

    /// Creates a new sheet with the given name.
    ///
    /// Fails with [`crate::error::ErrorKind::SheetError`] if the name is taken;
    /// callers de-duplicate names before creating.
    fn add_sheet(&self, name: &str) -> impl Future<Output = SyncResult<SheetInfo>> + Send;

    /// Lists every sheet in the document.
    fn list_sheets(&self) -> impl Future<Output = SyncResult<Vec<SheetInfo>>> + Send;

    /// Writes the table (header row first) with its top-left cell at `origin`.
    fn write_table(
        &self,
        sheet: SheetId,
        origin: CellRef,
        table: &DataTable,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Clears every cell in the given region.
    fn clear_range(
        &self,
        sheet: SheetId,
        range: GridRange,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Reads a single cell; absent cells read as [`CellValue::Empty`].
    fn read_cell(
        &self,
        sheet: SheetId,
        cell: CellRef,
    ) -> impl Future<Output = SyncResult<CellValue>> + Send;

    /// Points the named range at the given region, replacing any previous definition.
    fn set_named_range(
        &self,
        name: &str,
        sheet: SheetId,
        range: GridRange,
    ) -> impl Future<Output = SyncResult<()>> + Send;

    /// Removes a named range; absent names are a no-op.
    fn delete_named_range(&self, name: &str) -> impl Future<Output = SyncResult<()>> + Send;

    /// Resolves a named range to its current region.
    fn named_range(
        &self,
        name: &str,
    ) -> impl Future<Output = SyncResult<Option<(SheetId, GridRange)>>> + Send;
}
