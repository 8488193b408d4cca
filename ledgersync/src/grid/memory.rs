use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{ErrorKind, SyncResult};
use crate::grid::address::{CellRef, GridRange};
use crate::grid::base::{SheetId, SheetInfo, Spreadsheet};
use crate::sync_error;
use crate::table::{CellValue, DataTable};

/// A single sheet's contents.
#[derive(Debug, Default)]
struct SheetData {
    name: String,
    /// Sparse cell storage keyed by (row, col).
    cells: HashMap<(u32, u32), CellValue>,
}

/// Inner state of [`MemorySpreadsheet`].
#[derive(Debug)]
struct Inner {
    sheets: BTreeMap<SheetId, SheetData>,
    named_ranges: HashMap<String, (SheetId, GridRange)>,
    next_sheet_id: SheetId,
}

/// In-memory document surface.
///
/// [`MemorySpreadsheet`] implements [`Spreadsheet`] entirely in memory. This is
/// ideal for tests and local development; contents are lost on process restart.
#[derive(Debug, Clone)]
pub struct MemorySpreadsheet {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySpreadsheet {
    /// Creates an empty document with no sheets.
    pub fn new() -> Self {
        let inner = Inner {
            sheets: BTreeMap::new(),
            named_ranges: HashMap::new(),
            next_sheet_id: 1,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Reads a cell by A1 reference and renders it as text. Test convenience.
    pub async fn cell_text(&self, sheet: SheetId, a1: &str) -> SyncResult<String> {
        let cell = CellRef::from_a1(a1)
            .map_err(|err| sync_error!(ErrorKind::SheetError, "Invalid cell reference", err))?;
        Ok(self.read_cell(sheet, cell).await?.as_text())
    }

    /// Number of non-empty cells on a sheet. Test convenience.
    pub async fn populated_cell_count(&self, sheet: SheetId) -> usize {
        let inner = self.inner.lock().await;
        inner
            .sheets
            .get(&sheet)
            .map(|data| {
                data.cells
                    .values()
                    .filter(|value| **value != CellValue::Empty)
                    .count()
            })
            .unwrap_or(0)
    }
}

impl Default for MemorySpreadsheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Spreadsheet for MemorySpreadsheet {
    async fn sheet_by_id(&self, id: SheetId) -> SyncResult<Option<SheetInfo>> {
        let inner = self.inner.lock().await;

        Ok(inner.sheets.get(&id).map(|data| SheetInfo {
            id,
            name: data.name.clone(),
        }))
    }

    async fn sheet_by_name(&self, name: &str) -> SyncResult<Option<SheetInfo>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .sheets
            .iter()
            .find(|(_, data)| data.name == name)
            .map(|(id, data)| SheetInfo {
                id: *id,
                name: data.name.clone(),
            }))
    }

    async fn add_sheet(&self, name: &str) -> SyncResult<SheetInfo> {
        let mut inner = self.inner.lock().await;

        if inner.sheets.values().any(|data| data.name == name) {
            return Err(sync_error!(
                ErrorKind::SheetError,
                "Sheet name already in use",
                name
            ));
        }

        let id = inner.next_sheet_id;
        inner.next_sheet_id += 1;
        inner.sheets.insert(
            id,
            SheetData {
                name: name.to_string(),
                cells: HashMap::new(),
            },
        );

        Ok(SheetInfo {
            id,
            name: name.to_string(),
        })
    }

    async fn list_sheets(&self) -> SyncResult<Vec<SheetInfo>> {
        let inner = self.inner.lock().await;

        Ok(inner
            .sheets
            .iter()
            .map(|(id, data)| SheetInfo {
                id: *id,
                name: data.name.clone(),
            })
            .collect())
    }

    async fn write_table(
        &self,
        sheet: SheetId,
        origin: CellRef,
        table: &DataTable,
    ) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let data = inner
            .sheets
            .get_mut(&sheet)
            .ok_or_else(|| sync_error!(ErrorKind::SheetError, "Sheet does not exist", sheet))?;

        for (col, header) in table.headers().iter().enumerate() {
            data.cells.insert(
                (origin.row, origin.col + col as u32),
                CellValue::Text(header.clone()),
            );
        }

        for (row_idx, row) in table.rows().iter().enumerate() {
            for (col_idx, value) in row.iter().enumerate() {
                data.cells.insert(
                    (
                        origin.row + 1 + row_idx as u32,
                        origin.col + col_idx as u32,
                    ),
                    value.clone(),
                );
            }
        }

        Ok(())
    }

    async fn clear_range(&self, sheet: SheetId, range: GridRange) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        let data = inner
            .sheets
            .get_mut(&sheet)
            .ok_or_else(|| sync_error!(ErrorKind::SheetError, "Sheet does not exist", sheet))?;

        data.cells
            .retain(|(row, col), _| !range.contains(CellRef::new(*row, *col)));

        Ok(())
    }

    async fn read_cell(&self, sheet: SheetId, cell: CellRef) -> SyncResult<CellValue> {
        let inner = self.inner.lock().await;
        let data = inner
            .sheets
            .get(&sheet)
            .ok_or_else(|| sync_error!(ErrorKind::SheetError, "Sheet does not exist", sheet))?;

        Ok(data
            .cells
            .get(&(cell.row, cell.col))
            .cloned()
            .unwrap_or(CellValue::Empty))
    }

    async fn set_named_range(
        &self,
        name: &str,
        sheet: SheetId,
        range: GridRange,
    ) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        if !inner.sheets.contains_key(&sheet) {
            return Err(sync_error!(
                ErrorKind::SheetError,
                "Sheet does not exist",
                sheet
            ));
        }

        inner.named_ranges.insert(name.to_string(), (sheet, range));

        Ok(())
    }

    async fn delete_named_range(&self, name: &str) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.named_ranges.remove(name);

        Ok(())
    }

    async fn named_range(&self, name: &str) -> SyncResult<Option<(SheetId, GridRange)>> {
        let inner = self.inner.lock().await;

        Ok(inner.named_ranges.get(name).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_and_read_back() {
        let grid = MemorySpreadsheet::new();
        let sheet = grid.add_sheet("Data").await.unwrap();

        let mut table = DataTable::new(vec!["Id".into(), "Name".into()]);
        table.push_row(vec![CellValue::Number(1.0), CellValue::Text("Acme".into())]);

        grid.write_table(sheet.id, CellRef::new(0, 0), &table)
            .await
            .unwrap();

        assert_eq!(grid.cell_text(sheet.id, "A1").await.unwrap(), "Id");
        assert_eq!(grid.cell_text(sheet.id, "B2").await.unwrap(), "Acme");
    }

    #[tokio::test]
    async fn clear_range_removes_cells() {
        let grid = MemorySpreadsheet::new();
        let sheet = grid.add_sheet("Data").await.unwrap();

        let mut table = DataTable::new(vec!["a".into()]);
        table.push_row(vec![CellValue::Text("x".into())]);
        grid.write_table(sheet.id, CellRef::new(0, 0), &table)
            .await
            .unwrap();

        grid.clear_range(sheet.id, GridRange::from_a1("A1:A2").unwrap())
            .await
            .unwrap();

        assert_eq!(grid.populated_cell_count(sheet.id).await, 0);
    }

    #[tokio::test]
    async fn duplicate_sheet_names_rejected() {
        let grid = MemorySpreadsheet::new();
        grid.add_sheet("Data").await.unwrap();
        assert!(grid.add_sheet("Data").await.is_err());
    }

    #[tokio::test]
    async fn named_ranges_replace() {
        let grid = MemorySpreadsheet::new();
        let sheet = grid.add_sheet("Data").await.unwrap();

        let first = GridRange::from_a1("A1:B2").unwrap();
        let second = GridRange::from_a1("A1:C5").unwrap();

        grid.set_named_range("output", sheet.id, first).await.unwrap();
        grid.set_named_range("output", sheet.id, second)
            .await
            .unwrap();

        assert_eq!(
            grid.named_range("output").await.unwrap(),
            Some((sheet.id, second))
        );
    }
}
