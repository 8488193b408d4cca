//! Idempotent output writer.
//!
//! Takes a transformed [`DataTable`] and a dataset's [`Target`] and makes the
//! document match: resolve or create the target sheet, clear the previous
//! output region, write the new one at the anchor, and repoint the named
//! range. Cell-count ceilings are enforced before any mutation so an oversized
//! result never leaves a half-cleared sheet behind.

use config::shared::WriterConfig;
use tracing::{info, warn};

use crate::dataset::{LastWrite, Target};
use crate::error::{ErrorKind, SyncResult};
use crate::grid::{GridRange, SheetId, SheetInfo, Spreadsheet};
use crate::sync_error;
use crate::table::DataTable;

/// Outcome of a successful write, fed back into the dataset record.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub sheet_id: SheetId,
    pub sheet_name: String,
    /// A1 region of the written output, header row included.
    pub range_a1: String,
    /// Data rows written, excluding the header row.
    pub rows: u32,
    pub cols: u32,
    pub schema_hash: String,
    /// True when the header fingerprint differs from the previous write.
    pub schema_changed: bool,
    /// Human-readable warnings raised by the write (soft ceiling breach,
    /// schema drift). Surfaced on the job record.
    pub warnings: Vec<String>,
}

/// Writes dataset output to a [`Spreadsheet`].
#[derive(Debug, Clone)]
pub struct OutputWriter<G> {
    grid: G,
    config: WriterConfig,
}

impl<G> OutputWriter<G>
where
    G: Spreadsheet,
{
    pub fn new(grid: G, config: WriterConfig) -> Self {
        Self { grid, config }
    }

    /// Writes `table` to the dataset's target location.
    ///
    /// `previous` is the snapshot of the last successful write, used to clear
    /// the old region and detect schema drift. When the target disallows
    /// resizing, output growing beyond the previous shape fails with
    /// [`ErrorKind::SizingError`] before anything is cleared.
    pub async fn write(
        &self,
        target: &Target,
        table: &DataTable,
        previous: Option<&LastWrite>,
    ) -> SyncResult<WriteOutcome> {
        let mut warnings = Vec::new();
        self.check_ceilings(table, &mut warnings)?;

        if let (false, Some(previous)) = (target.allow_resize, previous) {
            if table.height() > previous.rows + 1 || table.col_count() > previous.cols {
                return Err(sync_error!(
                    ErrorKind::SizingError,
                    "Output grew beyond the fixed target region",
                    format!(
                        "previous {}x{}, new {}x{}",
                        previous.rows + 1,
                        previous.cols,
                        table.height(),
                        table.col_count()
                    )
                ));
            }
        }

        let sheet = self.resolve_sheet(target).await?;
        let anchor = target.anchor();

        // Clear the previous region first so shrinking output leaves no stale
        // trailing rows. Only applies when the previous write landed on the
        // sheet resolved for this one; a retargeted or deleted sheet is left
        // alone.
        if let Some(previous) = previous {
            if previous.sheet_id == sheet.id {
                if let Ok(range) = GridRange::from_a1(&previous.range_a1) {
                    self.grid.clear_range(sheet.id, range).await?;
                }
            }
        }

        let range = GridRange::anchored(anchor, table.height().max(1), table.col_count().max(1));
        if !table.is_empty() {
            self.grid.write_table(sheet.id, anchor, table).await?;
        }

        if let Some(name) = &target.named_range {
            self.grid.set_named_range(name, sheet.id, range).await?;
        }

        let schema_hash = table.schema_fingerprint();
        let schema_changed = previous
            .map(|previous| previous.schema_hash != schema_hash)
            .unwrap_or(false);
        if schema_changed {
            warn!(
                sheet = %sheet.name,
                "output schema changed since the previous run"
            );
            warnings.push(
                "output schema changed since the previous run; review formulas \
                 referencing this output"
                    .to_string(),
            );
        }

        info!(
            sheet = %sheet.name,
            range = %range.to_a1(),
            rows = table.row_count(),
            cols = table.col_count(),
            "wrote dataset output"
        );

        Ok(WriteOutcome {
            sheet_id: sheet.id,
            sheet_name: sheet.name,
            range_a1: range.to_a1(),
            rows: table.row_count(),
            cols: table.col_count(),
            schema_hash,
            schema_changed,
            warnings,
        })
    }

    /// Enforces the soft and hard cell ceilings.
    fn check_ceilings(&self, table: &DataTable, warnings: &mut Vec<String>) -> SyncResult<()> {
        let cells = table.cell_count();

        if cells > self.config.hard_cell_limit {
            return Err(sync_error!(
                ErrorKind::SizingError,
                "Output exceeds the hard cell ceiling",
                format!("{cells} cells, limit {}", self.config.hard_cell_limit)
            ));
        }

        if cells > self.config.soft_cell_limit {
            warn!(
                cells,
                limit = self.config.soft_cell_limit,
                "output exceeds the soft cell ceiling"
            );
            warnings.push(format!(
                "output of {cells} cells exceeds the soft ceiling of {}",
                self.config.soft_cell_limit
            ));
        }

        Ok(())
    }

    /// Resolves the target sheet: by id first, then by name, creating the
    /// sheet when neither resolves.
    async fn resolve_sheet(&self, target: &Target) -> SyncResult<SheetInfo> {
        if let Some(id) = target.sheet_id {
            if let Some(sheet) = self.grid.sheet_by_id(id).await? {
                return Ok(sheet);
            }
        }

        if let Some(sheet) = self.grid.sheet_by_name(&target.sheet_name).await? {
            return Ok(sheet);
        }

        let sheet = self.grid.add_sheet(&target.sheet_name).await?;
        info!(sheet = %sheet.name, sheet_id = sheet.id, "created output sheet");

        Ok(sheet)
    }
}
