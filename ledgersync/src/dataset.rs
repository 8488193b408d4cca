//! Typed dataset records and their validation.
//!
//! A dataset names a remote fetch (standard report or ad-hoc read-query), a
//! stable output location in the document, and an optional recurring schedule.
//! Records are owned exclusively by the registry; every mutation bumps the
//! monotonic `version` counter.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SyncResult};
use crate::grid::{CellRef, SheetId};
use crate::{bail, sync_error};

/// Stable, unique dataset identifier (UUID text).
pub type DatasetId = String;

/// Which of the two fetch paths a dataset uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    /// A canned report fetched by name with filter parameters.
    Standard,
    /// An ad-hoc read-query parsed and paginated by the engine.
    Query,
}

/// Fetch parameters, split by dataset kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DatasetParams {
    /// Standard report: report name plus filter parameters (date range,
    /// accounting method, column summarization).
    Standard {
        report: String,
        #[serde(default)]
        filters: BTreeMap<String, String>,
    },
    /// Custom read-query, validated by the query parser before any network call.
    Query { query: String },
}

impl DatasetParams {
    pub fn kind(&self) -> DatasetKind {
        match self {
            DatasetParams::Standard { .. } => DatasetKind::Standard,
            DatasetParams::Query { .. } => DatasetKind::Query,
        }
    }
}

/// The stable output location of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Preferred sheet id; resolved before the name.
    pub sheet_id: Option<SheetId>,
    /// Sheet name, used for lookup and for creating a missing sheet.
    pub sheet_name: String,
    /// Stable top-left cell reference in A1 notation.
    pub anchor_cell: String,
    /// Whether the output region may grow beyond the previous write's shape.
    pub allow_resize: bool,
    /// Optional alias that always points at the most recent write range.
    pub named_range: Option<String>,
}

impl Target {
    /// Normalizes the target in place: a missing or invalid anchor falls back
    /// to the document origin cell.
    ///
    /// Returns `true` when the anchor had to be replaced.
    pub fn normalize(&mut self) -> bool {
        if CellRef::from_a1(&self.anchor_cell).is_err() {
            self.anchor_cell = "A1".to_string();
            return true;
        }
        false
    }

    /// Parses the anchor, falling back to the origin for invalid values.
    pub fn anchor(&self) -> CellRef {
        CellRef::from_a1(&self.anchor_cell).unwrap_or(CellRef::new(0, 0))
    }
}

/// Recurrence frequency of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleFrequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

/// A recurring execution schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub enabled: bool,
    pub frequency: ScheduleFrequency,
    /// Hour of day (0-23). Required unless the frequency is hourly.
    pub time_of_day: Option<u8>,
    /// Day of week (1 = Monday .. 7 = Sunday). Required for weekly schedules.
    pub day_of_week: Option<u8>,
    /// Day of month (1-31). Required for monthly schedules.
    pub day_of_month: Option<u8>,
}

impl Schedule {
    /// Validates the schedule shape.
    pub fn validate(&self) -> SyncResult<()> {
        if self.frequency != ScheduleFrequency::Hourly {
            match self.time_of_day {
                Some(hour) if hour <= 23 => {}
                Some(_) => bail!(
                    ErrorKind::ValidationError,
                    "Schedule time of day must be between 0 and 23"
                ),
                None => bail!(
                    ErrorKind::ValidationError,
                    "Schedule requires a time of day unless it is hourly"
                ),
            }
        }

        if self.frequency == ScheduleFrequency::Weekly {
            match self.day_of_week {
                Some(day) if (1..=7).contains(&day) => {}
                _ => bail!(
                    ErrorKind::ValidationError,
                    "Weekly schedule requires a day of week between 1 and 7"
                ),
            }
        }

        if self.frequency == ScheduleFrequency::Monthly {
            match self.day_of_month {
                Some(day) if (1..=31).contains(&day) => {}
                _ => bail!(
                    ErrorKind::ValidationError,
                    "Monthly schedule requires a day of month between 1 and 31"
                ),
            }
        }

        Ok(())
    }
}

/// Pagination overrides for query datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Pagination {
    /// 1-based start offset into the result set.
    pub start_position: Option<u32>,
    /// Page size requested from the remote service.
    pub max_results: Option<u32>,
}

/// Snapshot of the most recent successful write, persisted atomically with the
/// run that produced it.
///
/// Used to clear the prior output region before the next write and to detect
/// schema drift via fingerprint comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastWrite {
    pub rows: u32,
    pub cols: u32,
    pub wrote_at: DateTime<Utc>,
    pub sheet_id: SheetId,
    pub range_a1: String,
    pub schema_hash: String,
}

/// A dataset definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    pub params: DatasetParams,
    pub target: Target,
    #[serde(default)]
    pub pagination: Pagination,
    pub schedule: Option<Schedule>,
    pub last_write: Option<LastWrite>,
    /// Monotonic counter bumped by every registry mutation.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dataset {
    pub fn kind(&self) -> DatasetKind {
        self.params.kind()
    }

    /// True when the dataset has an enabled recurring schedule.
    pub fn schedule_enabled(&self) -> bool {
        self.schedule.as_ref().is_some_and(|schedule| schedule.enabled)
    }
}

/// Validates a dataset name.
pub(crate) fn validate_name(name: &str) -> SyncResult<()> {
    if name.trim().is_empty() {
        return Err(sync_error!(
            ErrorKind::ValidationError,
            "Dataset name must not be empty"
        ));
    }

    Ok(())
}
