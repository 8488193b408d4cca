//! A1-style cell and range addressing for the document surface.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest supported 0-indexed column (column `ZZZ`).
pub const MAX_COLS: u32 = 18_278;

/// Largest supported 0-indexed row.
pub const MAX_ROWS: u32 = 10_000_000;

/// A reference to a single cell within a sheet.
///
/// Rows and columns are **0-indexed**: `row = 0` is sheet row `1`, `col = 0`
/// is column `A`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    /// 0-indexed row.
    pub row: u32,
    /// 0-indexed column.
    pub col: u32,
}

impl CellRef {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Convert to A1 notation (e.g. `A1`, `BC32`).
    pub fn to_a1(self) -> String {
        format!("{}{}", col_to_name(self.col), self.row + 1)
    }

    /// Parse an A1-style reference (e.g. `A1`, `$B$2`).
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        // Accept optional `$` markers.
        let mut idx = 0usize;
        let bytes = s.as_bytes();
        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let col_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
            idx += 1;
        }

        if idx == col_start {
            return Err(A1ParseError::MissingColumn);
        }

        let col_str = &s[col_start..idx];
        if bytes.get(idx) == Some(&b'$') {
            idx += 1;
        }

        let row_start = idx;
        while idx < bytes.len() && bytes[idx].is_ascii_digit() {
            idx += 1;
        }

        if idx == row_start {
            return Err(A1ParseError::MissingRow);
        }
        if idx != bytes.len() {
            return Err(A1ParseError::TrailingCharacters);
        }

        let col = name_to_col(col_str)?;
        if col >= MAX_COLS {
            return Err(A1ParseError::InvalidColumn);
        }
        let row_1_based: u32 = s[row_start..idx]
            .parse()
            .map_err(|_| A1ParseError::InvalidRow)?;
        if row_1_based == 0 || row_1_based > MAX_ROWS {
            return Err(A1ParseError::InvalidRow);
        }

        Ok(Self {
            row: row_1_based - 1,
            col,
        })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// A rectangular region within a sheet.
///
/// The range is inclusive and always normalized such that
/// `start.row <= end.row` and `start.col <= end.col`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridRange {
    pub start: CellRef,
    pub end: CellRef,
}

impl GridRange {
    /// Construct a new range, normalizing coordinates if needed.
    pub const fn new(a: CellRef, b: CellRef) -> Self {
        let start_row = if a.row <= b.row { a.row } else { b.row };
        let end_row = if a.row <= b.row { b.row } else { a.row };
        let start_col = if a.col <= b.col { a.col } else { b.col };
        let end_col = if a.col <= b.col { b.col } else { a.col };
        Self {
            start: CellRef::new(start_row, start_col),
            end: CellRef::new(end_row, end_col),
        }
    }

    /// Builds the range covering `height × width` cells anchored at `origin`.
    ///
    /// Zero-sized dimensions collapse to the origin cell.
    pub fn anchored(origin: CellRef, height: u32, width: u32) -> Self {
        let end = CellRef::new(
            origin.row + height.saturating_sub(1),
            origin.col + width.saturating_sub(1),
        );
        Self::new(origin, end)
    }

    pub const fn contains(&self, cell: CellRef) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.col >= self.start.col
            && cell.col <= self.end.col
    }

    pub const fn width(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub const fn height(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub const fn is_single_cell(&self) -> bool {
        self.start.row == self.end.row && self.start.col == self.end.col
    }

    /// Convert to A1 notation; single-cell ranges render without a colon.
    pub fn to_a1(self) -> String {
        if self.is_single_cell() {
            self.start.to_a1()
        } else {
            format!("{}:{}", self.start.to_a1(), self.end.to_a1())
        }
    }

    /// Parse an A1-style range (e.g. `A1:C10`, or a bare cell like `B2`).
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        match a1.split_once(':') {
            Some((start, end)) => Ok(Self::new(CellRef::from_a1(start)?, CellRef::from_a1(end)?)),
            None => {
                let cell = CellRef::from_a1(a1)?;
                Ok(Self::new(cell, cell))
            }
        }
    }
}

impl fmt::Display for GridRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// Errors produced when parsing A1 references.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum A1ParseError {
    #[error("reference is empty")]
    Empty,
    #[error("reference is missing a column letter")]
    MissingColumn,
    #[error("reference is missing a row number")]
    MissingRow,
    #[error("reference has trailing characters")]
    TrailingCharacters,
    #[error("column is out of range")]
    InvalidColumn,
    #[error("row is out of range")]
    InvalidRow,
}

fn col_to_name(col: u32) -> String {
    let mut name = Vec::new();
    let mut value = col;
    loop {
        name.push(b'A' + (value % 26) as u8);
        if value < 26 {
            break;
        }
        value = value / 26 - 1;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

fn name_to_col(s: &str) -> Result<u32, A1ParseError> {
    let mut col: u32 = 0;
    for byte in s.bytes() {
        let letter = byte.to_ascii_uppercase();
        if !letter.is_ascii_uppercase() {
            return Err(A1ParseError::InvalidColumn);
        }
        col = col
            .checked_mul(26)
            .and_then(|c| c.checked_add(u32::from(letter - b'A') + 1))
            .ok_or(A1ParseError::InvalidColumn)?;
    }
    Ok(col - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a1_roundtrip() {
        for (a1, row, col) in [("A1", 0, 0), ("B2", 1, 1), ("Z10", 9, 25), ("AA1", 0, 26)] {
            let cell = CellRef::from_a1(a1).unwrap();
            assert_eq!(cell, CellRef::new(row, col));
            assert_eq!(cell.to_a1(), a1);
        }
    }

    #[test]
    fn dollar_markers_accepted() {
        assert_eq!(CellRef::from_a1("$B$2").unwrap(), CellRef::new(1, 1));
    }

    #[test]
    fn invalid_references_rejected() {
        assert!(CellRef::from_a1("").is_err());
        assert!(CellRef::from_a1("12").is_err());
        assert!(CellRef::from_a1("AB").is_err());
        assert!(CellRef::from_a1("A0").is_err());
        assert!(CellRef::from_a1("A1X").is_err());
    }

    #[test]
    fn range_parsing_and_rendering() {
        let range = GridRange::from_a1("A1:C3").unwrap();
        assert_eq!(range.width(), 3);
        assert_eq!(range.height(), 3);
        assert_eq!(range.to_a1(), "A1:C3");

        let single = GridRange::from_a1("B2").unwrap();
        assert!(single.is_single_cell());
        assert_eq!(single.to_a1(), "B2");
    }

    #[test]
    fn anchored_range_covers_table_shape() {
        let range = GridRange::anchored(CellRef::new(2, 1), 4, 3);
        assert_eq!(range.to_a1(), "B3:D6");
    }
}
