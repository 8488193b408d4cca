//! Rectangular tabular results produced by dataset runs.
//!
//! A [`DataTable`] is the normalized shape every fetch is transformed into
//! before it reaches the output writer: a header row plus zero or more data
//! rows, each padded to the header width.

use sha2::{Digest, Sha256};

/// A single cell value within a [`DataTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// An empty cell.
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Converts a JSON scalar into a cell value.
    ///
    /// Objects and arrays are rendered as their JSON text, since the document
    /// surface has no richer representation for them.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => CellValue::Empty,
            serde_json::Value::Bool(b) => CellValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => CellValue::Number(f),
                None => CellValue::Text(n.to_string()),
            },
            serde_json::Value::String(s) => CellValue::Text(s.clone()),
            other => CellValue::Text(other.to_string()),
        }
    }

    /// Renders the cell as display text, the way it would appear in the document.
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            CellValue::Text(s) => s.clone(),
        }
    }
}

/// A rectangular table with a header row.
///
/// Rows are always exactly as wide as the header; [`DataTable::push_row`] pads
/// short rows with [`CellValue::Empty`] and truncates long ones.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataTable {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl DataTable {
    /// Creates an empty table with the given header row.
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Appends a data row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<CellValue>) {
        row.resize(self.headers.len(), CellValue::Empty);
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Number of data rows, excluding the header row.
    pub fn row_count(&self) -> u32 {
        self.rows.len() as u32
    }

    /// Number of columns.
    pub fn col_count(&self) -> u32 {
        self.headers.len() as u32
    }

    /// Total rows written to the document, header row included.
    pub fn height(&self) -> u32 {
        if self.headers.is_empty() {
            0
        } else {
            self.row_count() + 1
        }
    }

    /// Total cell count of the written region (header row included).
    pub fn cell_count(&self) -> u64 {
        u64::from(self.height()) * u64::from(self.col_count())
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Computes the schema fingerprint: a stable SHA-256 hash of the header row.
    ///
    /// A changed fingerprint between two runs signals column-shape drift, which
    /// callers surface so that downstream formulas referencing the output can be
    /// reviewed.
    pub fn schema_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (i, header) in self.headers.iter().enumerate() {
            if i > 0 {
                // Unit separator keeps `["ab","c"]` and `["a","bc"]` distinct.
                hasher.update([0x1f]);
            }
            hasher.update(header.as_bytes());
        }

        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_header_width() {
        let mut table = DataTable::new(vec!["a".into(), "b".into(), "c".into()]);
        table.push_row(vec![CellValue::Number(1.0)]);

        assert_eq!(table.rows()[0].len(), 3);
        assert_eq!(table.rows()[0][2], CellValue::Empty);
    }

    #[test]
    fn height_includes_header_row() {
        let mut table = DataTable::new(vec!["a".into()]);
        table.push_row(vec![CellValue::Text("x".into())]);

        assert_eq!(table.height(), 2);
        assert_eq!(table.cell_count(), 2);
    }

    #[test]
    fn fingerprint_changes_when_headers_change() {
        let base = DataTable::new(vec!["Id".into(), "Name".into()]);
        let drifted = DataTable::new(vec!["Id".into(), "Name".into(), "Balance".into()]);

        assert_ne!(base.schema_fingerprint(), drifted.schema_fingerprint());
    }

    #[test]
    fn fingerprint_ignores_data_rows() {
        let mut a = DataTable::new(vec!["Id".into()]);
        let b = DataTable::new(vec!["Id".into()]);
        a.push_row(vec![CellValue::Number(1.0)]);

        assert_eq!(a.schema_fingerprint(), b.schema_fingerprint());
    }

    #[test]
    fn fingerprint_separator_prevents_boundary_collisions() {
        let a = DataTable::new(vec!["ab".into(), "c".into()]);
        let b = DataTable::new(vec!["a".into(), "bc".into()]);

        assert_ne!(a.schema_fingerprint(), b.schema_fingerprint());
    }

    #[test]
    fn json_scalars_convert() {
        assert_eq!(
            CellValue::from_json(&serde_json::json!(12.5)),
            CellValue::Number(12.5)
        );
        assert_eq!(CellValue::from_json(&serde_json::Value::Null), CellValue::Empty);
        assert_eq!(
            CellValue::from_json(&serde_json::json!([1, 2])),
            CellValue::Text("[1,2]".into())
        );
    }
}
