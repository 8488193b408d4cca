//! Transformation of raw service responses into [`DataTable`]s.
//!
//! Two shapes arrive from the remote service: arrays of entity objects from
//! read-queries, and the nested report structure from standard reports. Both
//! are flattened here into the rectangular header-plus-rows shape the writer
//! consumes.

use serde_json::Value;

use crate::table::{CellValue, DataTable};

/// Flattens query result rows into a table.
///
/// Headers are the union of flattened field paths across all rows, in
/// first-seen order. Nested objects contribute dot-separated paths
/// (`BillAddr.City`); arrays are rendered as JSON text in a single cell. Rows
/// missing a field get an empty cell.
pub fn query_rows_to_table(rows: &[Value]) -> DataTable {
    let mut headers: Vec<String> = Vec::new();
    let mut flattened: Vec<Vec<(String, CellValue)>> = Vec::with_capacity(rows.len());

    for row in rows {
        let mut fields = Vec::new();
        flatten_into(row, String::new(), &mut fields);

        for (path, _) in &fields {
            if !headers.iter().any(|header| header == path) {
                headers.push(path.clone());
            }
        }
        flattened.push(fields);
    }

    let mut table = DataTable::new(headers);
    for fields in flattened {
        let row = table
            .headers()
            .iter()
            .map(|header| {
                fields
                    .iter()
                    .find(|(path, _)| path == header)
                    .map(|(_, value)| value.clone())
                    .unwrap_or(CellValue::Empty)
            })
            .collect();
        table.push_row(row);
    }

    table
}

fn flatten_into(value: &Value, prefix: String, out: &mut Vec<(String, CellValue)>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(nested, path, out);
            }
        }
        other => out.push((prefix, CellValue::from_json(other))),
    }
}

/// Flattens the nested report structure into a table.
///
/// Headers come from the report's column titles. Section rows are linearized
/// depth-first: a section's header row, its nested rows, then its summary row.
pub fn report_to_table(report: &Value) -> DataTable {
    let headers = report["Columns"]["Column"]
        .as_array()
        .map(|columns| {
            columns
                .iter()
                .map(|column| {
                    column["ColTitle"]
                        .as_str()
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default();

    let mut table = DataTable::new(headers);
    if let Some(rows) = report["Rows"]["Row"].as_array() {
        for row in rows {
            push_report_row(row, &mut table);
        }
    }

    table
}

fn push_report_row(row: &Value, table: &mut DataTable) {
    if let Some(cells) = row["ColData"].as_array() {
        table.push_row(col_data_cells(cells));
        return;
    }

    // Section row: header, nested rows, summary.
    if let Some(cells) = row["Header"]["ColData"].as_array() {
        table.push_row(col_data_cells(cells));
    }
    if let Some(nested) = row["Rows"]["Row"].as_array() {
        for nested_row in nested {
            push_report_row(nested_row, table);
        }
    }
    if let Some(cells) = row["Summary"]["ColData"].as_array() {
        table.push_row(col_data_cells(cells));
    }
}

fn col_data_cells(cells: &[Value]) -> Vec<CellValue> {
    cells
        .iter()
        .map(|cell| {
            let text = cell["value"].as_str().unwrap_or_default();
            if text.is_empty() {
                CellValue::Empty
            } else if let Ok(number) = text.parse::<f64>() {
                CellValue::Number(number)
            } else {
                CellValue::Text(text.to_string())
            }
        })
        .collect()
}
