//! Row-oriented tables built from query results, for export to analysis tools.

use std::fmt;

use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::models::{Record, Structure};

/// Columns of [`Table::structure_metrics`]
const STRUCTURE_METRIC_COLUMNS: [&str; 7] = [
    "struct_id",
    "batch_id",
    "tag",
    "input_tag",
    "reference_tag",
    "protein_backbone",
    "score",
];

/// A table of JSON values; every row has one value per column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    /// Column names, in schema order
    pub columns: Vec<String>,
    /// Rows, each aligned with `columns`
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// One row per record, columns taken from the record's schema
    pub fn from_records<R: Record>(records: &[R]) -> Self {
        let mut table = Self::new(R::COLUMNS.iter().copied());
        table.rows = records.iter().map(|r| r.values()).collect();
        table
    }

    /// Structures joined with their RMSD and score, `null` where missing
    pub fn structure_metrics(structures: &[Structure]) -> Self {
        let mut table = Self::new(STRUCTURE_METRIC_COLUMNS);
        table.rows = structures
            .iter()
            .map(|s| {
                let mut row = s.values();
                row.push(json!(s.rmsd.as_ref().and_then(|r| r.reference_tag.clone())));
                row.push(json!(s.rmsd.as_ref().and_then(|r| r.protein_backbone)));
                row.push(json!(s.score.as_ref().and_then(|t| t.score)));
                row
            })
            .collect();
        table
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one column
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// Rows as column-to-value mappings
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }

    /// Rows as a JSON array of objects
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_records())?)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(render_cell).collect())
            .collect();

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let header = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(f, "{}", header.trim_end())?;

        for row in &cells {
            let line = row
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<w$}", c, w = *w))
                .collect::<Vec<_>>()
                .join("  ");
            writeln!(f, "{}", line.trim_end())?;
        }

        Ok(())
    }
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.lines().next().unwrap_or_default().to_string(),
        other => other.to_string(),
    }
}
