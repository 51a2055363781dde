//! Generic read-back form of a manifest CSV.
//!
//! Validation and drift work on this rather than on [`crate::manifest::Manifest`],
//! so a file with the wrong columns or an unexpected label can still be loaded
//! and judged instead of failing to parse.

use crate::error::DataError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A header plus string rows, as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ManifestTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Read a CSV file with a header row. Ragged rows are rejected.
    pub fn read(path: &Path) -> Result<Self, DataError> {
        let wrap = |e: csv::Error| {
            DataError::integrity(format!("cannot read manifest {}: {e}", path.display()))
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(wrap)?;
        let columns = reader
            .headers()
            .map_err(wrap)?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(wrap)?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, in row order.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter_map(move |row| row.get(idx).map(String::as_str))
    }

    /// Distinct values of a column in order of first appearance.
    pub fn unique_values(&self, idx: usize) -> Vec<String> {
        self.value_counts(idx).into_iter().map(|(v, _)| v).collect()
    }

    /// `(value, rows)` pairs in order of first appearance.
    pub fn value_counts(&self, idx: usize) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for value in self.column_values(idx) {
            match counts.iter_mut().find(|(v, _)| v == value) {
                Some((_, n)) => *n += 1,
                None => counts.push((value.to_string(), 1)),
            }
        }
        counts
    }
}
