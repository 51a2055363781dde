//! Stage output records.
//!
//! Each stage returns one of these by value; the next stage reads it and never
//! modifies it. The ingestion record is also persisted so later stages can be
//! rerun without fetching again.

use crate::error::DataError;
use crate::transform::DirectoryIterator;
use crate::types::ByPartition;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the persisted ingestion record, next to the manifests.
pub const INGESTION_RESULT_FILE: &str = "ingestion_result.json";

/// What the ingestion stage produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionResult {
    /// `<raw>/<unzipped>/{train,test,val}`.
    pub raw_data_dirs: ByPartition<PathBuf>,
    pub manifest_paths: ByPartition<PathBuf>,
    pub row_counts: ByPartition<usize>,
    /// Hex SHA-256 of the downloaded archive.
    pub archive_sha256: String,
    pub is_ingested: bool,
    pub message: String,
}

impl IngestionResult {
    /// Read a record written by [`IngestionResult::save`].
    pub fn load(path: &Path) -> Result<Self, DataError> {
        lungprep_core::persistence::load_json(path)
            .map_err(|e| {
                DataError::integrity(format!(
                    "cannot read ingestion result {}: {e}",
                    path.display()
                ))
            })?
            .ok_or_else(|| {
                DataError::integrity(format!("ingestion result not found: {}", path.display()))
            })
    }

    pub fn save(&self, path: &Path) -> Result<(), DataError> {
        lungprep_core::persistence::atomic_write_json(path, self)?;
        Ok(())
    }
}

/// What the validation stage produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub schema_file_path: PathBuf,
    pub reports_dir: PathBuf,
    pub report_paths: ByPartition<PathBuf>,
    pub drift_report_json: PathBuf,
    pub drift_report_html: PathBuf,
    /// The drift report was produced; says nothing about drift itself.
    pub drift_report_generated: bool,
    /// Whether the drift test flagged the current data as drifted.
    pub dataset_drift: bool,
    pub is_validated: bool,
    pub message: String,
}

/// What the transformation stage produced: one live generator per partition.
#[derive(Debug)]
pub struct TransformationResult {
    pub generators: ByPartition<DirectoryIterator>,
    /// Where the materialized augmented samples were written.
    pub transformed_dirs: ByPartition<PathBuf>,
    pub is_transformed: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample() -> IngestionResult {
        IngestionResult {
            raw_data_dirs: ByPartition::new(
                PathBuf::from("/raw/chest_xray/train"),
                PathBuf::from("/raw/chest_xray/test"),
                PathBuf::from("/raw/chest_xray/val"),
            ),
            manifest_paths: ByPartition::new(
                PathBuf::from("/csv/train_data/train_data.csv"),
                PathBuf::from("/csv/test_data/test_data.csv"),
                PathBuf::from("/csv/val_data/val_data.csv"),
            ),
            row_counts: ByPartition::new(150, 50, 20),
            archive_sha256: "ab".repeat(32),
            is_ingested: true,
            message: "Data ingestion completed".into(),
        }
    }

    #[test]
    fn test_ingestion_result_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INGESTION_RESULT_FILE);
        let result = sample();
        result.save(&path).unwrap();
        assert_eq!(IngestionResult::load(&path).unwrap(), result);
    }

    #[test]
    fn test_load_missing_ingestion_result() {
        let dir = TempDir::new().unwrap();
        let err = IngestionResult::load(&dir.path().join(INGESTION_RESULT_FILE)).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_ingestion_result_json_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["row_counts"]["train"], 150);
        assert_eq!(json["manifest_paths"]["val"], "/csv/val_data/val_data.csv");
    }
}
