//! Schema and integrity validation of the ingested manifests.
//!
//! The stage checks that all three manifests exist, judges each against the
//! schema descriptor, writes a plain-text summary per partition and finally the
//! train-vs-test drift report.

use crate::artifact::{IngestionResult, ValidationResult};
use crate::drift::{DriftOptions, detect_drift, save_drift_report};
use crate::error::DataError;
use crate::schema::{SchemaDescriptor, infer_column_type};
use crate::table::ManifestTable;
use crate::types::{ByPartition, Partition};
use lungprep_core::DataValidationConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Outcome of judging one table against the schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCheck {
    /// One line per failed condition; empty when the table conforms.
    pub failures: Vec<String>,
}

impl SchemaCheck {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Judge a table against the schema.
///
/// Valid only when the two column names, both inferred datatypes and the set
/// of distinct label values all match. The label column must hold exactly the
/// two declared values; one or three distinct values fail the check.
pub fn check_schema(table: &ManifestTable, schema: &SchemaDescriptor) -> SchemaCheck {
    let mut failures = Vec::new();

    if table.column_count() != schema.columns.len() {
        failures.push(format!(
            "expected {} columns, found {}",
            schema.columns.len(),
            table.column_count()
        ));
    }

    for (idx, expected) in schema.columns.iter().enumerate() {
        let Some(actual) = table.columns.get(idx) else {
            failures.push(format!("column {idx} is missing, expected '{expected}'"));
            continue;
        };
        if actual != expected {
            failures.push(format!("column {idx} is '{actual}', expected '{expected}'"));
        }
        if let Some(declared) = schema.datatype(expected) {
            let inferred = infer_column_type(table.column_values(idx));
            if inferred != declared {
                failures.push(format!(
                    "column '{actual}' has type {inferred}, expected {declared}"
                ));
            }
        }
    }

    if let Some(label_idx) = table.column_index(schema.label_column()) {
        let found = table.unique_values(label_idx);
        let domain = schema.label_domain();
        let found_set: BTreeSet<&str> = found.iter().map(String::as_str).collect();
        let domain_set: BTreeSet<&str> = domain.iter().map(String::as_str).collect();
        if found.len() != domain.len() || found_set != domain_set {
            failures.push(format!(
                "label values {found:?} do not match domain {domain:?}"
            ));
        }
    }

    SchemaCheck { failures }
}

/// Plain-text summary of one valid manifest.
pub fn render_report(table: &ManifestTable, schema: &SchemaDescriptor) -> String {
    let label_idx = table.column_index(schema.label_column()).unwrap_or(1);
    let counts = table.value_counts(label_idx);
    let categories: Vec<&str> = counts.iter().map(|(v, _)| v.as_str()).collect();

    let mut out = String::new();
    out.push_str(&format!(
        "No. of features in manifest : {}\n",
        table.column_count()
    ));
    out.push_str(&format!("No. of rows in manifest : {}\n", table.row_count()));
    out.push_str(&format!(
        "Features in manifest : [{}]\n",
        table.columns.join(", ")
    ));
    out.push_str(&format!(
        "Categories in {} : [{}]\n",
        schema.label_column(),
        categories.join(", ")
    ));
    for label in schema.label_domain() {
        let rows = counts
            .iter()
            .find(|(v, _)| v == label)
            .map_or(0, |(_, n)| *n);
        out.push_str(&format!("No. of rows for {label} : {rows}\n"));
    }
    out
}

/// File name of a partition's summary report.
pub fn report_file_name(partition: Partition) -> String {
    format!("{}_report.txt", partition.dir_name())
}

/// The validation stage.
#[derive(Debug)]
pub struct DataValidation {
    config: DataValidationConfig,
    manifest_paths: ByPartition<PathBuf>,
    schema: SchemaDescriptor,
}

impl DataValidation {
    /// Load the schema descriptor; a missing or malformed file fails here.
    pub fn new(
        config: DataValidationConfig,
        ingestion: &IngestionResult,
    ) -> Result<Self, DataError> {
        tracing::info!(
            schema = %config.schema_file_path.display(),
            "Data validation started"
        );
        let schema = SchemaDescriptor::load(&config.schema_file_path)?;
        Ok(Self {
            config,
            manifest_paths: ingestion.manifest_paths.clone(),
            schema,
        })
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    /// All three manifests must exist; otherwise name every missing one.
    pub fn check_manifests_exist(&self) -> Result<(), DataError> {
        let train = self.manifest_paths.train.is_file();
        let test = self.manifest_paths.test.is_file();
        let val = self.manifest_paths.val.is_file();

        if train && test && val {
            tracing::info!("Manifests for train, test and val exist");
            return Ok(());
        }

        let missing: Vec<String> = self
            .manifest_paths
            .iter()
            .filter(|(_, path)| !path.is_file())
            .map(|(p, path)| format!("{p} ({})", path.display()))
            .collect();
        Err(DataError::integrity(format!(
            "missing manifests: {}",
            missing.join(", ")
        )))
    }

    pub fn load_tables(&self) -> Result<ByPartition<ManifestTable>, DataError> {
        ByPartition::try_from_fn(|p| ManifestTable::read(self.manifest_paths.get(p)))
    }

    /// Judge every partition, logging each result.
    pub fn validate_schema(&self, tables: &ByPartition<ManifestTable>) -> ByPartition<SchemaCheck> {
        tables.map(|partition, table| {
            let check = check_schema(table, &self.schema);
            tracing::info!(
                partition = %partition,
                valid = check.is_valid(),
                rows = table.row_count(),
                "Schema check"
            );
            for failure in &check.failures {
                tracing::warn!(partition = %partition, "{failure}");
            }
            check
        })
    }

    /// Write `<partition>_report.txt` for each partition.
    pub fn write_reports(
        &self,
        tables: &ByPartition<ManifestTable>,
    ) -> Result<ByPartition<PathBuf>, DataError> {
        let dir = &self.config.data_validation_reports_dir;
        ByPartition::try_from_fn(|partition| {
            let path = dir.join(report_file_name(partition));
            let report = render_report(tables.get(partition), &self.schema);
            lungprep_core::persistence::atomic_write(&path, report.as_bytes())?;
            tracing::info!(partition = %partition, path = %path.display(), "Wrote validation report");
            Ok(path)
        })
    }

    /// Run every check, then the reports and the drift comparison of train
    /// (reference) against test (current).
    pub fn initiate(&self) -> Result<ValidationResult, DataError> {
        self.check_manifests_exist()?;
        let tables = self.load_tables()?;

        let checks = self.validate_schema(&tables);
        let invalid: Vec<String> = checks
            .iter()
            .filter(|(_, check)| !check.is_valid())
            .map(|(p, check)| format!("{p} ({})", check.failures.join("; ")))
            .collect();
        if !invalid.is_empty() {
            return Err(DataError::SchemaMismatch(format!(
                "invalid partitions: {}",
                invalid.join(", ")
            )));
        }

        let report_paths = self.write_reports(&tables)?;

        let options = DriftOptions {
            p_value_threshold: self.config.drift_p_value_threshold,
            share_threshold: self.config.drift_share_threshold,
            path_columns: vec![self.schema.path_column().to_string()],
        };
        let drift = detect_drift(&tables.train, &tables.test, &options)?;
        let outcome = save_drift_report(&drift, &self.config.data_validation_reports_dir)?;

        let result = ValidationResult {
            schema_file_path: self.config.schema_file_path.clone(),
            reports_dir: self.config.data_validation_reports_dir.clone(),
            report_paths,
            drift_report_json: outcome.json_path,
            drift_report_html: outcome.html_path,
            drift_report_generated: outcome.report_generated,
            dataset_drift: outcome.dataset_drift,
            is_validated: true,
            message: "Data validation completed".into(),
        };
        tracing::info!(
            reports = %result.reports_dir.display(),
            dataset_drift = result.dataset_drift,
            "Data validation finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCHEMA: &str = r#"
columns: [Label_Image_Path, Image_Label]
column_datatypes:
  Label_Image_Path: object
  Image_Label: object
domain_value:
  Image_Label: [NORMAL, PNEUMONIA]
"#;

    fn schema() -> SchemaDescriptor {
        SchemaDescriptor::from_yaml(SCHEMA).unwrap()
    }

    fn table(labels: &[&str]) -> ManifestTable {
        ManifestTable::new(
            vec!["Label_Image_Path".into(), "Image_Label".into()],
            labels
                .iter()
                .enumerate()
                .map(|(i, l)| vec![format!("/data/{l}/{i}.jpeg"), l.to_string()])
                .collect(),
        )
    }

    #[test]
    fn test_conforming_table_is_valid() {
        let check = check_schema(&table(&["NORMAL", "PNEUMONIA", "NORMAL"]), &schema());
        assert!(check.is_valid(), "{:?}", check.failures);
    }

    #[test]
    fn test_label_order_does_not_matter() {
        let check = check_schema(&table(&["PNEUMONIA", "NORMAL"]), &schema());
        assert!(check.is_valid(), "{:?}", check.failures);
    }

    #[test]
    fn test_single_label_is_invalid() {
        let check = check_schema(&table(&["NORMAL", "NORMAL"]), &schema());
        assert!(!check.is_valid());
        assert!(check.failures[0].contains("label values"));
    }

    #[test]
    fn test_third_label_is_invalid() {
        let check = check_schema(&table(&["NORMAL", "PNEUMONIA", "COVID"]), &schema());
        assert!(!check.is_valid());
    }

    #[test]
    fn test_empty_table_is_invalid() {
        assert!(!check_schema(&table(&[]), &schema()).is_valid());
    }

    #[test]
    fn test_renamed_column_is_invalid() {
        let mut t = table(&["NORMAL", "PNEUMONIA"]);
        t.columns[0] = "path".into();
        let check = check_schema(&t, &schema());
        assert_eq!(check.failures.len(), 1);
        assert!(check.failures[0].contains("'path'"));
    }

    #[test]
    fn test_swapped_columns_are_invalid() {
        let t = ManifestTable::new(
            vec!["Image_Label".into(), "Label_Image_Path".into()],
            vec![
                vec!["NORMAL".into(), "/data/NORMAL/0.jpeg".into()],
                vec!["PNEUMONIA".into(), "/data/PNEUMONIA/1.jpeg".into()],
            ],
        );
        let check = check_schema(&t, &schema());
        assert!(!check.is_valid());
        assert_eq!(
            check.failures,
            vec![
                "column 0 is 'Image_Label', expected 'Label_Image_Path'".to_string(),
                "column 1 is 'Label_Image_Path', expected 'Image_Label'".to_string(),
            ]
        );
    }

    #[test]
    fn test_numeric_column_has_wrong_type() {
        let t = ManifestTable::new(
            vec!["Label_Image_Path".into(), "Image_Label".into()],
            vec![
                vec!["1".into(), "NORMAL".into()],
                vec!["2".into(), "PNEUMONIA".into()],
            ],
        );
        let check = check_schema(&t, &schema());
        assert!(!check.is_valid());
        assert!(check.failures[0].contains("int64"));
    }

    #[test]
    fn test_missing_column_does_not_panic() {
        let t = ManifestTable::new(
            vec!["Label_Image_Path".into()],
            vec![vec!["/a.jpeg".into()]],
        );
        let check = check_schema(&t, &schema());
        assert!(!check.is_valid());
        assert!(check.failures.iter().any(|f| f.contains("missing")));
    }

    #[test]
    fn test_render_report() {
        let report = render_report(&table(&["NORMAL", "PNEUMONIA", "PNEUMONIA"]), &schema());
        assert_eq!(
            report,
            "No. of features in manifest : 2\n\
             No. of rows in manifest : 3\n\
             Features in manifest : [Label_Image_Path, Image_Label]\n\
             Categories in Image_Label : [NORMAL, PNEUMONIA]\n\
             No. of rows for NORMAL : 1\n\
             No. of rows for PNEUMONIA : 2\n"
        );
    }

    #[test]
    fn test_report_file_names() {
        assert_eq!(report_file_name(Partition::Train), "train_report.txt");
        assert_eq!(report_file_name(Partition::Val), "val_report.txt");
    }
}
