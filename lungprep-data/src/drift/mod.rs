//! Distribution drift between two manifests.
//!
//! Every column is compared as a categorical distribution. The label column
//! is compared as-is; path columns are reduced to their file extension, since
//! raw paths are unique per row and carry no distribution of their own.

mod html;
pub mod stats;

use crate::error::DataError;
use crate::table::ManifestTable;
use crate::types::LABEL_IMAGE_PATH;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DRIFT_REPORT_JSON: &str = "data_drift_report.json";
pub const DRIFT_REPORT_HTML: &str = "data_drift_report.html";

/// Bucket used for paths without an extension.
const NO_EXTENSION: &str = "(none)";

/// Thresholds and column handling for a drift run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftOptions {
    /// A column drifts when its p-value is below this.
    pub p_value_threshold: f64,
    /// The dataset drifts when at least this share of columns drift.
    pub share_threshold: f64,
    /// Columns compared by file extension rather than by value.
    pub path_columns: Vec<String>,
}

impl Default for DriftOptions {
    fn default() -> Self {
        Self {
            p_value_threshold: 0.05,
            share_threshold: 0.5,
            path_columns: vec![LABEL_IMAGE_PATH.to_string()],
        }
    }
}

/// How a column's values were turned into categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnReduction {
    Value,
    FileExtension,
}

/// The statistical test behind a column verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftTest {
    ChiSquare,
}

/// PSI bands: below 0.1 stable, below 0.25 moderate, otherwise significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftSeverity {
    None,
    Moderate,
    Significant,
}

impl DriftSeverity {
    pub fn from_psi(psi: f64) -> Self {
        if psi < 0.1 {
            Self::None
        } else if psi < 0.25 {
            Self::Moderate
        } else {
            Self::Significant
        }
    }
}

/// One category's counts and shares on both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub reference_count: usize,
    pub current_count: usize,
    pub reference_share: f64,
    pub current_share: f64,
}

/// Drift verdict for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub column: String,
    pub reduction: ColumnReduction,
    pub test: DriftTest,
    pub statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
    pub psi: f64,
    pub severity: DriftSeverity,
    pub drift_detected: bool,
    pub categories: Vec<CategoryShare>,
}

/// Column-by-column comparison of a reference and a current table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub generated_at: DateTime<Utc>,
    pub reference_rows: usize,
    pub current_rows: usize,
    pub p_value_threshold: f64,
    pub share_threshold: f64,
    pub columns: Vec<ColumnDrift>,
    pub drifted_columns: usize,
    pub share_of_drifted_columns: f64,
    pub dataset_drift: bool,
}

/// What [`save_drift_report`] produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftOutcome {
    /// Both report files were written.
    pub report_generated: bool,
    pub dataset_drift: bool,
    pub json_path: PathBuf,
    pub html_path: PathBuf,
}

fn extension_category(value: &str) -> String {
    Path::new(value)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| NO_EXTENSION.to_string())
}

/// Per-category counts of one column on both sides, categories in order of
/// first appearance (reference first).
fn category_counts(
    reference: &ManifestTable,
    ref_idx: usize,
    current: &ManifestTable,
    cur_idx: usize,
    reduce: impl Fn(&str) -> String,
) -> Vec<(String, usize, usize)> {
    let mut counts: Vec<(String, usize, usize)> = Vec::new();
    let mut bump = |category: String, side: usize| {
        let slot = match counts.iter().position(|(c, _, _)| *c == category) {
            Some(i) => i,
            None => {
                counts.push((category, 0, 0));
                counts.len() - 1
            }
        };
        if side == 0 {
            counts[slot].1 += 1;
        } else {
            counts[slot].2 += 1;
        }
    };
    for value in reference.column_values(ref_idx) {
        bump(reduce(value), 0);
    }
    for value in current.column_values(cur_idx) {
        bump(reduce(value), 1);
    }
    counts
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Compare `current` against `reference`, column by column.
///
/// Both tables must be non-empty and `current` must carry every column of
/// `reference`.
pub fn detect_drift(
    reference: &ManifestTable,
    current: &ManifestTable,
    options: &DriftOptions,
) -> Result<DriftReport, DataError> {
    if reference.row_count() == 0 || current.row_count() == 0 {
        return Err(DataError::drift(format!(
            "cannot compare empty data (reference rows: {}, current rows: {})",
            reference.row_count(),
            current.row_count()
        )));
    }

    let mut columns = Vec::with_capacity(reference.column_count());
    for (ref_idx, name) in reference.columns.iter().enumerate() {
        let cur_idx = current.column_index(name).ok_or_else(|| {
            DataError::drift(format!("column '{name}' is missing from current data"))
        })?;

        let reduction = if options.path_columns.iter().any(|c| c == name) {
            ColumnReduction::FileExtension
        } else {
            ColumnReduction::Value
        };
        let counts = match reduction {
            ColumnReduction::FileExtension => {
                category_counts(reference, ref_idx, current, cur_idx, extension_category)
            }
            ColumnReduction::Value => {
                category_counts(reference, ref_idx, current, cur_idx, str::to_string)
            }
        };

        let ref_counts: Vec<usize> = counts.iter().map(|(_, r, _)| *r).collect();
        let cur_counts: Vec<usize> = counts.iter().map(|(_, _, c)| *c).collect();
        let chi = stats::chi_square_homogeneity(&ref_counts, &cur_counts);
        let psi = stats::population_stability_index(&ref_counts, &cur_counts);
        if !chi.statistic.is_finite() || !chi.p_value.is_finite() || !psi.is_finite() {
            return Err(DataError::drift(format!(
                "non-finite statistic for column '{name}'"
            )));
        }

        let ref_total = reference.row_count();
        let cur_total = current.row_count();
        let categories = counts
            .into_iter()
            .map(|(category, r, c)| CategoryShare {
                category,
                reference_count: r,
                current_count: c,
                reference_share: share(r, ref_total),
                current_share: share(c, cur_total),
            })
            .collect();

        let drift_detected = chi.p_value < options.p_value_threshold;
        tracing::debug!(
            column = %name,
            statistic = chi.statistic,
            p_value = chi.p_value,
            psi,
            drift_detected,
            "Column drift"
        );

        columns.push(ColumnDrift {
            column: name.clone(),
            reduction,
            test: DriftTest::ChiSquare,
            statistic: chi.statistic,
            degrees_of_freedom: chi.degrees_of_freedom,
            p_value: chi.p_value,
            psi,
            severity: DriftSeverity::from_psi(psi),
            drift_detected,
            categories,
        });
    }

    let drifted_columns = columns.iter().filter(|c| c.drift_detected).count();
    let share_of_drifted_columns = share(drifted_columns, columns.len());

    Ok(DriftReport {
        generated_at: Utc::now(),
        reference_rows: reference.row_count(),
        current_rows: current.row_count(),
        p_value_threshold: options.p_value_threshold,
        share_threshold: options.share_threshold,
        drifted_columns,
        share_of_drifted_columns,
        dataset_drift: !columns.is_empty() && share_of_drifted_columns >= options.share_threshold,
        columns,
    })
}

/// Write `data_drift_report.json` and `data_drift_report.html` under `dir`.
pub fn save_drift_report(report: &DriftReport, dir: &Path) -> Result<DriftOutcome, DataError> {
    let json_path = dir.join(DRIFT_REPORT_JSON);
    let html_path = dir.join(DRIFT_REPORT_HTML);

    lungprep_core::persistence::atomic_write_json(&json_path, report)
        .map_err(|e| DataError::drift(format!("{}: {e}", json_path.display())))?;

    let page = html::render(report)?;
    lungprep_core::persistence::atomic_write(&html_path, page.as_bytes())
        .map_err(|e| DataError::drift(format!("{}: {e}", html_path.display())))?;

    tracing::info!(
        json = %json_path.display(),
        html = %html_path.display(),
        dataset_drift = report.dataset_drift,
        drifted_columns = report.drifted_columns,
        "Wrote drift report"
    );

    Ok(DriftOutcome {
        report_generated: true,
        dataset_drift: report.dataset_drift,
        json_path,
        html_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn table(rows: &[(&str, &str)]) -> ManifestTable {
        ManifestTable::new(
            vec!["Label_Image_Path".into(), "Image_Label".into()],
            rows.iter()
                .map(|(p, l)| vec![p.to_string(), l.to_string()])
                .collect(),
        )
    }

    fn labelled(normal: usize, pneumonia: usize) -> ManifestTable {
        let mut rows = Vec::new();
        for i in 0..normal {
            rows.push(vec![format!("/d/NORMAL/n{i}.jpeg"), "NORMAL".to_string()]);
        }
        for i in 0..pneumonia {
            rows.push(vec![format!("/d/PNEUMONIA/p{i}.jpeg"), "PNEUMONIA".to_string()]);
        }
        ManifestTable::new(vec!["Label_Image_Path".into(), "Image_Label".into()], rows)
    }

    #[test]
    fn test_identical_distributions_do_not_drift() {
        let report = detect_drift(&labelled(100, 50), &labelled(50, 25), &DriftOptions::default())
            .unwrap();
        assert_eq!(report.columns.len(), 2);
        assert_eq!(report.drifted_columns, 0);
        assert!(!report.dataset_drift);
    }

    #[test]
    fn test_shifted_labels_drift() {
        let report = detect_drift(&labelled(90, 10), &labelled(10, 90), &DriftOptions::default())
            .unwrap();
        let label = &report.columns[1];
        assert_eq!(label.column, "Image_Label");
        assert!(label.drift_detected);
        assert_eq!(label.severity, DriftSeverity::Significant);
        assert!(!report.columns[0].drift_detected);
        // One of two columns drifted, which meets the default share of 0.5.
        assert!(report.dataset_drift);
    }

    #[test]
    fn test_path_column_is_reduced_to_extension() {
        let reference = table(&[("/a/x.JPEG", "NORMAL"), ("/a/y.png", "PNEUMONIA")]);
        let current = table(&[("/b/z.jpeg", "NORMAL"), ("/b/noext", "PNEUMONIA")]);
        let report = detect_drift(&reference, &current, &DriftOptions::default()).unwrap();

        let path = &report.columns[0];
        assert_eq!(path.reduction, ColumnReduction::FileExtension);
        let categories: Vec<_> = path.categories.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(categories, vec!["jpeg", "png", "(none)"]);
        assert_eq!(path.categories[0].reference_count, 1);
        assert_eq!(path.categories[0].current_count, 1);
    }

    #[test]
    fn test_empty_input_is_drift_error() {
        let err = detect_drift(&labelled(0, 0), &labelled(1, 1), &DriftOptions::default())
            .unwrap_err();
        assert!(matches!(err, DataError::DriftReport(_)));
    }

    #[test]
    fn test_missing_column_is_drift_error() {
        let current = ManifestTable::new(
            vec!["Image_Label".into()],
            vec![vec!["NORMAL".into()]],
        );
        let err = detect_drift(&labelled(1, 1), &current, &DriftOptions::default()).unwrap_err();
        assert!(err.to_string().contains("Label_Image_Path"));
    }

    #[test]
    fn test_save_writes_both_files_even_without_drift() {
        let dir = TempDir::new().unwrap();
        let report = detect_drift(&labelled(10, 10), &labelled(10, 10), &DriftOptions::default())
            .unwrap();
        let outcome = save_drift_report(&report, dir.path()).unwrap();

        assert!(outcome.report_generated);
        assert!(!outcome.dataset_drift);
        assert!(outcome.json_path.is_file());
        assert!(outcome.html_path.is_file());

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&outcome.json_path).unwrap()).unwrap();
        assert_eq!(json["columns"][1]["column"], "Image_Label");
        let html = std::fs::read_to_string(&outcome.html_path).unwrap();
        assert!(html.contains("Image_Label"));
        assert!(html.contains("<table"));
    }
}
