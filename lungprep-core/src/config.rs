//! Configuration system for lungprep.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment.
//! The config file is `<root>/config/config.toml` unless an explicit path is given.
//! Every directory the pipeline touches is derived from this one structure by
//! [`PipelinePaths`], so no component reads settings on its own.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Directory (relative to the root) holding `config.toml` and the schema file.
pub const CONFIG_DIR_NAME: &str = "config";
/// Name of the layered configuration file.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Environment variable prefix; nested keys use `__`.
pub const ENV_PREFIX: &str = "LUNGPREP_";

const DATA_INGESTION_ARTIFACT_DIR: &str = "data_ingestion";
const DATA_VALIDATION_ARTIFACT_DIR: &str = "data_validation";
const DATA_TRANSFORMATION_ARTIFACT_DIR: &str = "data_transformation";

/// Top-level configuration for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub training_pipeline: TrainingPipelineSettings,
    pub data_ingestion: DataIngestionSettings,
    pub data_validation: DataValidationSettings,
    pub data_transformation: DataTransformationSettings,
    pub generator: GeneratorSettings,
    pub augmentation: AugmentationSettings,
}

/// Where run artifacts are rooted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingPipelineSettings {
    pub pipeline_name: String,
    pub artifact_dir: String,
}

impl Default for TrainingPipelineSettings {
    fn default() -> Self {
        Self {
            pipeline_name: "lung_disease".into(),
            artifact_dir: "artifact".into(),
        }
    }
}

/// Source URL and directory names used while acquiring the corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataIngestionSettings {
    /// Direct download URL of the zipped corpus. `file://` URLs are copied locally.
    pub data_source_url: String,
    pub local_zip_data_dir: String,
    pub local_raw_data_dir: String,
    /// Top-level directory inside the archive holding the three partitions.
    pub unzipped_data_dir: String,
    pub local_ingested_csv_data_dir: String,
    pub local_train_csv_data_dir: String,
    pub local_test_csv_data_dir: String,
    pub local_val_csv_data_dir: String,
    /// Upper bound for the whole download, in seconds.
    pub fetch_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for DataIngestionSettings {
    fn default() -> Self {
        Self {
            data_source_url: String::new(),
            local_zip_data_dir: "zipped_data".into(),
            local_raw_data_dir: "raw_data".into(),
            unzipped_data_dir: "chest_xray".into(),
            local_ingested_csv_data_dir: "ingested_data".into(),
            local_train_csv_data_dir: "train_data".into(),
            local_test_csv_data_dir: "test_data".into(),
            local_val_csv_data_dir: "val_data".into(),
            fetch_timeout_secs: 1800,
            connect_timeout_secs: 30,
        }
    }
}

/// Schema location, report directory and drift thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataValidationSettings {
    pub schema_file_dir: String,
    pub schema_file_name: String,
    pub local_validation_reports_dir: String,
    /// A column drifts when its test p-value falls below this.
    pub drift_p_value_threshold: f64,
    /// The dataset drifts when at least this share of columns drift.
    pub drift_share_threshold: f64,
}

impl Default for DataValidationSettings {
    fn default() -> Self {
        Self {
            schema_file_dir: CONFIG_DIR_NAME.into(),
            schema_file_name: "schema.yaml".into(),
            local_validation_reports_dir: "validation_reports".into(),
            drift_p_value_threshold: 0.05,
            drift_share_threshold: 0.5,
        }
    }
}

/// Output directories for augmented samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTransformationSettings {
    pub transformed_data_dir: String,
    pub transformed_train_data_dir: String,
    pub transformed_test_data_dir: String,
    pub transformed_val_data_dir: String,
}

impl Default for DataTransformationSettings {
    fn default() -> Self {
        Self {
            transformed_data_dir: "transformed_data".into(),
            transformed_train_data_dir: "train".into(),
            transformed_test_data_dir: "test".into(),
            transformed_val_data_dir: "val".into(),
        }
    }
}

/// Resampling filter used when resizing images to the target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    Bilinear,
    Bicubic,
}

/// How class labels are encoded in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassMode {
    /// One `0.0`/`1.0` value per sample.
    Binary,
    /// One-hot vector per sample.
    Categorical,
}

/// Batch-producer parameters handed to the training step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSettings {
    pub image_size: u32,
    pub batch_size: usize,
    pub rescale: f32,
    pub interpolation: Interpolation,
    pub class_mode: ClassMode,
    pub shuffle: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub save_prefix: String,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            image_size: 224,
            batch_size: 64,
            rescale: 1.0 / 255.0,
            interpolation: Interpolation::Bilinear,
            class_mode: ClassMode::Binary,
            shuffle: true,
            seed: None,
            save_prefix: "aug".into(),
        }
    }
}

/// Light geometric augmentation applied to every partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentationSettings {
    /// Maximum rotation in degrees.
    pub rotation_range: f32,
    /// Maximum horizontal shift as a fraction of width.
    pub width_shift_range: f32,
    /// Maximum vertical shift as a fraction of height.
    pub height_shift_range: f32,
    /// Maximum shear angle in degrees.
    pub shear_range: f32,
    /// Zoom is drawn from `[1 - zoom_range, 1 + zoom_range]`.
    pub zoom_range: f32,
    pub horizontal_flip: bool,
}

impl Default for AugmentationSettings {
    fn default() -> Self {
        Self {
            rotation_range: 5.0,
            width_shift_range: 0.1,
            height_shift_range: 0.1,
            shear_range: 0.1,
            zoom_range: 0.1,
            horizontal_flip: true,
        }
    }
}

impl AppConfig {
    /// Check values that deserialize fine but make no sense to run with.
    /// Returns one message per problem; empty means the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.data_ingestion.data_source_url.trim().is_empty() {
            problems.push("data_ingestion.data_source_url is empty".to_string());
        }
        if self.data_ingestion.fetch_timeout_secs == 0 {
            problems.push("data_ingestion.fetch_timeout_secs must be positive".to_string());
        }
        if self.data_ingestion.connect_timeout_secs == 0 {
            problems.push("data_ingestion.connect_timeout_secs must be positive".to_string());
        }

        let p = self.data_validation.drift_p_value_threshold;
        if !(p > 0.0 && p < 1.0) {
            problems.push(format!(
                "data_validation.drift_p_value_threshold must be in (0, 1), got {p}"
            ));
        }
        let share = self.data_validation.drift_share_threshold;
        if !(share > 0.0 && share <= 1.0) {
            problems.push(format!(
                "data_validation.drift_share_threshold must be in (0, 1], got {share}"
            ));
        }

        if self.generator.image_size == 0 {
            problems.push("generator.image_size must be positive".to_string());
        }
        if self.generator.batch_size == 0 {
            problems.push("generator.batch_size must be positive".to_string());
        }
        if self.generator.rescale <= 0.0 {
            problems.push("generator.rescale must be positive".to_string());
        }

        let aug = &self.augmentation;
        if !(0.0..=180.0).contains(&aug.rotation_range) {
            problems.push("augmentation.rotation_range must be within [0, 180]".to_string());
        }
        for (name, value) in [
            ("width_shift_range", aug.width_shift_range),
            ("height_shift_range", aug.height_shift_range),
            ("zoom_range", aug.zoom_range),
        ] {
            if !(0.0..1.0).contains(&value) {
                problems.push(format!("augmentation.{name} must be within [0, 1)"));
            }
        }
        if !(0.0..90.0).contains(&aug.shear_range) {
            problems.push("augmentation.shear_range must be within [0, 90)".to_string());
        }

        problems
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (prefixed with `LUNGPREP_`, nested with `__`)
/// 2. `explicit_file` if given, otherwise `<root>/config/config.toml` when present
/// 3. Built-in defaults
pub fn load_config(root: &Path, explicit_file: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    match explicit_file {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let default_file = default_config_path(root);
            if default_file.exists() {
                figment = figment.merge(Toml::file(&default_file));
            }
        }
    }

    // LUNGPREP_DATA_INGESTION__DATA_SOURCE_URL, LUNGPREP_GENERATOR__BATCH_SIZE, etc.
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    Ok(figment.extract()?)
}

/// `<root>/config/config.toml`.
pub fn default_config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Timestamp naming one pipeline run, e.g. `2026-10-18-09-41-07`.
pub fn run_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string()
}

/// Resolved locations for the ingestion stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataIngestionConfig {
    pub data_source_url: String,
    pub local_zip_data_dir: PathBuf,
    pub local_raw_data_dir: PathBuf,
    pub unzipped_data_dir: String,
    pub local_ingested_csv_data_dir: PathBuf,
    pub local_train_csv_data_dir: PathBuf,
    pub local_test_csv_data_dir: PathBuf,
    pub local_val_csv_data_dir: PathBuf,
    pub fetch_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

/// Resolved locations for the validation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValidationConfig {
    pub schema_file_path: PathBuf,
    pub data_validation_reports_dir: PathBuf,
    pub drift_p_value_threshold: f64,
    pub drift_share_threshold: f64,
}

/// Resolved locations for the transformation stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTransformationConfig {
    pub transformed_train_data_dir: PathBuf,
    pub transformed_test_data_dir: PathBuf,
    pub transformed_val_data_dir: PathBuf,
}

/// All stage configs for one run, namespaced by a single timestamp.
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    pub artifact_dir: PathBuf,
    pub timestamp: String,
    pub data_ingestion: DataIngestionConfig,
    pub data_validation: DataValidationConfig,
    pub data_transformation: DataTransformationConfig,
}

impl PipelinePaths {
    /// Join the configured segments under
    /// `<root>/<pipeline_name>/<artifact_dir>/<stage>/<timestamp>`.
    pub fn resolve(config: &AppConfig, root: &Path, timestamp: &str) -> Self {
        let artifact_dir = root
            .join(&config.training_pipeline.pipeline_name)
            .join(&config.training_pipeline.artifact_dir);

        let ingestion = &config.data_ingestion;
        let ingestion_dir = artifact_dir.join(DATA_INGESTION_ARTIFACT_DIR).join(timestamp);
        let ingested_csv_dir = ingestion_dir.join(&ingestion.local_ingested_csv_data_dir);
        let data_ingestion = DataIngestionConfig {
            data_source_url: ingestion.data_source_url.clone(),
            local_zip_data_dir: ingestion_dir.join(&ingestion.local_zip_data_dir),
            local_raw_data_dir: ingestion_dir.join(&ingestion.local_raw_data_dir),
            unzipped_data_dir: ingestion.unzipped_data_dir.clone(),
            local_train_csv_data_dir: ingested_csv_dir.join(&ingestion.local_train_csv_data_dir),
            local_test_csv_data_dir: ingested_csv_dir.join(&ingestion.local_test_csv_data_dir),
            local_val_csv_data_dir: ingested_csv_dir.join(&ingestion.local_val_csv_data_dir),
            local_ingested_csv_data_dir: ingested_csv_dir,
            fetch_timeout_secs: ingestion.fetch_timeout_secs,
            connect_timeout_secs: ingestion.connect_timeout_secs,
        };

        let validation = &config.data_validation;
        let data_validation = DataValidationConfig {
            schema_file_path: root
                .join(&validation.schema_file_dir)
                .join(&validation.schema_file_name),
            data_validation_reports_dir: artifact_dir
                .join(DATA_VALIDATION_ARTIFACT_DIR)
                .join(timestamp)
                .join(&validation.local_validation_reports_dir),
            drift_p_value_threshold: validation.drift_p_value_threshold,
            drift_share_threshold: validation.drift_share_threshold,
        };

        let transformation = &config.data_transformation;
        let transformed_dir = artifact_dir
            .join(DATA_TRANSFORMATION_ARTIFACT_DIR)
            .join(timestamp)
            .join(&transformation.transformed_data_dir);
        let data_transformation = DataTransformationConfig {
            transformed_train_data_dir: transformed_dir
                .join(&transformation.transformed_train_data_dir),
            transformed_test_data_dir: transformed_dir.join(&transformation.transformed_test_data_dir),
            transformed_val_data_dir: transformed_dir.join(&transformation.transformed_val_data_dir),
        };

        tracing::debug!(
            artifact_dir = %artifact_dir.display(),
            timestamp,
            "Resolved pipeline paths"
        );

        Self {
            artifact_dir,
            timestamp: timestamp.to_string(),
            data_ingestion,
            data_validation,
            data_transformation,
        }
    }
}
