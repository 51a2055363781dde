//! Pipeline orchestrator: ingestion, then validation, then transformation.

use crate::artifact::{IngestionResult, TransformationResult, ValidationResult};
use crate::error::{DataError, PipelineError, Stage};
use crate::ingest::{DataIngestion, run_blocking};
use crate::transform::DataTransformation;
use crate::validate::DataValidation;
use lungprep_core::{AppConfig, PipelinePaths, run_timestamp};
use std::path::PathBuf;

/// Everything one full run produced.
#[derive(Debug)]
pub struct PipelineRun {
    pub ingestion: IngestionResult,
    pub validation: ValidationResult,
    pub transformation: TransformationResult,
}

/// A configured run. Paths are resolved once, so every stage shares one
/// timestamp.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: AppConfig,
    root: PathBuf,
    paths: PipelinePaths,
}

fn at(stage: Stage) -> impl FnOnce(DataError) -> PipelineError {
    move |source| {
        tracing::error!(stage = %stage, error = %source, "Stage failed");
        PipelineError::new(stage, source)
    }
}

impl Pipeline {
    pub fn new(config: AppConfig, root: impl Into<PathBuf>) -> Self {
        Self::with_timestamp(config, root, &run_timestamp())
    }

    pub fn with_timestamp(config: AppConfig, root: impl Into<PathBuf>, timestamp: &str) -> Self {
        let root = root.into();
        let paths = PipelinePaths::resolve(&config, &root, timestamp);
        Self {
            config,
            root,
            paths,
        }
    }

    pub fn paths(&self) -> &PipelinePaths {
        &self.paths
    }

    pub async fn start_data_ingestion(&self) -> Result<IngestionResult, PipelineError> {
        DataIngestion::new(self.paths.data_ingestion.clone())
            .initiate()
            .await
            .map_err(at(Stage::Ingestion))
    }

    pub async fn start_data_validation(
        &self,
        ingestion: &IngestionResult,
    ) -> Result<ValidationResult, PipelineError> {
        let config = self.paths.data_validation.clone();
        let ingestion = ingestion.clone();
        run_blocking(move || DataValidation::new(config, &ingestion)?.initiate())
            .await
            .map_err(at(Stage::Validation))
    }

    pub async fn start_data_transformation(
        &self,
        ingestion: &IngestionResult,
    ) -> Result<TransformationResult, PipelineError> {
        let stage = DataTransformation::new(
            self.paths.data_transformation.clone(),
            self.config.generator.clone(),
            self.config.augmentation.clone(),
            ingestion,
        );
        run_blocking(move || stage.initiate())
            .await
            .map_err(at(Stage::Transformation))
    }

    /// Run all three stages in order; the first failure stops the run.
    pub async fn run(&self) -> Result<PipelineRun, PipelineError> {
        tracing::info!(
            root = %self.root.display(),
            timestamp = %self.paths.timestamp,
            "Pipeline started"
        );
        let ingestion = self.start_data_ingestion().await?;
        let validation = self.start_data_validation(&ingestion).await?;
        let transformation = self.start_data_transformation(&ingestion).await?;
        tracing::info!(
            dataset_drift = validation.dataset_drift,
            "Pipeline finished"
        );
        Ok(PipelineRun {
            ingestion,
            validation,
            transformation,
        })
    }
}
