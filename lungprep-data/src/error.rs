//! Error types for the pipeline stages.

use lungprep_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingestion,
    Validation,
    Transformation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Ingestion => "data ingestion",
            Stage::Validation => "data validation",
            Stage::Transformation => "data transformation",
        })
    }
}

/// Stage-local failure. Every variant carries the underlying cause in its message.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Extraction failed: {0}")]
    Extract(String),

    #[error("Unexpected partition layout: {0}")]
    PartitionLayout(String),

    #[error("Manifest write failed: {0}")]
    ManifestWrite(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Drift report failed: {0}")]
    DriftReport(String),

    #[error("Transformation failed: {0}")]
    Transform(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DataError {
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    pub fn extract(msg: impl Into<String>) -> Self {
        Self::Extract(msg.into())
    }

    pub fn layout(msg: impl Into<String>) -> Self {
        Self::PartitionLayout(msg.into())
    }

    pub fn manifest_write(msg: impl Into<String>) -> Self {
        Self::ManifestWrite(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn drift(msg: impl Into<String>) -> Self {
        Self::DriftReport(msg.into())
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// The stage this kind of failure belongs to, when it is stage-specific.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Fetch(_) | Self::Extract(_) | Self::PartitionLayout(_) | Self::ManifestWrite(_) => {
                Some(Stage::Ingestion)
            }
            Self::SchemaMismatch(_) | Self::Integrity(_) | Self::DriftReport(_) => {
                Some(Stage::Validation)
            }
            Self::Transform(_) => Some(Stage::Transformation),
            Self::Config(_) | Self::Io(_) => None,
        }
    }
}

/// A stage failure as seen from the pipeline: which stage, and why.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: DataError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: DataError) -> Self {
        Self { stage, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        assert_eq!(DataError::fetch("x").stage(), Some(Stage::Ingestion));
        assert_eq!(DataError::layout("x").stage(), Some(Stage::Ingestion));
        assert_eq!(
            DataError::SchemaMismatch("x".into()).stage(),
            Some(Stage::Validation)
        );
        assert_eq!(DataError::drift("x").stage(), Some(Stage::Validation));
        assert_eq!(DataError::transform("x").stage(), Some(Stage::Transformation));
        let io = DataError::from(std::io::Error::other("disk"));
        assert_eq!(io.stage(), None);
    }

    #[test]
    fn test_pipeline_error_names_stage_and_cause() {
        let err = PipelineError::new(
            Stage::Ingestion,
            DataError::layout("missing partitions: val"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("data ingestion stage failed"), "{msg}");
        assert!(msg.contains("missing partitions: val"), "{msg}");
        assert!(std::error::Error::source(&err).is_some());
    }
}
