//! # lungprep-core
//!
//! Configuration and persistence primitives shared by the lungprep pipeline
//! crates: the layered [`AppConfig`], the per-run [`PipelinePaths`], and the
//! atomic-write / clean-directory helpers every stage builds its output with.

pub mod config;
pub mod error;
pub mod persistence;

pub use config::{
    AppConfig, AugmentationSettings, ClassMode, DataIngestionConfig, DataTransformationConfig,
    DataValidationConfig, GeneratorSettings, Interpolation, PipelinePaths, load_config,
    run_timestamp,
};
pub use error::ConfigError;
pub use persistence::CleanDir;
