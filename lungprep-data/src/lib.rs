//! # lungprep-data
//!
//! The data-preparation stages of the lungprep pipeline:
//!
//! - **Ingestion**: fetch the zipped corpus, extract it, and catalog each
//!   partition into a `(Label_Image_Path, Image_Label)` manifest
//! - **Validation**: manifest existence, schema and label-domain checks,
//!   per-partition reports, and a train-vs-test drift report
//! - **Transformation**: augmenting batch generators for the training step
//!
//! [`Pipeline`] runs the three in order.

pub mod artifact;
pub mod drift;
pub mod error;
pub mod ingest;
pub mod manifest;
pub mod pipeline;
pub mod schema;
pub mod table;
pub mod transform;
pub mod types;
pub mod validate;

pub use artifact::{INGESTION_RESULT_FILE, IngestionResult, TransformationResult, ValidationResult};
pub use drift::{DriftOptions, DriftOutcome, DriftReport, detect_drift, save_drift_report};
pub use error::{DataError, PipelineError, Stage};
pub use ingest::DataIngestion;
pub use manifest::{Manifest, ManifestEntry, build_manifest, read_manifest_table, write_manifest};
pub use pipeline::{Pipeline, PipelineRun};
pub use schema::{ColumnType, SchemaDescriptor};
pub use table::ManifestTable;
pub use transform::{Batch, DataTransformation, DirectoryIterator, FlowOptions, ImageDataGenerator};
pub use types::{ByPartition, Label, Partition};
pub use validate::{DataValidation, SchemaCheck, check_schema};
