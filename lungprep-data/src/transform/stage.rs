//! The transformation stage: materialize augmented samples and hand back
//! one generator per partition.

use super::generator::{DirectoryIterator, FlowOptions, ImageDataGenerator};
use crate::artifact::{IngestionResult, TransformationResult};
use crate::error::DataError;
use crate::types::{ByPartition, Label, Partition};
use lungprep_core::{AugmentationSettings, CleanDir, DataTransformationConfig, GeneratorSettings};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct DataTransformation {
    config: DataTransformationConfig,
    generator_settings: GeneratorSettings,
    augmentation: AugmentationSettings,
    raw_data_dirs: ByPartition<PathBuf>,
}

impl DataTransformation {
    pub fn new(
        config: DataTransformationConfig,
        generator_settings: GeneratorSettings,
        augmentation: AugmentationSettings,
        ingestion: &IngestionResult,
    ) -> Self {
        tracing::info!("Data transformation started");
        Self {
            config,
            generator_settings,
            augmentation,
            raw_data_dirs: ingestion.raw_data_dirs.clone(),
        }
    }

    fn transformed_dir(&self, partition: Partition) -> &PathBuf {
        match partition {
            Partition::Train => &self.config.transformed_train_data_dir,
            Partition::Test => &self.config.transformed_test_data_dir,
            Partition::Val => &self.config.transformed_val_data_dir,
        }
    }

    fn image_generator(&self) -> ImageDataGenerator {
        ImageDataGenerator::new(self.generator_settings.rescale)
            .with_augmentation(self.augmentation.clone())
    }

    /// Save one augmented batch per label under
    /// `<transformed>/<partition>/<LABEL>`, then return a generator over the
    /// whole partition.
    pub fn partition_generator(&self, partition: Partition) -> Result<DirectoryIterator, DataError> {
        let source = self.raw_data_dirs.get(partition);
        let dest = CleanDir::acquire(self.transformed_dir(partition)).map_err(|e| {
            DataError::transform(format!(
                "{}: {e}",
                self.transformed_dir(partition).display()
            ))
        })?;

        let generator = self.image_generator();
        for label in Label::ALL {
            let label_dir = dest.path().join(label.as_str());
            std::fs::create_dir_all(&label_dir)?;

            let options =
                FlowOptions::from_settings(&self.generator_settings).with_save_dir(&label_dir);
            let mut flow = generator.flow_from_directory(source, &[label], options)?;
            match flow.next() {
                Some(batch) => {
                    let batch = batch?;
                    tracing::info!(
                        partition = %partition,
                        label = %label,
                        saved = batch.len(),
                        dir = %label_dir.display(),
                        "Saved augmented batch"
                    );
                }
                None => tracing::warn!(
                    partition = %partition,
                    label = %label,
                    "No images to augment"
                ),
            }
        }

        generator.flow_from_directory(
            source,
            &Label::ALL,
            FlowOptions::from_settings(&self.generator_settings),
        )
    }

    pub fn initiate(&self) -> Result<TransformationResult, DataError> {
        let generators = ByPartition::try_from_fn(|p| self.partition_generator(p))?;
        let transformed_dirs = ByPartition::new(
            self.config.transformed_train_data_dir.clone(),
            self.config.transformed_test_data_dir.clone(),
            self.config.transformed_val_data_dir.clone(),
        );

        tracing::info!(
            train = generators.train.samples(),
            test = generators.test.samples(),
            val = generators.val.samples(),
            "Data transformation finished"
        );
        Ok(TransformationResult {
            generators,
            transformed_dirs,
            is_transformed: true,
            message: "Data transformation completed".into(),
        })
    }
}
