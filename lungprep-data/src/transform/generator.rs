//! Directory-backed batch generator with optional augmentation.

use super::augment::{AugmentationOptions, apply_affine, random_transform};
use crate::error::DataError;
use crate::types::Label;
use image::imageops::FilterType;
use lungprep_core::{ClassMode, GeneratorSettings, Interpolation};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// How images are read, batched and optionally written back out.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowOptions {
    /// Images are resized to `target_size` x `target_size`.
    pub target_size: u32,
    pub batch_size: usize,
    pub interpolation: Interpolation,
    pub class_mode: ClassMode,
    pub shuffle: bool,
    pub seed: Option<u64>,
    /// Every produced sample is also written here as PNG when set.
    pub save_to_dir: Option<PathBuf>,
    pub save_prefix: String,
}

impl FlowOptions {
    pub fn from_settings(settings: &GeneratorSettings) -> Self {
        Self {
            target_size: settings.image_size,
            batch_size: settings.batch_size,
            interpolation: settings.interpolation,
            class_mode: settings.class_mode,
            shuffle: settings.shuffle,
            seed: settings.seed,
            save_to_dir: None,
            save_prefix: settings.save_prefix.clone(),
        }
    }

    pub fn with_save_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save_to_dir = Some(dir.into());
        self
    }
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self::from_settings(&GeneratorSettings::default())
    }
}

fn filter_type(interpolation: Interpolation) -> FilterType {
    match interpolation {
        Interpolation::Nearest => FilterType::Nearest,
        Interpolation::Bilinear => FilterType::Triangle,
        Interpolation::Bicubic => FilterType::CatmullRom,
    }
}

/// A batch of images in NHWC layout plus their encoded labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// `[n, height, width, 3]` values, already rescaled.
    pub images: Vec<f32>,
    pub shape: [usize; 4],
    /// One value per sample (binary) or one row per sample (categorical).
    pub labels: Vec<f32>,
    pub label_width: usize,
    /// Source file of each sample.
    pub paths: Vec<PathBuf>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.shape[0] == 0
    }

    /// Label row of sample `i`.
    pub fn label(&self, i: usize) -> &[f32] {
        &self.labels[i * self.label_width..(i + 1) * self.label_width]
    }
}

/// Rescaling plus optional random augmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDataGenerator {
    pub rescale: f32,
    pub augmentation: Option<AugmentationOptions>,
}

impl ImageDataGenerator {
    pub fn new(rescale: f32) -> Self {
        Self {
            rescale,
            augmentation: None,
        }
    }

    pub fn with_augmentation(mut self, options: AugmentationOptions) -> Self {
        self.augmentation = Some(options);
        self
    }

    /// Index `dir/<class>/**` for each of `classes` and return an iterator
    /// over batches. Class indices follow the order of `classes`.
    ///
    /// Only `png`, `jpg` and `jpeg` files are indexed. A manifest of the same
    /// tree lists every regular file, so stray non-image files make its row
    /// count larger than [`DirectoryIterator::samples`].
    pub fn flow_from_directory(
        &self,
        dir: &Path,
        classes: &[Label],
        options: FlowOptions,
    ) -> Result<DirectoryIterator, DataError> {
        if options.batch_size == 0 {
            return Err(DataError::transform("batch size must be positive"));
        }
        if options.target_size == 0 {
            return Err(DataError::transform("target size must be positive"));
        }

        let mut samples = Vec::new();
        for (class_index, label) in classes.iter().enumerate() {
            let class_dir = dir.join(label.as_str());
            if !class_dir.is_dir() {
                return Err(DataError::transform(format!(
                    "class directory not found: {}",
                    class_dir.display()
                )));
            }
            let walker = WalkDir::new(&class_dir)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
            for entry in walker {
                let entry = entry.map_err(|e| {
                    DataError::transform(format!("walking {}: {e}", class_dir.display()))
                })?;
                if entry.file_type().is_file() && has_image_extension(entry.path()) {
                    samples.push((entry.into_path(), class_index));
                }
            }
        }

        tracing::info!(
            dir = %dir.display(),
            images = samples.len(),
            classes = classes.len(),
            "Indexed images"
        );

        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut iter = DirectoryIterator {
            order: (0..samples.len()).collect(),
            samples,
            classes: classes.to_vec(),
            generator: self.clone(),
            options,
            cursor: 0,
            rng,
        };
        iter.reset();
        Ok(iter)
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

/// Lazy batch iterator over an indexed directory.
///
/// One pass over the samples is one epoch; [`DirectoryIterator::reset`]
/// starts the next one with a fresh shuffle.
#[derive(Debug)]
pub struct DirectoryIterator {
    samples: Vec<(PathBuf, usize)>,
    classes: Vec<Label>,
    order: Vec<usize>,
    generator: ImageDataGenerator,
    options: FlowOptions,
    cursor: usize,
    rng: StdRng,
}

impl DirectoryIterator {
    /// Number of indexed images.
    pub fn samples(&self) -> usize {
        self.samples.len()
    }

    /// Batches per epoch.
    pub fn len(&self) -> usize {
        self.samples.len().div_ceil(self.options.batch_size)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Restart at the beginning of a new epoch.
    pub fn reset(&mut self) {
        self.cursor = 0;
        if self.options.shuffle {
            self.order.shuffle(&mut self.rng);
        }
    }

    fn load_sample(&mut self, sample: usize) -> Result<Vec<f32>, DataError> {
        let (path, _) = &self.samples[sample];
        let size = self.options.target_size;
        let img = image::open(path)
            .map_err(|e| DataError::transform(format!("cannot decode {}: {e}", path.display())))?
            .to_rgb8();
        let mut img = if img.dimensions() == (size, size) {
            img
        } else {
            image::imageops::resize(&img, size, size, filter_type(self.options.interpolation))
        };

        if let Some(augmentation) = &self.generator.augmentation {
            let params = random_transform(augmentation, size, size, &mut self.rng);
            if !params.is_identity() {
                img = apply_affine(&img, &params);
            }
        }

        if let Some(dir) = &self.options.save_to_dir {
            let name = format!(
                "{}_{}_{}.png",
                self.options.save_prefix,
                sample,
                self.rng.gen_range(0..10_000_000u32)
            );
            let out = dir.join(name);
            img.save(&out)
                .map_err(|e| DataError::transform(format!("cannot save {}: {e}", out.display())))?;
        }

        let rescale = self.generator.rescale;
        Ok(img.into_raw().into_iter().map(|v| v as f32 * rescale).collect())
    }

    fn encode_label(&self, class_index: usize, out: &mut Vec<f32>) {
        match self.options.class_mode {
            ClassMode::Binary => out.push(class_index as f32),
            ClassMode::Categorical => {
                out.extend((0..self.classes.len()).map(|i| if i == class_index { 1.0 } else { 0.0 }))
            }
        }
    }

    fn next_batch(&mut self) -> Result<Batch, DataError> {
        let end = (self.cursor + self.options.batch_size).min(self.order.len());
        let picked: Vec<usize> = self.order[self.cursor..end].to_vec();
        self.cursor = end;

        let size = self.options.target_size as usize;
        let label_width = match self.options.class_mode {
            ClassMode::Binary => 1,
            ClassMode::Categorical => self.classes.len(),
        };
        let mut images = Vec::with_capacity(picked.len() * size * size * 3);
        let mut labels = Vec::with_capacity(picked.len() * label_width);
        let mut paths = Vec::with_capacity(picked.len());

        for sample in picked.iter().copied() {
            images.extend(self.load_sample(sample)?);
            let (path, class_index) = &self.samples[sample];
            paths.push(path.clone());
            let class_index = *class_index;
            self.encode_label(class_index, &mut labels);
        }

        Ok(Batch {
            images,
            shape: [picked.len(), size, size, 3],
            labels,
            label_width,
            paths,
        })
    }
}

impl Iterator for DirectoryIterator {
    type Item = Result<Batch, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        Some(self.next_batch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write_image(path: &Path, shade: u8) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(6, 4, Rgb([shade, shade, shade]))
            .save(path)
            .unwrap();
    }

    fn tree(normal: usize, pneumonia: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        for i in 0..normal {
            write_image(&dir.path().join(format!("NORMAL/n{i}.png")), 255);
        }
        for i in 0..pneumonia {
            write_image(&dir.path().join(format!("PNEUMONIA/p{i}.jpeg")), 0);
        }
        dir
    }

    fn options(batch_size: usize) -> FlowOptions {
        FlowOptions {
            target_size: 8,
            batch_size,
            seed: Some(7),
            ..FlowOptions::default()
        }
    }

    #[test]
    fn test_batches_have_expected_shape() {
        let dir = tree(3, 2);
        let generator = ImageDataGenerator::new(1.0 / 255.0);
        let mut flow = generator
            .flow_from_directory(dir.path(), &Label::ALL, options(4))
            .unwrap();
        assert_eq!(flow.samples(), 5);
        assert_eq!(flow.len(), 2);

        let first = flow.next().unwrap().unwrap();
        assert_eq!(first.shape, [4, 8, 8, 3]);
        assert_eq!(first.images.len(), 4 * 8 * 8 * 3);
        assert_eq!(first.labels.len(), 4);
        assert!(first.images.iter().all(|v| (0.0..=1.0).contains(v)));

        let second = flow.next().unwrap().unwrap();
        assert_eq!(second.len(), 1);
        assert!(flow.next().is_none());
    }

    #[test]
    fn test_non_image_files_are_not_indexed() {
        let dir = tree(2, 1);
        std::fs::write(dir.path().join("NORMAL/notes.txt"), b"scan notes").unwrap();
        let flow = ImageDataGenerator::new(1.0)
            .flow_from_directory(dir.path(), &Label::ALL, options(4))
            .unwrap();
        assert_eq!(flow.samples(), 3);

        let manifest = crate::manifest::build_manifest(dir.path()).unwrap();
        assert_eq!(manifest.len(), 4);
    }

    #[test]
    fn test_binary_labels_follow_class_directories() {
        let dir = tree(2, 2);
        let generator = ImageDataGenerator::new(1.0 / 255.0);
        let flow = generator
            .flow_from_directory(dir.path(), &Label::ALL, options(16))
            .unwrap();
        for batch in flow {
            let batch = batch.unwrap();
            for (i, path) in batch.paths.iter().enumerate() {
                let expected = if path.to_string_lossy().contains("PNEUMONIA") {
                    1.0
                } else {
                    0.0
                };
                assert_eq!(batch.label(i), [expected]);
                // White images are NORMAL, black ones PNEUMONIA.
                let pixel = batch.images[i * 8 * 8 * 3];
                assert!((pixel - (1.0 - expected)).abs() < 0.05, "{pixel}");
            }
        }
    }

    #[test]
    fn test_categorical_labels_are_one_hot() {
        let dir = tree(1, 1);
        let generator = ImageDataGenerator::new(1.0);
        let mut opts = options(2);
        opts.class_mode = ClassMode::Categorical;
        let batch = generator
            .flow_from_directory(dir.path(), &Label::ALL, opts)
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(batch.label_width, 2);
        for i in 0..2 {
            assert_eq!(batch.label(i).iter().sum::<f32>(), 1.0);
        }
    }

    #[test]
    fn test_reset_restarts_epoch() {
        let dir = tree(3, 3);
        let generator = ImageDataGenerator::new(1.0);
        let mut flow = generator
            .flow_from_directory(dir.path(), &Label::ALL, options(4))
            .unwrap();
        assert_eq!(flow.by_ref().count(), 2);
        assert!(flow.next().is_none());

        flow.reset();
        let total: usize = flow.by_ref().map(|b| b.unwrap().len()).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let dir = tree(4, 4);
        let generator = ImageDataGenerator::new(1.0);
        let order = |seed| {
            let mut opts = options(8);
            opts.seed = Some(seed);
            generator
                .flow_from_directory(dir.path(), &Label::ALL, opts)
                .unwrap()
                .next()
                .unwrap()
                .unwrap()
                .paths
        };
        assert_eq!(order(11), order(11));
    }

    #[test]
    fn test_single_class_flow_saves_augmented_samples() {
        let dir = tree(3, 5);
        let out = TempDir::new().unwrap();
        let generator =
            ImageDataGenerator::new(1.0 / 255.0).with_augmentation(AugmentationOptions::default());
        let mut flow = generator
            .flow_from_directory(
                dir.path(),
                &[Label::Pneumonia],
                options(4).with_save_dir(out.path()),
            )
            .unwrap();
        assert_eq!(flow.samples(), 5);

        let batch = flow.next().unwrap().unwrap();
        // Only one class, so it is class 0.
        assert!(batch.labels.iter().all(|l| *l == 0.0));

        let saved: Vec<String> = std::fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(saved.len(), 4);
        assert!(saved.iter().all(|n| n.starts_with("aug_") && n.ends_with(".png")));
    }

    #[test]
    fn test_missing_class_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("NORMAL")).unwrap();
        let err = ImageDataGenerator::new(1.0)
            .flow_from_directory(dir.path(), &Label::ALL, options(2))
            .unwrap_err();
        assert!(matches!(err, DataError::Transform(_)));
    }

    #[test]
    fn test_undecodable_image_is_transform_error() {
        let dir = tree(0, 1);
        std::fs::create_dir_all(dir.path().join("NORMAL")).unwrap();
        std::fs::write(dir.path().join("NORMAL/broken.png"), b"not png").unwrap();
        let mut flow = ImageDataGenerator::new(1.0)
            .flow_from_directory(dir.path(), &Label::ALL, options(2))
            .unwrap();
        let err = flow.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("cannot decode"));
    }
}
