//! Image augmentation and batch generation.

pub mod augment;
pub mod generator;
pub mod stage;

pub use augment::{AffineParams, AugmentationOptions, apply_affine, random_transform};
pub use generator::{Batch, DirectoryIterator, FlowOptions, ImageDataGenerator};
pub use stage::DataTransformation;
