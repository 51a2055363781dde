//! Shared vocabulary: labels, partitions, and per-partition containers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Manifest column holding the image path.
pub const LABEL_IMAGE_PATH: &str = "Label_Image_Path";
/// Manifest column holding the image label.
pub const IMAGE_LABEL: &str = "Image_Label";
/// Fixed manifest header, in column order.
pub const MANIFEST_HEADER: [&str; 2] = [LABEL_IMAGE_PATH, IMAGE_LABEL];

/// Diagnosis label, taken from the name of the directory an image lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "NORMAL")]
    Normal,
    #[serde(rename = "PNEUMONIA")]
    Pneumonia,
}

impl Label {
    /// All labels in class-index order.
    pub const ALL: [Label; 2] = [Label::Normal, Label::Pneumonia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Normal => "NORMAL",
            Label::Pneumonia => "PNEUMONIA",
        }
    }

    /// Index used for binary / categorical encoding (alphabetical order).
    pub fn class_index(&self) -> usize {
        match self {
            Label::Normal => 0,
            Label::Pneumonia => 1,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" => Ok(Label::Normal),
            "PNEUMONIA" => Ok(Label::Pneumonia),
            other => Err(format!("unknown label '{other}'")),
        }
    }
}

/// One of the three fixed dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Train,
    Test,
    Val,
}

impl Partition {
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Test, Partition::Val];

    /// Directory name of the partition inside the extracted archive.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Test => "test",
            Partition::Val => "val",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// One value per partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByPartition<T> {
    pub train: T,
    pub test: T,
    pub val: T,
}

impl<T> ByPartition<T> {
    pub fn new(train: T, test: T, val: T) -> Self {
        Self { train, test, val }
    }

    /// Build by calling `f` once per partition, in `Partition::ALL` order.
    pub fn try_from_fn<E>(mut f: impl FnMut(Partition) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            train: f(Partition::Train)?,
            test: f(Partition::Test)?,
            val: f(Partition::Val)?,
        })
    }

    pub fn get(&self, partition: Partition) -> &T {
        match partition {
            Partition::Train => &self.train,
            Partition::Test => &self.test,
            Partition::Val => &self.val,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Partition, &T)> {
        Partition::ALL.into_iter().map(move |p| (p, self.get(p)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Partition, &T) -> U) -> ByPartition<U> {
        ByPartition {
            train: f(Partition::Train, &self.train),
            test: f(Partition::Test, &self.test),
            val: f(Partition::Val, &self.val),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse_and_display() {
        assert_eq!("NORMAL".parse::<Label>().unwrap(), Label::Normal);
        assert_eq!("PNEUMONIA".parse::<Label>().unwrap(), Label::Pneumonia);
        assert!("normal".parse::<Label>().is_err());
        assert_eq!(Label::Pneumonia.to_string(), "PNEUMONIA");
        assert_eq!(Label::Normal.class_index(), 0);
        assert_eq!(Label::Pneumonia.class_index(), 1);
    }

    #[test]
    fn test_label_serde_uses_directory_names() {
        let json = serde_json::to_string(&Label::Normal).unwrap();
        assert_eq!(json, "\"NORMAL\"");
    }

    #[test]
    fn test_by_partition_accessors() {
        let counts = ByPartition::new(150, 50, 20);
        assert_eq!(*counts.get(Partition::Test), 50);
        let names: Vec<_> = counts.iter().map(|(p, _)| p.dir_name()).collect();
        assert_eq!(names, vec!["train", "test", "val"]);
        let doubled = counts.map(|_, n| n * 2);
        assert_eq!(doubled.val, 40);

        let built: Result<ByPartition<&str>, ()> = ByPartition::try_from_fn(|p| Ok(p.dir_name()));
        assert_eq!(built.unwrap().train, "train");
    }
}
