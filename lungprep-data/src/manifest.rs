//! Manifest builder: turns a label-partitioned image tree into a
//! `(image_path, label)` list and persists it as a two-column CSV.

use crate::error::DataError;
use crate::table::ManifestTable;
use crate::types::{Label, MANIFEST_HEADER};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One image and the label of the directory it was found under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub image_path: PathBuf,
    pub label: Label,
}

/// Ordered entries of one partition, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows per label; labels with no rows are absent.
    pub fn label_counts(&self) -> BTreeMap<Label, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.label).or_insert(0) += 1;
        }
        counts
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Walk `root/<LABEL>/**` and list every regular file with its label.
///
/// Label directories and files are visited in file-name order, so the result
/// does not depend on the filesystem's listing order. Hidden entries are
/// skipped, plain files directly under `root` are ignored, and a directory
/// whose name is not a known label aborts the build.
pub fn build_manifest(root: &Path) -> Result<Manifest, DataError> {
    let read = std::fs::read_dir(root).map_err(|e| {
        DataError::layout(format!("cannot read partition directory {}: {e}", root.display()))
    })?;

    let listing = |e: std::io::Error| {
        DataError::layout(format!("listing {}: {e}", root.display()))
    };

    let mut label_dirs = Vec::new();
    for dir_entry in read {
        let dir_entry = dir_entry.map_err(listing)?;
        let name = dir_entry.file_name();
        if is_hidden(&name) || !dir_entry.file_type().map_err(listing)?.is_dir() {
            continue;
        }
        let label: Label = name.to_string_lossy().parse().map_err(|e| {
            DataError::layout(format!(
                "{} under {}: expected only NORMAL and PNEUMONIA directories",
                e,
                root.display()
            ))
        })?;
        label_dirs.push((name, label, dir_entry.path()));
    }
    label_dirs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut entries = Vec::new();
    for (_, label, dir) in label_dirs {
        let before = entries.len();
        let walker = WalkDir::new(&dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
        for item in walker {
            let item = item.map_err(|e| {
                DataError::layout(format!("walking {}: {e}", dir.display()))
            })?;
            if item.file_type().is_file() {
                entries.push(ManifestEntry {
                    image_path: item.into_path(),
                    label,
                });
            }
        }
        tracing::debug!(
            label = %label,
            dir = %dir.display(),
            files = entries.len() - before,
            "Listed label directory"
        );
    }

    Ok(Manifest::new(entries))
}

/// `dest_dir/<basename(dest_dir)>.csv`.
pub fn manifest_file_path(dest_dir: &Path) -> Result<PathBuf, DataError> {
    let base = dest_dir.file_name().ok_or_else(|| {
        DataError::manifest_write(format!(
            "manifest directory has no file name: {}",
            dest_dir.display()
        ))
    })?;
    Ok(dest_dir.join(format!("{}.csv", base.to_string_lossy())))
}

/// Serialize `manifest` under `dest_dir` with the fixed two-column header.
pub fn write_manifest(manifest: &Manifest, dest_dir: &Path) -> Result<PathBuf, DataError> {
    let path = manifest_file_path(dest_dir)?;
    let wrap = |e: csv::Error| {
        DataError::manifest_write(format!("{}: {e}", path.display()))
    };

    let mut writer = csv::Writer::from_path(&path).map_err(wrap)?;
    writer.write_record(MANIFEST_HEADER).map_err(wrap)?;
    for entry in manifest.entries() {
        let image_path = entry.image_path.to_string_lossy();
        writer
            .write_record([&*image_path, entry.label.as_str()])
            .map_err(wrap)?;
    }
    writer
        .flush()
        .map_err(|e| DataError::manifest_write(format!("{}: {e}", path.display())))?;

    tracing::info!(
        path = %path.display(),
        rows = manifest.len(),
        "Wrote manifest"
    );
    Ok(path)
}

/// Read a manifest back as a generic table, whatever its columns.
pub fn read_manifest_table(path: &Path) -> Result<ManifestTable, DataError> {
    ManifestTable::read(path)
}
