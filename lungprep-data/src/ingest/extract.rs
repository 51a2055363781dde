//! Archive extraction.

use crate::error::DataError;
use std::fs::File;
use std::path::Path;

/// Archive formats the ingestion stage can unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from the file extension.
    pub fn detect(path: &Path) -> Result<Self, DataError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "zip" => Ok(Self::Zip),
            _ => Err(DataError::extract(format!(
                "unsupported archive format: {}",
                path.display()
            ))),
        }
    }
}

/// Unpack `archive` into `dest`, returning the number of files written.
///
/// Entries whose names would land outside `dest` abort the extraction.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize, DataError> {
    match ArchiveFormat::detect(archive)? {
        ArchiveFormat::Zip => extract_zip(archive, dest),
    }
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<usize, DataError> {
    let file = File::open(archive_path).map_err(|e| {
        DataError::extract(format!("failed to open {}: {e}", archive_path.display()))
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| {
        DataError::extract(format!("invalid zip archive {}: {e}", archive_path.display()))
    })?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| DataError::extract(format!("entry {i}: {e}")))?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(DataError::extract(format!(
                "entry '{}' escapes the extraction directory",
                entry.name()
            )));
        };
        let out_path = dest.join(relative);

        let create_dir = |dir: &Path| {
            std::fs::create_dir_all(dir).map_err(|e| {
                DataError::extract(format!("failed to create {}: {e}", dir.display()))
            })
        };
        if entry.is_dir() {
            create_dir(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            create_dir(parent)?;
        }
        let mut out = File::create(&out_path).map_err(|e| {
            DataError::extract(format!("failed to create {}: {e}", out_path.display()))
        })?;
        std::io::copy(&mut entry, &mut out).map_err(|e| {
            DataError::extract(format!("failed to extract '{}': {e}", entry.name()))
        })?;
        extracted += 1;
    }

    tracing::info!(
        archive = %archive_path.display(),
        dest = %dest.display(),
        files = extracted,
        "Extracted archive"
    );
    Ok(extracted)
}
