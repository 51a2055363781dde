//! Shared persistence utilities: atomic file writes, JSON load/save, and the
//! clean-directory guard every pipeline stage uses to rebuild its output.

use std::io;
use std::path::{Path, PathBuf};

/// Atomically write JSON data to a file.
///
/// Serializes `data` to pretty-printed JSON, writes to a `.tmp` sibling file,
/// then renames to the target path. Creates parent directories if they don't exist.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, json.as_bytes())
}

/// Atomically write raw bytes to a file.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Load and deserialize JSON from a file.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)?;
    let value =
        serde_json::from_str(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(value))
}

/// A directory that was emptied (or created) for exclusive use by one stage.
///
/// Acquisition builds an empty staging directory next to the target, moves any
/// previous target aside, swaps the staging directory in, and only then deletes
/// the old tree. The target is never observed half-deleted, and if the swap
/// fails the previous contents are put back.
#[derive(Debug)]
pub struct CleanDir {
    path: PathBuf,
}

impl CleanDir {
    /// Ensure `path` exists and is empty.
    pub fn acquire(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("not a directory path: {}", path.display()),
                )
            })?;
        let nonce = uuid::Uuid::new_v4().simple().to_string();

        if !path.exists() {
            std::fs::create_dir_all(&path)?;
            return Ok(Self { path });
        }

        let staging = parent.join(format!(".{name}.staging-{nonce}"));
        let retired = parent.join(format!(".{name}.retired-{nonce}"));
        std::fs::create_dir(&staging)?;

        if let Err(e) = std::fs::rename(&path, &retired) {
            let _ = std::fs::remove_dir(&staging);
            return Err(e);
        }
        if let Err(e) = std::fs::rename(&staging, &path) {
            // Put the previous contents back rather than leave the target missing.
            let _ = std::fs::rename(&retired, &path);
            let _ = std::fs::remove_dir(&staging);
            return Err(e);
        }

        let removal = if retired.is_dir() {
            std::fs::remove_dir_all(&retired)
        } else {
            std::fs::remove_file(&retired)
        };
        if let Err(e) = removal {
            tracing::warn!(
                path = %retired.display(),
                error = %e,
                "Failed to remove retired directory"
            );
        }

        tracing::debug!(path = %path.display(), "Recreated clean directory");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

impl AsRef<Path> for CleanDir {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}
