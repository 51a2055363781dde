//! Ingestion coordinator: fetch, extract, locate partitions, write manifests.
//!
//! The four steps run strictly in order and each either completes or fails
//! the stage. Every output directory is rebuilt from scratch on each run.

pub mod extract;
pub mod fetch;

use crate::artifact::{INGESTION_RESULT_FILE, IngestionResult};
use crate::error::DataError;
use crate::manifest::{build_manifest, write_manifest};
use crate::types::{ByPartition, Partition};
use lungprep_core::{CleanDir, DataIngestionConfig};
use std::path::{Path, PathBuf};

pub use extract::{ArchiveFormat, extract_archive};
pub use fetch::{FetchTimeouts, FetchedArchive, fetch_archive, file_name_from_url};

/// Run blocking filesystem work off the async runtime and wait for it.
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, DataError>
where
    F: FnOnce() -> Result<T, DataError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DataError::Io(std::io::Error::other(format!("blocking task failed: {e}"))))?
}

/// `<raw>/<unzipped>/{train,test,val}`, all of which must be directories.
///
/// Nothing is written before this check passes.
pub fn locate_partitions(
    raw_data_dir: &Path,
    unzipped_data_dir: &str,
) -> Result<ByPartition<PathBuf>, DataError> {
    let base = raw_data_dir.join(unzipped_data_dir);
    let dirs = ByPartition::new(
        base.join(Partition::Train.dir_name()),
        base.join(Partition::Test.dir_name()),
        base.join(Partition::Val.dir_name()),
    );

    let missing: Vec<&str> = dirs
        .iter()
        .filter(|(_, dir)| !dir.is_dir())
        .map(|(p, _)| p.dir_name())
        .collect();
    if !missing.is_empty() {
        return Err(DataError::layout(format!(
            "missing partitions under {}: {}",
            base.display(),
            missing.join(", ")
        )));
    }
    Ok(dirs)
}

/// The ingestion stage.
#[derive(Debug, Clone)]
pub struct DataIngestion {
    config: DataIngestionConfig,
}

impl DataIngestion {
    pub fn new(config: DataIngestionConfig) -> Self {
        tracing::info!(url = %config.data_source_url, "Data ingestion started");
        Self { config }
    }

    /// Where [`DataIngestion::initiate`] persists its result.
    pub fn result_path(&self) -> PathBuf {
        self.config
            .local_ingested_csv_data_dir
            .join(INGESTION_RESULT_FILE)
    }

    /// Step 1: fetch the archive into a freshly emptied zip directory.
    pub async fn download_data(&self) -> Result<FetchedArchive, DataError> {
        let zip_dir = self.config.local_zip_data_dir.clone();
        run_blocking(move || {
            CleanDir::acquire(&zip_dir)
                .map_err(|e| DataError::fetch(format!("{}: {e}", zip_dir.display())))
        })
        .await?;

        fetch_archive(
            &self.config.data_source_url,
            &self.config.local_zip_data_dir,
            FetchTimeouts::from_secs(
                self.config.connect_timeout_secs,
                self.config.fetch_timeout_secs,
            ),
        )
        .await
    }

    /// Step 2: unpack into a freshly emptied raw-data directory.
    pub async fn extract_zip_file(&self, archive: &Path) -> Result<PathBuf, DataError> {
        let raw_dir = self.config.local_raw_data_dir.clone();
        let archive = archive.to_path_buf();
        run_blocking(move || {
            let dest = CleanDir::acquire(&raw_dir)
                .map_err(|e| DataError::extract(format!("{}: {e}", raw_dir.display())))?;
            extract_archive(&archive, dest.path())?;
            Ok(dest.into_path())
        })
        .await
    }

    /// Step 4: rebuild the manifest directories and write one manifest per
    /// partition. Returns `(manifest path, rows)` per partition.
    pub async fn materialize_manifests(
        &self,
        partitions: &ByPartition<PathBuf>,
    ) -> Result<ByPartition<(PathBuf, usize)>, DataError> {
        let config = self.config.clone();
        let partitions = partitions.clone();
        run_blocking(move || {
            let clean = |dir: &Path| {
                CleanDir::acquire(dir)
                    .map_err(|e| DataError::manifest_write(format!("{}: {e}", dir.display())))
            };
            clean(&config.local_ingested_csv_data_dir)?;

            let dest_dirs = ByPartition::new(
                config.local_train_csv_data_dir.clone(),
                config.local_test_csv_data_dir.clone(),
                config.local_val_csv_data_dir.clone(),
            );
            ByPartition::try_from_fn(|partition| {
                let dest = clean(dest_dirs.get(partition))?;
                let manifest = build_manifest(partitions.get(partition))?;
                let path = write_manifest(&manifest, dest.path())?;
                tracing::info!(
                    partition = %partition,
                    rows = manifest.len(),
                    path = %path.display(),
                    "Manifest ready"
                );
                Ok((path, manifest.len()))
            })
        })
        .await
    }

    /// Run all four steps and persist the result next to the manifests.
    pub async fn initiate(&self) -> Result<IngestionResult, DataError> {
        let archive = self.download_data().await?;
        let raw_dir = self.extract_zip_file(&archive.path).await?;
        let raw_data_dirs = locate_partitions(&raw_dir, &self.config.unzipped_data_dir)?;
        let manifests = self.materialize_manifests(&raw_data_dirs).await?;

        let result = IngestionResult {
            manifest_paths: manifests.map(|_, (path, _)| path.clone()),
            row_counts: manifests.map(|_, (_, rows)| *rows),
            raw_data_dirs,
            archive_sha256: archive.sha256,
            is_ingested: true,
            message: "Data ingestion completed".into(),
        };

        let result_path = self.result_path();
        result.save(&result_path)?;
        tracing::info!(
            result = %result_path.display(),
            train = result.row_counts.train,
            test = result.row_counts.test,
            val = result.row_counts.val,
            "Data ingestion finished"
        );
        Ok(result)
    }
}
