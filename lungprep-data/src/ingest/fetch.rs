//! Download of the zipped corpus.

use crate::error::DataError;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Bounds for one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTimeouts {
    pub connect: Duration,
    /// Covers the whole request, body included.
    pub total: Duration,
}

impl FetchTimeouts {
    pub fn from_secs(connect: u64, total: u64) -> Self {
        Self {
            connect: Duration::from_secs(connect),
            total: Duration::from_secs(total),
        }
    }
}

/// An archive on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArchive {
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: u64,
}

/// Local file name for a download: the last non-empty path segment.
///
/// Query and fragment are dropped by URL parsing, so
/// `https://host/s/abc/chest_xray.zip?dl=1` becomes `chest_xray.zip`.
pub fn file_name_from_url(url: &Url) -> Result<String, DataError> {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .ok_or_else(|| DataError::fetch(format!("cannot derive a file name from {url}")))
}

/// Streaming SHA-256 of a file on disk.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Fetch `source_url` into `dest_dir`.
///
/// `http(s)` URLs are streamed to disk; `file` URLs are copied.
pub async fn fetch_archive(
    source_url: &str,
    dest_dir: &Path,
    timeouts: FetchTimeouts,
) -> Result<FetchedArchive, DataError> {
    let url = Url::parse(source_url)
        .map_err(|e| DataError::fetch(format!("invalid source URL '{source_url}': {e}")))?;
    let dest = dest_dir.join(file_name_from_url(&url)?);

    tracing::info!(url = %url, dest = %dest.display(), "Downloading archive");

    let archive = match url.scheme() {
        "http" | "https" => download(&url, &dest, timeouts).await?,
        "file" => copy_local(&url, &dest).await?,
        other => {
            return Err(DataError::fetch(format!(
                "unsupported URL scheme '{other}' in {url}"
            )));
        }
    };

    tracing::info!(
        path = %archive.path.display(),
        bytes = archive.bytes,
        sha256 = %archive.sha256,
        "Archive downloaded"
    );
    Ok(archive)
}

async fn download(url: &Url, dest: &Path, timeouts: FetchTimeouts) -> Result<FetchedArchive, DataError> {
    let client = reqwest::Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.total)
        .build()
        .map_err(|e| DataError::fetch(format!("failed to create HTTP client: {e}")))?;

    let describe = |e: reqwest::Error| {
        if e.is_timeout() {
            DataError::fetch(format!("timed out fetching {url}: {e}"))
        } else {
            DataError::fetch(format!("request to {url} failed: {e}"))
        }
    };

    let response = client.get(url.clone()).send().await.map_err(describe)?;
    let status = response.status();
    if !status.is_success() {
        return Err(DataError::fetch(format!("{url} returned HTTP {status}")));
    }

    let write_err = |e: std::io::Error| DataError::fetch(format!("{}: {e}", dest.display()));
    let mut file = tokio::fs::File::create(dest).await.map_err(write_err)?;
    let mut hasher = Sha256::new();
    let mut bytes = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(describe)?;
        hasher.update(&chunk);
        bytes += chunk.len() as u64;
        file.write_all(&chunk).await.map_err(write_err)?;
    }
    file.flush().await.map_err(write_err)?;

    Ok(FetchedArchive {
        path: dest.to_path_buf(),
        sha256: format!("{:x}", hasher.finalize()),
        bytes,
    })
}

async fn copy_local(url: &Url, dest: &Path) -> Result<FetchedArchive, DataError> {
    let source = url
        .to_file_path()
        .map_err(|_| DataError::fetch(format!("not a local file URL: {url}")))?;
    let bytes = tokio::fs::copy(&source, dest)
        .await
        .map_err(|e| DataError::fetch(format!("cannot copy {}: {e}", source.display())))?;

    let path = dest.to_path_buf();
    let hash_path = path.clone();
    let sha256 = tokio::task::spawn_blocking(move || hash_file(&hash_path))
        .await
        .map_err(|e| DataError::fetch(format!("hashing task failed: {e}")))?
        .map_err(|e| DataError::fetch(format!("cannot hash {}: {e}", dest.display())))?;

    Ok(FetchedArchive {
        path,
        sha256,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_name_strips_query_and_fragment() {
        let url = Url::parse("https://www.dropbox.com/s/abc123/chest_xray.zip?dl=1").unwrap();
        assert_eq!(file_name_from_url(&url).unwrap(), "chest_xray.zip");

        let url = Url::parse("https://example.com/data/archive.zip#part").unwrap();
        assert_eq!(file_name_from_url(&url).unwrap(), "archive.zip");
    }

    #[test]
    fn test_file_name_ignores_trailing_slash() {
        let url = Url::parse("https://example.com/data/archive.zip/").unwrap();
        assert_eq!(file_name_from_url(&url).unwrap(), "archive.zip");
    }

    #[test]
    fn test_file_name_missing() {
        let url = Url::parse("https://example.com/").unwrap();
        assert!(matches!(
            file_name_from_url(&url).unwrap_err(),
            DataError::Fetch(_)
        ));
    }

    #[test]
    fn test_hash_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            hash_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_fetch_file_url_copies() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("corpus.zip");
        std::fs::write(&source, b"abc").unwrap();
        let dest = dir.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();

        let url = Url::from_file_path(&source).unwrap();
        let fetched = fetch_archive(url.as_str(), &dest, FetchTimeouts::from_secs(5, 5))
            .await
            .unwrap();
        assert_eq!(fetched.path, dest.join("corpus.zip"));
        assert_eq!(fetched.bytes, 3);
        assert!(fetched.sha256.starts_with("ba7816bf"));
    }

    #[tokio::test]
    async fn test_fetch_missing_local_file() {
        let dir = TempDir::new().unwrap();
        let url = Url::from_file_path(dir.path().join("absent.zip")).unwrap();
        let err = fetch_archive(url.as_str(), dir.path(), FetchTimeouts::from_secs(5, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_fetch_unsupported_scheme() {
        let dir = TempDir::new().unwrap();
        let err = fetch_archive("ftp://example.com/a.zip", dir.path(), FetchTimeouts::from_secs(5, 5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unsupported URL scheme"));
    }
}
