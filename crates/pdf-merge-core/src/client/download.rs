use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use crate::error::{Error, Result};

/// Receives the merged bytes once a merge succeeds.
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Deliver `bytes` under the suggested `filename`.
    async fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<()>;
}

/// Writes downloads to the filesystem.
///
/// Bytes are staged in a temporary file next to the destination and then
/// persisted over it, so a failed write never leaves a partial file behind.
#[derive(Debug, Clone)]
pub struct FileDownload {
    target: Target,
}

#[derive(Debug, Clone)]
enum Target {
    /// Save into a directory under the suggested filename
    Dir(PathBuf),
    /// Save to an exact path, ignoring the suggested filename
    File(PathBuf),
}

impl FileDownload {
    pub fn into_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::Dir(dir.into()),
        }
    }

    pub fn to_path(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File(path.into()),
        }
    }

    /// Where a download with the suggested `filename` ends up.
    pub fn destination(&self, filename: &str) -> PathBuf {
        match &self.target {
            Target::Dir(dir) => dir.join(filename),
            Target::File(path) => path.clone(),
        }
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut staged = NamedTempFile::new_in(parent)?;
    staged.write_all(bytes)?;
    staged.flush()?;
    staged
        .persist(path)
        .map_err(|e| Error::Download(format!("{}: {}", path.display(), e.error)))?;
    Ok(())
}

#[async_trait]
impl DownloadSink for FileDownload {
    async fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<()> {
        let path = self.destination(filename);
        let data = bytes.to_vec();
        let target = path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&target, &data))
            .await
            .map_err(|e| Error::Download(format!("write task failed: {e}")))??;

        info!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileDownload::into_dir(dir.path());

        sink.deliver("merged.pdf", b"%PDF-1.5 test").await.unwrap();

        let saved = std::fs::read(dir.path().join("merged.pdf")).unwrap();
        assert_eq!(saved, b"%PDF-1.5 test");
    }

    #[tokio::test]
    async fn test_deliver_to_path_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        std::fs::write(&path, b"old").unwrap();

        FileDownload::to_path(&path)
            .deliver("merged.pdf", b"new")
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        // Only the destination remains; the staging file was consumed.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_deliver_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileDownload::into_dir(dir.path().join("missing"));
        assert!(sink.deliver("merged.pdf", b"x").await.is_err());
    }
}
