//! Artifact storage seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::StorageError;

/// Durable storage for finished artifacts.
///
/// `upload` moves a local file into durable storage and returns its public
/// URL. Once it returns `Ok` the artifact is considered durable and the
/// local copy may be deleted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(&self, local_path: &Path) -> Result<String, StorageError>;
}

/// Filesystem-backed store.
///
/// Copies artifacts into a publish root and returns URLs under a configured
/// base. Useful for single-host deployments and tests; object storage
/// backends implement [`ArtifactStore`] the same way.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    public_base: String,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base: public_base.into(),
        }
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn upload(&self, local_path: &Path) -> Result<String, StorageError> {
        let name = local_path.file_name().ok_or_else(|| {
            StorageError::upload_failed(format!(
                "artifact path has no file name: {}",
                local_path.display()
            ))
        })?;

        tokio::fs::create_dir_all(&self.root).await?;
        let dest = self.root.join(name);
        tokio::fs::copy(local_path, &dest).await?;
        debug!(from = %local_path.display(), to = %dest.display(), "artifact published");

        Ok(format!(
            "{}/{}",
            self.public_base.trim_end_matches('/'),
            name.to_string_lossy()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_store_copies_and_builds_url() {
        let src_dir = tempfile::tempdir().unwrap();
        let publish_dir = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("clip.mp4");
        tokio::fs::write(&src, b"data").await.unwrap();

        let store = LocalArtifactStore::new(publish_dir.path(), "http://media.local/files/");
        let url = store.upload(&src).await.unwrap();

        assert_eq!(url, "http://media.local/files/clip.mp4");
        let copied = tokio::fs::read(publish_dir.path().join("clip.mp4")).await.unwrap();
        assert_eq!(copied, b"data");
        // Source is left in place; deleting it is the caller's decision.
        assert!(src.exists());
    }

    #[tokio::test]
    async fn test_local_store_missing_source_is_io_error() {
        let publish_dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(publish_dir.path(), "http://media.local");
        let err = store
            .upload(Path::new("/nonexistent/clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[tokio::test]
    async fn test_local_store_rejects_bare_directory_path() {
        let publish_dir = tempfile::tempdir().unwrap();
        let store = LocalArtifactStore::new(publish_dir.path(), "http://media.local");
        let err = store.upload(Path::new("/")).await.unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
    }
}
