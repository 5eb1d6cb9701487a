//! Local filesystem storage

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::file::SanitizedFile;
use crate::traits::{StorageEngine, StorageError, StorageResult, StoredFile};

/// Local filesystem storage
///
/// Objects live at `root/<store_path>`. Handles carry a path but no URL; the
/// uploader derives a public URL from the path.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a full path
    fn resolve_path(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));

        // Prevent directory traversal
        if key.is_empty() || key.starts_with('/') || key.starts_with('\\') || escapes {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageEngine for FileStorage {
    #[instrument(skip(self, file), fields(storage = "file"))]
    async fn store(
        &self,
        file: &mut SanitizedFile,
        store_path: &str,
    ) -> StorageResult<Box<dyn StoredFile>> {
        let path = self.resolve_path(store_path)?;

        file.move_to(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to move file to {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), key = %store_path, "File stored");

        Ok(Box::new(LocalFile {
            key: store_path.to_string(),
            path,
        }))
    }

    async fn retrieve(&self, store_path: &str) -> StorageResult<Box<dyn StoredFile>> {
        let path = self.resolve_path(store_path)?;
        Ok(Box::new(LocalFile {
            key: store_path.to_string(),
            path,
        }))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Handle to a file under a [`FileStorage`] root
#[derive(Debug, Clone)]
pub struct LocalFile {
    key: String,
    path: PathBuf,
}

impl LocalFile {
    fn not_found(&self, e: io::Error) -> StorageError {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(self.key.clone())
        } else {
            StorageError::IoError(e)
        }
    }
}

#[async_trait]
impl StoredFile for LocalFile {
    fn key(&self) -> &str {
        &self.key
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    async fn read(&self) -> StorageResult<Bytes> {
        let data = fs::read(&self.path).await.map_err(|e| self.not_found(e))?;
        Ok(Bytes::from(data))
    }

    async fn size(&self) -> StorageResult<u64> {
        let meta = fs::metadata(&self.path).await.map_err(|e| self.not_found(e))?;
        Ok(meta.len())
    }

    async fn exists(&self) -> StorageResult<bool> {
        Ok(fs::try_exists(&self.path).await?)
    }

    async fn delete(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "File deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete {}: {}",
                self.path.display(),
                e
            ))),
        }
    }
}
