//! Sanitized file wrapper
//!
//! Normalizes the inputs an upload can arrive as (a path on disk, an
//! in-memory part, or a bare string from a form that was not multipart
//! encoded) into one handle that can report its name, type and size, and be
//! moved to a destination path.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use stowage_core::sanitize_filename;
use tokio::fs;
use tracing::debug;

/// Raw upload input
#[derive(Debug, Clone)]
pub enum RawFile {
    /// A file already on disk
    Path(PathBuf),
    /// An in-memory upload part
    Bytes {
        filename: String,
        content_type: Option<String>,
        data: Bytes,
    },
    /// A bare string, as submitted by a non-multipart form
    Text(String),
}

impl RawFile {
    pub fn bytes(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::Bytes {
            filename: filename.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Set an explicit content type; only meaningful for in-memory parts
    pub fn with_content_type(self, content_type: impl Into<String>) -> Self {
        match self {
            Self::Bytes { filename, data, .. } => Self::Bytes {
                filename,
                content_type: Some(content_type.into()),
                data,
            },
            other => other,
        }
    }
}

impl From<PathBuf> for RawFile {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for RawFile {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

#[derive(Debug, Clone)]
enum Source {
    Path(PathBuf),
    Memory(Bytes),
    Text(String),
}

/// Uniform handle over an upload
#[derive(Debug, Clone)]
pub struct SanitizedFile {
    source: Source,
    original_filename: Option<String>,
    content_type: Option<String>,
}

impl SanitizedFile {
    pub fn new(raw: impl Into<RawFile>) -> Self {
        match raw.into() {
            RawFile::Path(path) => Self::from_path(path),
            RawFile::Bytes {
                filename,
                content_type,
                data,
            } => Self {
                source: Source::Memory(data),
                original_filename: Some(filename),
                content_type,
            },
            RawFile::Text(text) => Self {
                source: Source::Text(text),
                original_filename: None,
                content_type: None,
            },
        }
    }

    /// Handle for a file at `path`; existence is checked on first read or move.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let original_filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string);
        Self {
            source: Source::Path(path),
            original_filename,
            content_type: None,
        }
    }

    /// Filename as supplied by the client
    pub fn original_filename(&self) -> Option<&str> {
        self.original_filename.as_deref()
    }

    /// Filename reduced to identifier-safe characters
    pub fn filename(&self) -> Option<String> {
        self.original_filename.as_deref().and_then(sanitize_filename)
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::Path(path) => Some(path),
            _ => None,
        }
    }

    /// True for bare-string input; such an input carries no file at all
    pub fn is_string(&self) -> bool {
        matches!(self.source, Source::Text(_))
    }

    /// Explicit content type, else guessed from the original filename
    pub fn content_type(&self) -> Option<String> {
        self.content_type.clone().or_else(|| {
            self.original_filename.as_deref().map(|name| {
                mime_guess::from_path(name)
                    .first_or_octet_stream()
                    .to_string()
            })
        })
    }

    pub async fn size(&self) -> io::Result<u64> {
        match &self.source {
            Source::Path(path) => Ok(fs::metadata(path).await?.len()),
            Source::Memory(data) => Ok(data.len() as u64),
            Source::Text(text) => Ok(text.len() as u64),
        }
    }

    /// Missing or zero-length
    pub async fn is_empty(&self) -> bool {
        self.size().await.map(|size| size == 0).unwrap_or(true)
    }

    pub async fn exists(&self) -> bool {
        match &self.source {
            Source::Path(path) => fs::try_exists(path).await.unwrap_or(false),
            _ => true,
        }
    }

    pub async fn read(&self) -> io::Result<Bytes> {
        match &self.source {
            Source::Path(path) => Ok(Bytes::from(fs::read(path).await?)),
            Source::Memory(data) => Ok(data.clone()),
            Source::Text(text) => Ok(Bytes::from(text.clone())),
        }
    }

    /// Move the bytes to `dest` and point this handle at it.
    ///
    /// Files on disk are renamed, falling back to copy and remove across
    /// filesystems; in-memory data is written out.
    pub async fn move_to(&mut self, dest: impl AsRef<Path>) -> io::Result<()> {
        let dest = dest.as_ref();
        ensure_parent(dest).await?;

        match &self.source {
            Source::Path(path) if path == dest => return Ok(()),
            Source::Path(path) => {
                if let Err(e) = fs::rename(path, dest).await {
                    debug!(from = %path.display(), to = %dest.display(), error = %e, "Rename failed, copying");
                    fs::copy(path, dest).await?;
                    fs::remove_file(path).await?;
                }
            }
            Source::Memory(data) => fs::write(dest, data).await?,
            Source::Text(text) => fs::write(dest, text.as_bytes()).await?,
        }

        self.source = Source::Path(dest.to_path_buf());
        Ok(())
    }

    /// Copy the bytes to `dest`, returning a handle for the copy
    pub async fn copy_to(&self, dest: impl AsRef<Path>) -> io::Result<SanitizedFile> {
        let dest = dest.as_ref();
        ensure_parent(dest).await?;

        match &self.source {
            Source::Path(path) => {
                fs::copy(path, dest).await?;
            }
            Source::Memory(data) => fs::write(dest, data).await?,
            Source::Text(text) => fs::write(dest, text.as_bytes()).await?,
        }

        Ok(Self {
            source: Source::Path(dest.to_path_buf()),
            original_filename: self.original_filename.clone(),
            content_type: self.content_type.clone(),
        })
    }

    /// Remove the file from disk; a missing file is not an error
    pub async fn delete(&self) -> io::Result<()> {
        if let Source::Path(path) = &self.source {
            match fs::remove_file(path).await {
                Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
                _ => {}
            }
        }
        Ok(())
    }
}

async fn ensure_parent(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_from_bytes() {
        let file = SanitizedFile::new(RawFile::bytes("my holiday photo.JPG", "x"));
        assert_eq!(file.original_filename(), Some("my holiday photo.JPG"));
        assert_eq!(file.filename().as_deref(), Some("my_holiday_photo.JPG"));
        assert_eq!(file.content_type().as_deref(), Some("image/jpeg"));
        assert!(file.path().is_none());
        assert!(!file.is_string());
    }

    #[test]
    fn test_explicit_content_type() {
        let file = SanitizedFile::new(
            RawFile::bytes("data.bin", "x").with_content_type("application/x-custom"),
        );
        assert_eq!(file.content_type().as_deref(), Some("application/x-custom"));
    }

    #[test]
    fn test_text_input() {
        let file = SanitizedFile::new(RawFile::text("C:\\fakepath\\photo.jpg"));
        assert!(file.is_string());
        assert_eq!(file.filename(), None);
        assert_eq!(file.content_type(), None);
    }

    #[tokio::test]
    async fn test_move_in_memory_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/dir/out.txt");

        let mut file = SanitizedFile::new(RawFile::bytes("in.txt", "hello"));
        assert_eq!(file.size().await.unwrap(), 5);

        file.move_to(&dest).await.unwrap();
        assert_eq!(file.path(), Some(dest.as_path()));
        assert_eq!(file.original_filename(), Some("in.txt"));
        assert_eq!(fs::read(&dest).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_move_path_removes_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dest = dir.path().join("moved/dest.txt");
        fs::write(&src, "payload").await.unwrap();

        let mut file = SanitizedFile::from_path(&src);
        file.move_to(&dest).await.unwrap();

        assert!(!fs::try_exists(&src).await.unwrap());
        assert_eq!(file.read().await.unwrap(), Bytes::from("payload"));
    }

    #[tokio::test]
    async fn test_copy_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, "copy").await.unwrap();

        let file = SanitizedFile::from_path(&src);
        let copy = file.copy_to(dir.path().join("b.txt")).await.unwrap();

        assert!(file.exists().await);
        assert_eq!(copy.read().await.unwrap(), Bytes::from("copy"));
    }

    #[tokio::test]
    async fn test_missing_path_is_lazy() {
        let dir = tempfile::tempdir().unwrap();
        let file = SanitizedFile::from_path(dir.path().join("missing.txt"));

        assert_eq!(file.filename().as_deref(), Some("missing.txt"));
        assert!(!file.exists().await);
        assert!(file.is_empty().await);
        assert!(file.read().await.is_err());
        assert!(file.delete().await.is_ok());
    }
}
