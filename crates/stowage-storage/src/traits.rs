//! Storage engine contract
//!
//! An engine persists a [`SanitizedFile`] under a store path and can later
//! rebuild a handle for that path without the original bytes.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use stowage_core::StowageConfig;
use thiserror::Error;

use crate::file::SanitizedFile;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown storage engine: {0}")]
    UnknownEngine(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage engine trait - unified interface for storage backends
///
/// `store` must leave the returned handle's `read`, `url`, `path` and `delete`
/// valid. It is called with the uploader's store path as destination.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Persist `file` under `store_path`
    async fn store(
        &self,
        file: &mut SanitizedFile,
        store_path: &str,
    ) -> StorageResult<Box<dyn StoredFile>>;

    /// Rebuild a handle for a previously stored object
    async fn retrieve(&self, store_path: &str) -> StorageResult<Box<dyn StoredFile>>;

    /// Engine name for logging
    fn name(&self) -> &'static str;
}

/// Handle to a stored object
#[async_trait]
pub trait StoredFile: Send + Sync + fmt::Debug {
    /// Store path the object lives under
    fn key(&self) -> &str;

    /// Local filesystem path, for engines that have one
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Engine-provided URL, for engines that serve objects themselves
    fn url(&self) -> Option<String> {
        None
    }

    async fn read(&self) -> StorageResult<Bytes>;

    async fn size(&self) -> StorageResult<u64>;

    async fn exists(&self) -> StorageResult<bool>;

    async fn delete(&self) -> StorageResult<()>;
}

/// What an engine is instantiated for: one uploader instance.
#[derive(Debug, Clone)]
pub struct StorageBinding {
    /// Name of the uploader type
    pub uploader: String,
    /// Attribute the uploader instance is mounted as
    pub mounted_as: Option<String>,
    pub config: Arc<StowageConfig>,
}

/// Builds an engine bound to one uploader instance
pub trait StorageFactory: Send + Sync {
    fn build(&self, binding: &StorageBinding) -> StorageResult<Arc<dyn StorageEngine>>;
}
