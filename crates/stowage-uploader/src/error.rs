//! Uploader errors

use stowage_core::{ConfigError, InvalidParameter};
use stowage_storage::StorageError;
use thiserror::Error;

/// Uploader errors
#[derive(Debug, Error)]
pub enum UploaderError {
    /// The input was a bare string, so the submitting form was not multipart encoded
    #[error("Form is not multipart encoded: expected a file, got a string")]
    FormNotMultipart,

    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameter),

    #[error("No cached file to store")]
    NothingCached,

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Unknown processor: {0}")]
    UnknownProcessor(String),

    #[error("Processor {name} failed: {source}")]
    Processor {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type UploaderResult<T> = Result<T, UploaderError>;

impl UploaderError {
    /// Format errors that guarded operations treat as "nothing to retrieve"
    pub fn is_invalid_parameter(&self) -> bool {
        matches!(self, Self::InvalidParameter(_))
    }
}
