//! Path layout
//!
//! Where an uploader caches and stores files. Every method has a default;
//! override any of them to relocate files without touching the lifecycle.

use std::path::PathBuf;

use stowage_core::{CacheId, Identifier};

use crate::uploader::Uploader;

pub trait PathLayout: Send + Sync {
    /// Store key prefix
    fn store_dir(&self, uploader: &Uploader) -> String {
        uploader.config().store_dir.clone()
    }

    /// Root of the per-upload cache directories
    fn cache_dir(&self, uploader: &Uploader) -> PathBuf {
        uploader.config().resolved_cache_dir()
    }

    /// `store_dir/identifier`
    fn store_path(&self, uploader: &Uploader, identifier: &Identifier) -> String {
        let dir = self.store_dir(uploader);
        let dir = dir.trim_end_matches('/');
        if dir.is_empty() {
            identifier.to_string()
        } else {
            format!("{}/{}", dir, identifier)
        }
    }

    /// `cache_dir/cache_id/identifier`
    fn cache_path(&self, uploader: &Uploader, cache_id: &CacheId, identifier: &Identifier) -> PathBuf {
        self.cache_dir(uploader)
            .join(cache_id.as_str())
            .join(identifier.as_str())
    }
}

/// The configured directories, unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLayout;

impl PathLayout for DefaultLayout {}
