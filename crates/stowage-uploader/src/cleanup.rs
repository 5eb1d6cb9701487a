//! Expired cache removal

use std::io;
use std::path::Path;

use chrono::NaiveDateTime;
use stowage_core::CacheId;
use tokio::fs;
use tracing::{debug, instrument, warn};

/// Remove every directory under `cache_root` named by a cache id generated
/// before `cutoff`. Entries that are not cache directories are left alone.
///
/// Returns the number of directories removed; a missing `cache_root` counts
/// as nothing to clean.
#[instrument(skip(cache_root), fields(cache_root = %cache_root.display()))]
pub async fn clean_cached_files(cache_root: &Path, cutoff: NaiveDateTime) -> io::Result<usize> {
    let mut entries = match fs::read_dir(cache_root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }

        let name = entry.file_name();
        let Some(timestamp) = name
            .to_str()
            .and_then(|name| CacheId::parse(name).ok())
            .and_then(|cache_id| cache_id.timestamp())
        else {
            continue;
        };

        if timestamp < cutoff {
            match fs::remove_dir_all(entry.path()).await {
                Ok(()) => {
                    debug!(cache_id = ?name, "Expired cache removed");
                    removed += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(cache_id = ?name, error = %e, "Failed to remove expired cache");
                    return Err(e);
                }
            }
        }
    }

    Ok(removed)
}
