//! In-memory storage, for tests and ephemeral setups

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use crate::file::SanitizedFile;
use crate::traits::{StorageEngine, StorageError, StorageResult, StoredFile};

type Objects = Arc<RwLock<HashMap<String, Bytes>>>;

/// In-memory storage
///
/// Clones share the same objects, so one instance can back every uploader
/// that resolves the `memory` engine.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Objects,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStorage").finish_non_exhaustive()
    }
}

#[async_trait]
impl StorageEngine for MemoryStorage {
    async fn store(
        &self,
        file: &mut SanitizedFile,
        store_path: &str,
    ) -> StorageResult<Box<dyn StoredFile>> {
        let data = file.read().await?;
        debug!(key = %store_path, size_bytes = data.len(), "Object stored in memory");

        self.objects
            .write()
            .await
            .insert(store_path.to_string(), data);

        Ok(Box::new(MemoryFile {
            key: store_path.to_string(),
            objects: Arc::clone(&self.objects),
        }))
    }

    async fn retrieve(&self, store_path: &str) -> StorageResult<Box<dyn StoredFile>> {
        Ok(Box::new(MemoryFile {
            key: store_path.to_string(),
            objects: Arc::clone(&self.objects),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Handle to an object in a [`MemoryStorage`]
pub struct MemoryFile {
    key: String,
    objects: Objects,
}

impl fmt::Debug for MemoryFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryFile").field("key", &self.key).finish()
    }
}

#[async_trait]
impl StoredFile for MemoryFile {
    fn key(&self) -> &str {
        &self.key
    }

    async fn read(&self) -> StorageResult<Bytes> {
        self.objects
            .read()
            .await
            .get(&self.key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(self.key.clone()))
    }

    async fn size(&self) -> StorageResult<u64> {
        Ok(self.read().await?.len() as u64)
    }

    async fn exists(&self) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(&self.key))
    }

    async fn delete(&self) -> StorageResult<()> {
        self.objects.write().await.remove(&self.key);
        Ok(())
    }
}
