//! Uploader lifecycle
//!
//! An [`Uploader`] is empty, cached, or stored. The `force_*` operations
//! always run and overwrite whatever the uploader holds; their guarded
//! counterparts do nothing once a file is present.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use stowage_core::{CacheId, CacheName, Identifier, InvalidParameter, StowageConfig};
use stowage_storage::{
    RawFile, SanitizedFile, StorageBinding, StorageEngine, StorageSelection, StoredFile,
};
use tracing::{debug, info, instrument};

use crate::error::{UploaderError, UploaderResult};
use crate::uploader_type::UploaderType;

/// Non-owning reference to the record an uploader is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub relation: String,
    pub key: String,
}

impl ModelRef {
    pub fn new(relation: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            key: key.into(),
        }
    }
}

/// The live file of an uploader
#[derive(Debug)]
pub enum UploadedFile {
    /// On local disk under the cache directory
    Cached(SanitizedFile),
    /// Persisted by a storage engine
    Stored(Box<dyn StoredFile>),
}

impl UploadedFile {
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Cached(file) => file.path(),
            Self::Stored(file) => file.path(),
        }
    }

    pub fn url(&self) -> Option<String> {
        match self {
            Self::Cached(_) => None,
            Self::Stored(file) => file.url(),
        }
    }

    pub async fn read(&self) -> UploaderResult<Bytes> {
        match self {
            Self::Cached(file) => Ok(file.read().await?),
            Self::Stored(file) => Ok(file.read().await?),
        }
    }

    /// Size of the live file; a blank uploader has nothing to measure
    pub async fn size(&self) -> UploaderResult<u64> {
        match self {
            Self::Cached(file) => Ok(file.size().await?),
            Self::Stored(file) => Ok(file.size().await?),
        }
    }

    pub async fn delete(&self) -> UploaderResult<()> {
        match self {
            Self::Cached(file) => Ok(file.delete().await?),
            Self::Stored(file) => Ok(file.delete().await?),
        }
    }
}

/// Outcome of a guarded retrieve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Retrieval {
    /// The uploader now holds the retrieved file
    Retrieved,
    /// A file was already present; nothing changed
    Occupied,
    /// The token or identifier was malformed; the uploader is unchanged
    Invalid(InvalidParameter),
}

impl Retrieval {
    pub fn is_retrieved(&self) -> bool {
        matches!(self, Self::Retrieved)
    }
}

/// One attachment: its identifier, cache id, and live file
pub struct Uploader {
    kind: Arc<UploaderType>,
    model: Option<ModelRef>,
    mounted_as: Option<String>,
    identifier: Option<Identifier>,
    cache_id: Option<CacheId>,
    file: Option<UploadedFile>,
    storage_override: Option<StorageSelection>,
    storage: Option<Arc<dyn StorageEngine>>,
}

impl Uploader {
    pub fn new(kind: Arc<UploaderType>) -> Self {
        Self {
            kind,
            model: None,
            mounted_as: None,
            identifier: None,
            cache_id: None,
            file: None,
            storage_override: None,
            storage: None,
        }
    }

    /// Attach to a record attribute
    pub fn mounted_on(mut self, model: ModelRef, mounted_as: impl Into<String>) -> Self {
        self.model = Some(model);
        self.mounted_as = Some(mounted_as.into());
        self.storage = None;
        self
    }

    /// Use `selection` for this instance instead of the type's engine
    pub fn with_storage(mut self, selection: StorageSelection) -> Self {
        self.storage_override = Some(selection);
        self.storage = None;
        self
    }

    pub fn kind(&self) -> &Arc<UploaderType> {
        &self.kind
    }

    pub fn config(&self) -> &StowageConfig {
        self.kind.config()
    }

    pub fn model(&self) -> Option<&ModelRef> {
        self.model.as_ref()
    }

    pub fn mounted_as(&self) -> Option<&str> {
        self.mounted_as.as_deref()
    }

    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    /// Rename the upload; `value` must already be a valid identifier
    pub fn set_identifier(&mut self, value: &str) -> Result<(), InvalidParameter> {
        self.identifier = Some(Identifier::parse(value)?);
        Ok(())
    }

    pub fn cache_id(&self) -> Option<&CacheId> {
        self.cache_id.as_ref()
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    /// Processors may swap or rewrite the live file
    pub fn file_mut(&mut self) -> Option<&mut UploadedFile> {
        self.file.as_mut()
    }

    pub fn is_blank(&self) -> bool {
        self.file.is_none()
    }

    pub fn store_path(&self) -> Option<String> {
        let identifier = self.identifier.as_ref()?;
        Some(self.kind.layout().store_path(self, identifier))
    }

    pub fn cache_path(&self) -> Option<PathBuf> {
        let cache_id = self.cache_id.as_ref()?;
        let identifier = self.identifier.as_ref()?;
        Some(self.kind.layout().cache_path(self, cache_id, identifier))
    }

    /// `cache_id/identifier`, for resuming this upload from another request
    pub fn cache_name(&self) -> Option<String> {
        match (&self.cache_id, &self.identifier) {
            (Some(cache_id), Some(identifier)) => {
                Some(CacheName::new(cache_id.clone(), identifier.clone()).to_string())
            }
            _ => None,
        }
    }

    /// Engine for this instance, built on first use
    pub fn storage(&mut self) -> UploaderResult<Arc<dyn StorageEngine>> {
        if let Some(engine) = &self.storage {
            return Ok(Arc::clone(engine));
        }

        let factory = self.kind.resolve_storage(self.storage_override.as_ref())?;
        let binding = StorageBinding {
            uploader: self.kind.name().to_string(),
            mounted_as: self.mounted_as.clone(),
            config: Arc::clone(self.kind.config()),
        };
        let engine = factory.build(&binding)?;
        debug!(uploader = %self.kind.name(), engine = engine.name(), "Storage resolved");

        self.storage = Some(Arc::clone(&engine));
        Ok(engine)
    }

    /// Cache `raw` under a fresh cache id and run the processors.
    ///
    /// Nothing is assigned unless the input yields a valid identifier and
    /// passes the integrity checks. A failing processor leaves the cached
    /// file in place.
    #[instrument(skip(self, raw), fields(uploader = %self.kind.name()))]
    pub async fn force_cache(&mut self, raw: impl Into<RawFile>) -> UploaderResult<CacheId> {
        let cache_id = CacheId::generate();
        let mut file = SanitizedFile::new(raw);
        if file.is_string() {
            return Err(UploaderError::FormNotMultipart);
        }

        let identifier = Identifier::parse(file.filename().unwrap_or_default())?;
        let size = file.size().await?;
        self.kind.check_integrity(&identifier, size)?;

        let cache_path = self.kind.layout().cache_path(self, &cache_id, &identifier);
        file.move_to(&cache_path).await?;

        info!(
            cache_id = %cache_id,
            identifier = %identifier,
            size_bytes = size,
            "File cached"
        );

        self.cache_id = Some(cache_id.clone());
        self.identifier = Some(identifier);
        self.file = Some(UploadedFile::Cached(file));

        self.process().await?;
        Ok(cache_id)
    }

    /// [`Uploader::force_cache`] unless a file is already present
    pub async fn cache(&mut self, raw: impl Into<RawFile>) -> UploaderResult<Option<CacheId>> {
        if self.file.is_some() {
            return Ok(None);
        }
        self.force_cache(raw).await.map(Some)
    }

    /// Point at the cached file named by `cache_name`.
    ///
    /// The file's existence is not checked here; reading or storing a
    /// missing file fails later.
    pub fn force_retrieve_from_cache(&mut self, cache_name: &str) -> Result<(), InvalidParameter> {
        let CacheName {
            cache_id,
            identifier,
        } = CacheName::parse(cache_name)?;

        let path = self.kind.layout().cache_path(self, &cache_id, &identifier);
        debug!(cache_id = %cache_id, identifier = %identifier, "Retrieved from cache");

        self.cache_id = Some(cache_id);
        self.identifier = Some(identifier);
        self.file = Some(UploadedFile::Cached(SanitizedFile::from_path(path)));
        Ok(())
    }

    /// Guarded [`Uploader::force_retrieve_from_cache`]; a malformed name is
    /// reported as [`Retrieval::Invalid`]
    pub fn retrieve_from_cache(&mut self, cache_name: &str) -> Retrieval {
        if self.file.is_some() {
            return Retrieval::Occupied;
        }
        match self.force_retrieve_from_cache(cache_name) {
            Ok(()) => Retrieval::Retrieved,
            Err(e) => {
                debug!(error = %e, "Ignoring malformed cache name");
                Retrieval::Invalid(e)
            }
        }
    }

    /// Persist the upload through the storage engine.
    ///
    /// With `use_cache` on, `raw` (if given) goes through
    /// [`Uploader::force_cache`] first and the cached file is then stored.
    /// With it off, `raw` is stored directly and no processor runs.
    #[instrument(skip(self, raw), fields(uploader = %self.kind.name()))]
    pub async fn force_store(&mut self, raw: Option<RawFile>) -> UploaderResult<()> {
        if self.config().use_cache {
            if let Some(raw) = raw {
                self.force_cache(raw).await?;
            }

            let store_path = self.store_path().ok_or(UploaderError::NothingCached)?;
            let storage = self.storage()?;
            let Some(UploadedFile::Cached(file)) = self.file.as_mut() else {
                return Err(UploaderError::NothingCached);
            };

            let stored = storage.store(file, &store_path).await?;
            info!(key = %stored.key(), engine = storage.name(), "File stored");
            self.file = Some(UploadedFile::Stored(stored));
        } else {
            let raw = raw.ok_or(UploaderError::NothingCached)?;
            let mut file = SanitizedFile::new(raw);
            if file.is_string() {
                return Err(UploaderError::FormNotMultipart);
            }

            let identifier = Identifier::parse(file.filename().unwrap_or_default())?;
            let size = file.size().await?;
            self.kind.check_integrity(&identifier, size)?;

            let store_path = self.kind.layout().store_path(self, &identifier);
            let storage = self.storage()?;
            let stored = storage.store(&mut file, &store_path).await?;
            info!(
                key = %stored.key(),
                engine = storage.name(),
                size_bytes = size,
                "File stored without caching"
            );

            self.cache_id = None;
            self.identifier = Some(identifier);
            self.file = Some(UploadedFile::Stored(stored));
        }
        Ok(())
    }

    /// Guarded [`Uploader::force_store`]; returns whether anything was stored
    pub async fn store(&mut self, raw: impl Into<RawFile>) -> UploaderResult<bool> {
        if self.file.is_some() {
            return Ok(false);
        }
        self.force_store(Some(raw.into())).await?;
        Ok(true)
    }

    /// Point at the stored file for `identifier`
    #[instrument(skip(self), fields(uploader = %self.kind.name()))]
    pub async fn force_retrieve_from_store(&mut self, identifier: &str) -> UploaderResult<()> {
        self.identifier = Some(Identifier::parse(identifier)?);
        let store_path = self.store_path().ok_or(UploaderError::NothingCached)?;

        let storage = self.storage()?;
        let stored = storage.retrieve(&store_path).await?;
        debug!(key = %stored.key(), "Retrieved from store");

        self.cache_id = None;
        self.file = Some(UploadedFile::Stored(stored));
        Ok(())
    }

    /// Guarded [`Uploader::force_retrieve_from_store`]. A malformed
    /// identifier is reported as [`Retrieval::Invalid`]; engine failures
    /// still propagate.
    pub async fn retrieve_from_store(&mut self, identifier: &str) -> UploaderResult<Retrieval> {
        if self.file.is_some() {
            return Ok(Retrieval::Occupied);
        }
        match self.force_retrieve_from_store(identifier).await {
            Ok(()) => Ok(Retrieval::Retrieved),
            Err(UploaderError::InvalidParameter(e)) => {
                debug!(error = %e, "Ignoring malformed identifier");
                Ok(Retrieval::Invalid(e))
            }
            Err(e) => Err(e),
        }
    }

    /// Run the type's processors in declaration order
    pub async fn process(&mut self) -> UploaderResult<()> {
        let kind = Arc::clone(&self.kind);
        for step in kind.processors().steps() {
            let processor = kind
                .processors()
                .get(&step.name)
                .ok_or_else(|| UploaderError::UnknownProcessor(step.name.clone()))?;

            debug!(processor = %step.name, args = step.args.len(), "Running processor");
            processor
                .call(self, &step.args)
                .await
                .map_err(|source| UploaderError::Processor {
                    name: step.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    pub fn current_path(&self) -> Option<PathBuf> {
        self.file.as_ref()?.path().map(Path::to_path_buf)
    }

    /// Engine URL, else the path relative to `public_root`
    pub fn url(&self) -> Option<String> {
        let file = self.file.as_ref()?;
        if let Some(url) = file.url() {
            return Some(url);
        }

        let relative = file.path()?.strip_prefix(&self.config().public_root).ok()?;
        let segments: Vec<&str> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(segment) => segment.to_str(),
                _ => None,
            })
            .collect();

        if segments.is_empty() {
            None
        } else {
            Some(format!("/{}", segments.join("/")))
        }
    }

    pub async fn read(&self) -> UploaderResult<Bytes> {
        match &self.file {
            Some(file) => file.read().await,
            None => Err(UploaderError::NothingCached),
        }
    }

    /// Size of the live file; a blank uploader has nothing to measure
    pub async fn size(&self) -> UploaderResult<u64> {
        match &self.file {
            Some(file) => file.size().await,
            None => Err(UploaderError::NothingCached),
        }
    }

    /// Delete the live file and return to the empty state
    #[instrument(skip(self), fields(uploader = %self.kind.name()))]
    pub async fn remove(&mut self) -> UploaderResult<()> {
        if let Some(file) = &self.file {
            file.delete().await?;
            info!(identifier = ?self.identifier.as_ref().map(Identifier::as_str), "File removed");
        }
        self.file = None;
        self.cache_id = None;
        self.identifier = None;
        Ok(())
    }
}

impl fmt::Display for Uploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url().unwrap_or_default())
    }
}

impl fmt::Debug for Uploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Uploader")
            .field("kind", &self.kind.name())
            .field("model", &self.model)
            .field("mounted_as", &self.mounted_as)
            .field("identifier", &self.identifier)
            .field("cache_id", &self.cache_id)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}
