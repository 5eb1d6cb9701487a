//! Uploader type definitions
//!
//! An [`UploaderType`] is declared once and shared by every instance: its
//! configuration, storage selection, processors, path layout and integrity
//! rules are fixed at `build()` and never mutated afterwards.

use std::fmt;
use std::sync::Arc;

use chrono::Local;
use stowage_core::{Identifier, StowageConfig};
use stowage_storage::{
    resolve_storage, StorageFactory, StorageRegistry, StorageResult, StorageSelection,
};
use tracing::info;

use crate::cleanup::clean_cached_files;
use crate::error::{UploaderError, UploaderResult};
use crate::layout::{DefaultLayout, PathLayout};
use crate::processor::{ProcessStep, Processor, ProcessorRegistry};
use crate::uploader::Uploader;

/// Type-level uploader definition
pub struct UploaderType {
    name: String,
    config: Arc<StowageConfig>,
    registry: Arc<StorageRegistry>,
    storage: Option<StorageSelection>,
    processors: ProcessorRegistry,
    layout: Arc<dyn PathLayout>,
    extension_allowlist: Option<Vec<String>>,
    max_file_size: Option<u64>,
}

impl UploaderType {
    pub fn builder(
        name: impl Into<String>,
        config: Arc<StowageConfig>,
        registry: Arc<StorageRegistry>,
    ) -> UploaderTypeBuilder {
        UploaderTypeBuilder {
            name: name.into(),
            config,
            registry,
            storage: None,
            processors: ProcessorRegistry::new(),
            layout: Arc::new(DefaultLayout),
            extension_allowlist: None,
            max_file_size: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Arc<StowageConfig> {
        &self.config
    }

    pub fn registry(&self) -> &StorageRegistry {
        &self.registry
    }

    pub fn storage_selection(&self) -> Option<&StorageSelection> {
        self.storage.as_ref()
    }

    pub fn processors(&self) -> &ProcessorRegistry {
        &self.processors
    }

    pub fn layout(&self) -> &dyn PathLayout {
        self.layout.as_ref()
    }

    /// A fresh, empty uploader of this type
    pub fn uploader(self: &Arc<Self>) -> Uploader {
        Uploader::new(Arc::clone(self))
    }

    /// Factory for an instance, honoring its override first
    pub fn resolve_storage(
        &self,
        instance: Option<&StorageSelection>,
    ) -> StorageResult<Arc<dyn StorageFactory>> {
        resolve_storage(
            instance,
            self.storage.as_ref(),
            &self.registry,
            &self.config.storage,
        )
    }

    /// Extension allowlist and size limit
    pub fn check_integrity(&self, identifier: &Identifier, size: u64) -> UploaderResult<()> {
        if let Some(allowlist) = &self.extension_allowlist {
            let extension = identifier.extension().map(str::to_ascii_lowercase);
            let allowed = extension
                .as_deref()
                .is_some_and(|ext| allowlist.iter().any(|a| a == ext));
            if !allowed {
                return Err(UploaderError::Integrity(format!(
                    "{} has an extension outside {:?}",
                    identifier, allowlist
                )));
            }
        }

        if let Some(max) = self.max_file_size {
            if size > max {
                return Err(UploaderError::Integrity(format!(
                    "{} is {} bytes (max: {} bytes)",
                    identifier, size, max
                )));
            }
        }

        Ok(())
    }

    /// Remove this type's cache directories generated more than `older_than` ago
    pub async fn clean_cached_files(
        self: &Arc<Self>,
        older_than: chrono::Duration,
    ) -> UploaderResult<usize> {
        let probe = self.uploader();
        let cache_dir = self.layout.cache_dir(&probe);
        let cutoff = Local::now().naive_local() - older_than;

        let removed = clean_cached_files(&cache_dir, cutoff).await?;
        info!(uploader = %self.name, removed, "Cleaned cached files");
        Ok(removed)
    }
}

impl fmt::Debug for UploaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploaderType")
            .field("name", &self.name)
            .field("storage", &self.storage)
            .field("processors", &self.processors)
            .field("extension_allowlist", &self.extension_allowlist)
            .field("max_file_size", &self.max_file_size)
            .finish_non_exhaustive()
    }
}

/// Builder for [`UploaderType`]
pub struct UploaderTypeBuilder {
    name: String,
    config: Arc<StowageConfig>,
    registry: Arc<StorageRegistry>,
    storage: Option<StorageSelection>,
    processors: ProcessorRegistry,
    layout: Arc<dyn PathLayout>,
    extension_allowlist: Option<Vec<String>>,
    max_file_size: Option<u64>,
}

impl UploaderTypeBuilder {
    /// Select the engine for this type instead of the configured default
    pub fn storage(mut self, selection: StorageSelection) -> Self {
        self.storage = Some(selection);
        self
    }

    /// Define a named processor that steps can refer to
    pub fn processor(mut self, name: impl Into<String>, processor: impl Processor + 'static) -> Self {
        self.processors.define(name, processor);
        self
    }

    /// Append one step
    pub fn process(mut self, step: impl Into<ProcessStep>) -> Self {
        self.processors.process([step.into()]);
        self
    }

    /// Append several steps, in order
    pub fn process_all<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ProcessStep>,
    {
        self.processors.process(steps);
        self
    }

    pub fn layout(mut self, layout: impl PathLayout + 'static) -> Self {
        self.layout = Arc::new(layout);
        self
    }

    /// Accept only these extensions (case-insensitive, without the dot)
    pub fn extension_allowlist<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extension_allowlist = Some(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        );
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    /// Validate the definition and freeze it
    pub fn build(self) -> UploaderResult<Arc<UploaderType>> {
        self.config.validate()?;
        self.processors.validate()?;

        let engine_name = match &self.storage {
            Some(StorageSelection::Engine(_)) => None,
            Some(StorageSelection::Named(name)) => Some(name.as_str()),
            None => Some(self.config.storage.as_str()),
        };
        if let Some(name) = engine_name {
            if !self.registry.contains(name) {
                return Err(stowage_storage::StorageError::UnknownEngine(name.to_string()).into());
            }
        }

        Ok(Arc::new(UploaderType {
            name: self.name,
            config: self.config,
            registry: self.registry,
            storage: self.storage,
            processors: self.processors,
            layout: self.layout,
            extension_allowlist: self.extension_allowlist,
            max_file_size: self.max_file_size,
        }))
    }
}
