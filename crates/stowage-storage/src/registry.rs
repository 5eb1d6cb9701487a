//! Engine registry and storage selection
//!
//! Engines are looked up by name in a [`StorageRegistry`]. An uploader type
//! may name one or supply a factory directly; an instance may override both.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::local::FileStorage;
use crate::memory::MemoryStorage;
use crate::remote::RemoteStorage;
use crate::traits::{StorageBinding, StorageEngine, StorageError, StorageFactory, StorageResult};

/// Factory adapter for closures
pub struct FnFactory<F>(F);

/// Wrap a closure as a [`StorageFactory`]
pub fn factory_fn<F>(f: F) -> FnFactory<F>
where
    F: Fn(&StorageBinding) -> StorageResult<Arc<dyn StorageEngine>> + Send + Sync,
{
    FnFactory(f)
}

impl<F> StorageFactory for FnFactory<F>
where
    F: Fn(&StorageBinding) -> StorageResult<Arc<dyn StorageEngine>> + Send + Sync,
{
    fn build(&self, binding: &StorageBinding) -> StorageResult<Arc<dyn StorageEngine>> {
        (self.0)(binding)
    }
}

/// Hands out one engine to every binding
struct SharedEngine(Arc<dyn StorageEngine>);

impl StorageFactory for SharedEngine {
    fn build(&self, _binding: &StorageBinding) -> StorageResult<Arc<dyn StorageEngine>> {
        Ok(Arc::clone(&self.0))
    }
}

struct LocalFactory;

impl StorageFactory for LocalFactory {
    fn build(&self, binding: &StorageBinding) -> StorageResult<Arc<dyn StorageEngine>> {
        Ok(Arc::new(FileStorage::new(&binding.config.public_root)))
    }
}

struct RemoteFactory;

impl StorageFactory for RemoteFactory {
    fn build(&self, binding: &StorageBinding) -> StorageResult<Arc<dyn StorageEngine>> {
        let remote = binding.config.remote.as_ref().ok_or_else(|| {
            StorageError::ConfigError("remote storage selected but not configured".to_string())
        })?;
        Ok(Arc::new(RemoteStorage::new(remote)?))
    }
}

/// How an uploader picks its engine
#[derive(Clone)]
pub enum StorageSelection {
    /// A factory supplied directly
    Engine(Arc<dyn StorageFactory>),
    /// A name looked up in the registry
    Named(String),
}

impl StorageSelection {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn engine(factory: impl StorageFactory + 'static) -> Self {
        Self::Engine(Arc::new(factory))
    }

    /// Use one engine instance for every uploader
    pub fn shared(engine: Arc<dyn StorageEngine>) -> Self {
        Self::Engine(Arc::new(SharedEngine(engine)))
    }
}

impl fmt::Debug for StorageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(_) => f.write_str("Engine(..)"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

/// Engines by name
#[derive(Clone, Default)]
pub struct StorageRegistry {
    engines: HashMap<String, Arc<dyn StorageFactory>>,
}

impl StorageRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `file`, `memory` and `remote`.
    ///
    /// `memory` is one shared [`MemoryStorage`], so objects stored by one
    /// uploader are visible to every other.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register("file", LocalFactory)
            .register_shared("memory", Arc::new(MemoryStorage::new()))
            .register("remote", RemoteFactory);
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl StorageFactory + 'static,
    ) -> &mut Self {
        self.engines.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn register_shared(
        &mut self,
        name: impl Into<String>,
        engine: Arc<dyn StorageEngine>,
    ) -> &mut Self {
        self.register(name, SharedEngine(engine))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StorageFactory>> {
        self.engines.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.engines.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.engines.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn lookup(&self, name: &str) -> StorageResult<Arc<dyn StorageFactory>> {
        self.get(name)
            .ok_or_else(|| StorageError::UnknownEngine(name.to_string()))
    }
}

impl fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageRegistry")
            .field("engines", &self.names())
            .finish()
    }
}

/// Pick the factory for an uploader instance.
///
/// Priority: the instance override, then the type's declared selection, then
/// `default_name`. A direct factory is used as-is; names go through `registry`.
pub fn resolve_storage(
    instance: Option<&StorageSelection>,
    declared: Option<&StorageSelection>,
    registry: &StorageRegistry,
    default_name: &str,
) -> StorageResult<Arc<dyn StorageFactory>> {
    match instance.or(declared) {
        Some(StorageSelection::Engine(factory)) => Ok(Arc::clone(factory)),
        Some(StorageSelection::Named(name)) => registry.lookup(name),
        None => registry.lookup(default_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::StowageConfig;

    fn binding() -> StorageBinding {
        StorageBinding {
            uploader: "avatar".to_string(),
            mounted_as: None,
            config: Arc::new(StowageConfig::default()),
        }
    }

    fn engine_name(factory: &Arc<dyn StorageFactory>) -> &'static str {
        factory.build(&binding()).unwrap().name()
    }

    #[test]
    fn test_defaults_registered() {
        let registry = StorageRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["file", "memory", "remote"]);
    }

    #[test]
    fn test_resolve_default_name() {
        let registry = StorageRegistry::with_defaults();
        let factory = resolve_storage(None, None, &registry, "file").unwrap();
        assert_eq!(engine_name(&factory), "file");
    }

    #[test]
    fn test_declared_name_beats_default() {
        let registry = StorageRegistry::with_defaults();
        let declared = StorageSelection::named("memory");
        let factory = resolve_storage(None, Some(&declared), &registry, "file").unwrap();
        assert_eq!(engine_name(&factory), "memory");
    }

    #[test]
    fn test_explicit_engine_beats_registry() {
        let registry = StorageRegistry::new();
        let declared = StorageSelection::shared(Arc::new(MemoryStorage::new()));
        let factory = resolve_storage(None, Some(&declared), &registry, "missing").unwrap();
        assert_eq!(engine_name(&factory), "memory");
    }

    #[test]
    fn test_instance_override_beats_declared() {
        let registry = StorageRegistry::with_defaults();
        let declared = StorageSelection::named("memory");
        let instance = StorageSelection::engine(factory_fn(|binding: &StorageBinding| {
            Ok(Arc::new(FileStorage::new(&binding.config.public_root)) as Arc<dyn StorageEngine>)
        }));
        let factory =
            resolve_storage(Some(&instance), Some(&declared), &registry, "memory").unwrap();
        assert_eq!(engine_name(&factory), "file");
    }

    #[test]
    fn test_unknown_engine() {
        let registry = StorageRegistry::with_defaults();
        let declared = StorageSelection::named("ftp");
        let result = resolve_storage(None, Some(&declared), &registry, "file");
        assert!(matches!(result, Err(StorageError::UnknownEngine(name)) if name == "ftp"));
    }

    #[test]
    fn test_remote_requires_config() {
        let registry = StorageRegistry::with_defaults();
        let factory = registry.get("remote").unwrap();
        assert!(matches!(
            factory.build(&binding()),
            Err(StorageError::ConfigError(_))
        ));
    }
}
