//! # stowage-storage
//!
//! Storage abstraction for Stowage.
//!
//! ## Features
//!
//! - `StorageEngine` / `StoredFile`: the contract every backend satisfies
//! - `SanitizedFile`: uniform handle over paths, in-memory uploads, and bare strings
//! - Built-in engines: local filesystem (`file`), in-memory (`memory`), HTTP object store (`remote`)
//! - `StorageRegistry`: engines looked up by name, with explicit override resolution
//!
//! ## Example
//!
//! ```rust,ignore
//! use stowage_storage::{FileStorage, RawFile, SanitizedFile, StorageEngine};
//!
//! let storage = FileStorage::new("public");
//! let mut file = SanitizedFile::new(RawFile::bytes("photo.jpg", data));
//! let stored = storage.store(&mut file, "uploads/photo.jpg").await?;
//! assert_eq!(stored.read().await?, data);
//! ```

pub mod file;
pub mod local;
pub mod memory;
pub mod registry;
pub mod remote;
pub mod traits;

pub use file::{RawFile, SanitizedFile};
pub use local::{FileStorage, LocalFile};
pub use memory::{MemoryFile, MemoryStorage};
pub use registry::{factory_fn, resolve_storage, FnFactory, StorageRegistry, StorageSelection};
pub use remote::{RemoteFile, RemoteStorage};
pub use traits::{StorageBinding, StorageEngine, StorageError, StorageFactory, StorageResult, StoredFile};
