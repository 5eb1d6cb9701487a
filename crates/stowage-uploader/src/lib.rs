//! # stowage-uploader
//!
//! The uploader orchestrates one attachment: it caches an incoming file on
//! local disk, runs the processors declared on its type, and persists the
//! result through a storage engine.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stowage_core::StowageConfig;
//! use stowage_storage::{RawFile, StorageRegistry};
//! use stowage_uploader::UploaderType;
//!
//! let config = Arc::new(StowageConfig::from_env()?);
//! let avatar = UploaderType::builder("avatar", config, Arc::new(StorageRegistry::with_defaults()))
//!     .processor("resize", Resize)
//!     .process(("resize", vec![200.into(), 200.into()]))
//!     .build()?;
//!
//! let mut uploader = avatar.uploader();
//! uploader.force_store(Some(RawFile::bytes("me.png", png))).await?;
//! println!("{:?}", uploader.url());
//! ```

pub mod cleanup;
pub mod error;
pub mod layout;
pub mod processor;
pub mod uploader;
pub mod uploader_type;

pub use cleanup::clean_cached_files;
pub use error::{UploaderError, UploaderResult};
pub use layout::{DefaultLayout, PathLayout};
pub use processor::{processor_fn, FnProcessor, ProcessStep, Processor, ProcessorArg, ProcessorRegistry};
pub use uploader::{ModelRef, Retrieval, UploadedFile, Uploader};
pub use uploader_type::{UploaderType, UploaderTypeBuilder};
