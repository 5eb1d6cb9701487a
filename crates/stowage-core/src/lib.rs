//! # stowage-core
//!
//! Core types and configuration shared by the Stowage crates.
//!
//! - `InvalidParameter`, the validation error raised by every strict setter
//! - `Identifier`, the sanitized filename used as cache and store key
//! - `CacheId` and `CacheName`, the tokens scoping a cached upload
//! - `StowageConfig`, the read-only configuration surface

pub mod cache_id;
pub mod config;
pub mod error;
pub mod identifier;

pub use cache_id::{CacheId, CacheName};
pub use self::config::{ConfigError, RemoteConfig, StowageConfig};
pub use error::InvalidParameter;
pub use identifier::{sanitize_filename, Identifier};
