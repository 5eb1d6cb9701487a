//! Cache ids and cache names
//!
//! A cache id scopes one upload attempt's cache directory:
//! `YYYYMMDD-HHMM-<pid>-<4-digit random>`. A cache name pairs it with the
//! identifier (`<cache_id>/<identifier>`) so a cached upload can be resumed
//! from another request, e.g. through a hidden form field.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Local, NaiveDateTime};
use rand::Rng;
use regex::Regex;

use crate::error::InvalidParameter;
use crate::identifier::Identifier;

static CACHE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}-\d{4}-\d+-\d{4}$").unwrap());

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M";

/// Token naming a cache directory.
///
/// Unique per process and minute only up to the four random digits; two
/// uploads in the same minute can collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheId(String);

impl CacheId {
    /// Generate a fresh id from the wall clock, process id, and a random suffix
    pub fn generate() -> Self {
        let suffix = rand::rng().random_range(0..10_000u16);
        Self::generate_at(Local::now().naive_local(), std::process::id(), suffix)
    }

    /// Build an id from explicit parts. `suffix` is reduced modulo 10000.
    pub fn generate_at(now: NaiveDateTime, pid: u32, suffix: u16) -> Self {
        Self(format!(
            "{}-{}-{:04}",
            now.format(TIMESTAMP_FORMAT),
            pid,
            suffix % 10_000
        ))
    }

    pub fn parse(value: impl AsRef<str>) -> Result<Self, InvalidParameter> {
        let value = value.as_ref();
        if CACHE_ID_PATTERN.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(InvalidParameter::new("cache_id", value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Minute the id was generated in, if the date digits form a real date
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.0[..13], TIMESTAMP_FORMAT).ok()
    }
}

impl fmt::Display for CacheId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CacheId {
    type Err = InvalidParameter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for CacheId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `<cache_id>/<identifier>` token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheName {
    pub cache_id: CacheId,
    pub identifier: Identifier,
}

impl CacheName {
    pub fn new(cache_id: CacheId, identifier: Identifier) -> Self {
        Self {
            cache_id,
            identifier,
        }
    }

    /// Split on the first `/` and validate both halves.
    pub fn parse(value: impl AsRef<str>) -> Result<Self, InvalidParameter> {
        let value = value.as_ref();
        let (cache_id, identifier) = value
            .split_once('/')
            .ok_or_else(|| InvalidParameter::new("cache_name", value))?;

        Ok(Self {
            cache_id: CacheId::parse(cache_id)?,
            identifier: Identifier::parse(identifier)?,
        })
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cache_id, self.identifier)
    }
}

impl FromStr for CacheName {
    type Err = InvalidParameter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
