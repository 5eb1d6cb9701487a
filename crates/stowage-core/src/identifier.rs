//! Sanitized filenames used as cache and store keys

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::InvalidParameter;

/// Accepted identifier characters, case-insensitive
static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z0-9.\-+_]+$").unwrap());

/// Characters replaced during filename sanitization
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9.\-+_]").unwrap());

/// A validated filename.
///
/// Only constructed through [`Identifier::parse`]: a name containing anything
/// outside `[a-z0-9.\-+_]` is rejected, never normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(value: impl AsRef<str>) -> Result<Self, InvalidParameter> {
        let value = value.as_ref();
        if IDENTIFIER_PATTERN.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(InvalidParameter::new("identifier", value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extension without the dot, if any
    pub fn extension(&self) -> Option<&str> {
        match self.0.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = InvalidParameter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reduce a client-supplied filename to something usable as an identifier.
///
/// Directory components (either separator) are dropped and every unsafe
/// character becomes `_`. Returns `None` when nothing usable remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(UNSAFE_CHARS.replace_all(base, "_").into_owned())
}
