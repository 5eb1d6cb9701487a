//! Validation error shared by identifier and cache-id parsing

use thiserror::Error;

/// A value handed to a validating setter did not match its required format.
///
/// Strict uploader operations surface this as-is; guarded retrieve operations
/// treat it as "nothing to retrieve".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {parameter}: {value:?}")]
pub struct InvalidParameter {
    /// Which parameter was rejected (`identifier`, `cache_id`, `cache_name`)
    pub parameter: &'static str,
    /// The rejected input, verbatim
    pub value: String,
}

impl InvalidParameter {
    pub fn new(parameter: &'static str, value: impl Into<String>) -> Self {
        Self {
            parameter,
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_message() {
        let err = InvalidParameter::new("identifier", "bad name");
        assert_eq!(err.to_string(), "Invalid identifier: \"bad name\"");
    }
}
