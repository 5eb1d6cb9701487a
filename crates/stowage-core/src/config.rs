//! Configuration types and loading
//!
//! The configuration surface is read-only once loaded: storage selection,
//! directory roots, and the cache-usage policy.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StowageConfig {
    /// Name of the default storage engine (`file`, `memory`, `remote`, or a registered name)
    pub storage: String,
    /// Store key prefix; relative, joined with the identifier to form the store path
    pub store_dir: String,
    /// Cache directory; resolved against `public_root` when relative
    pub cache_dir: PathBuf,
    /// Publicly served directory; local URLs are computed relative to it
    pub public_root: PathBuf,
    /// Run the cache (and processors) before storing
    pub use_cache: bool,
    /// Remote object store settings
    pub remote: Option<RemoteConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RemoteConfig {
    /// Base URL of the object store, e.g. `https://objects.example.com`
    pub endpoint: String,
    pub bucket: String,
    /// Bearer token sent with every request
    #[serde(default)]
    pub access_token: Option<String>,
    /// Public base URL for stored objects; defaults to the object URL
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}

impl Default for StowageConfig {
    fn default() -> Self {
        Self {
            storage: "file".to_string(),
            store_dir: "uploads".to_string(),
            cache_dir: PathBuf::from("uploads/tmp"),
            public_root: PathBuf::from("public"),
            use_cache: true,
            remote: None,
        }
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable not set: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
    #[error("Config file error: {0}")]
    FileError(#[from] config::ConfigError),
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

impl StowageConfig {
    /// Load configuration from `STOWAGE_*` environment variables over the defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.env`, then `path` (format chosen by extension, optional), then
    /// the same `STOWAGE_*` variables [`StowageConfig::from_env`] reads.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let path = path.as_ref();

        let mut config: Self = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .build()?
            .try_deserialize()?;
        config.apply_env()?;

        config.validate()?;
        debug!(path = %path.display(), storage = %config.storage, "Configuration loaded");
        Ok(config)
    }

    /// Override fields from `STOWAGE_*` variables.
    ///
    /// `STOWAGE_REMOTE_BUCKET` is required when `STOWAGE_REMOTE_ENDPOINT`
    /// introduces a remote section that was not configured before.
    fn apply_env(&mut self) -> Result<(), ConfigError> {
        let var = |key: &str| std::env::var(key).ok();

        if let Some(storage) = var("STOWAGE_STORAGE") {
            self.storage = storage;
        }
        if let Some(dir) = var("STOWAGE_STORE_DIR") {
            self.store_dir = dir;
        }
        if let Some(dir) = var("STOWAGE_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(root) = var("STOWAGE_PUBLIC_ROOT") {
            self.public_root = PathBuf::from(root);
        }
        if let Some(v) = var("STOWAGE_USE_CACHE") {
            self.use_cache = parse_bool(&v);
        }

        let endpoint = var("STOWAGE_REMOTE_ENDPOINT");
        let bucket = var("STOWAGE_REMOTE_BUCKET");
        let remote = match (self.remote.take(), endpoint) {
            (Some(mut remote), endpoint) => {
                if let Some(endpoint) = endpoint {
                    remote.endpoint = endpoint;
                }
                if let Some(bucket) = bucket {
                    remote.bucket = bucket;
                }
                Some(remote)
            }
            (None, Some(endpoint)) => Some(RemoteConfig {
                endpoint,
                bucket: bucket.ok_or_else(|| {
                    ConfigError::MissingEnvVar("STOWAGE_REMOTE_BUCKET".to_string())
                })?,
                access_token: None,
                public_url: None,
                timeout_seconds: default_timeout_seconds(),
            }),
            (None, None) => None,
        };

        self.remote = remote.map(|mut remote| {
            if let Some(token) = var("STOWAGE_REMOTE_ACCESS_TOKEN") {
                remote.access_token = Some(token);
            }
            if let Some(url) = var("STOWAGE_REMOTE_PUBLIC_URL") {
                remote.public_url = Some(url);
            }
            if let Some(timeout) = var("STOWAGE_REMOTE_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
                remote.timeout_seconds = timeout;
            }
            remote
        });
        Ok(())
    }

    /// Check every option; run once at load time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.trim().is_empty() {
            return Err(ConfigError::invalid("storage", "must name a storage engine"));
        }

        let store_dir = Path::new(&self.store_dir);
        if store_dir.is_absolute() || self.store_dir.starts_with('/') {
            return Err(ConfigError::invalid("store_dir", "must be a relative key prefix"));
        }
        if store_dir.components().any(|c| c == Component::ParentDir) {
            return Err(ConfigError::invalid("store_dir", "must not contain '..'"));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("cache_dir", "must not be empty"));
        }

        if let Some(remote) = &self.remote {
            if !(remote.endpoint.starts_with("http://") || remote.endpoint.starts_with("https://")) {
                return Err(ConfigError::invalid("remote.endpoint", "must be an http(s) URL"));
            }
            if remote.bucket.trim().is_empty() {
                return Err(ConfigError::invalid("remote.bucket", "must not be empty"));
            }
        } else if self.storage == "remote" {
            return Err(ConfigError::invalid("remote", "required when storage = \"remote\""));
        }

        Ok(())
    }

    /// Cache directory as a filesystem path
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.public_root.join(&self.cache_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard};

    // Tests touching STOWAGE_* variables (including every `load`) run one at a time.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct EnvVars {
        keys: Vec<&'static str>,
        _lock: MutexGuard<'static, ()>,
    }

    impl EnvVars {
        fn set(vars: &[(&'static str, &str)]) -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            for (key, value) in vars {
                std::env::set_var(key, value);
            }
            Self {
                keys: vars.iter().map(|(key, _)| *key).collect(),
                _lock: lock,
            }
        }
    }

    impl Drop for EnvVars {
        fn drop(&mut self) {
            for key in &self.keys {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = StowageConfig::default();
        assert_eq!(config.storage, "file");
        assert_eq!(config.store_dir, "uploads");
        assert!(config.use_cache);
        assert!(config.validate().is_ok());
        assert_eq!(config.resolved_cache_dir(), PathBuf::from("public/uploads/tmp"));
    }

    #[test]
    fn test_absolute_cache_dir_wins() {
        let config = StowageConfig {
            cache_dir: PathBuf::from("/var/cache/stowage"),
            ..Default::default()
        };
        assert_eq!(config.resolved_cache_dir(), PathBuf::from("/var/cache/stowage"));
    }

    #[test]
    fn test_validate_store_dir() {
        let absolute = StowageConfig {
            store_dir: "/srv/uploads".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            absolute.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "store_dir"
        ));

        let escaping = StowageConfig {
            store_dir: "uploads/../../etc".to_string(),
            ..Default::default()
        };
        assert!(escaping.validate().is_err());
    }

    #[test]
    fn test_validate_remote() {
        let missing = StowageConfig {
            storage: "remote".to_string(),
            ..Default::default()
        };
        assert!(missing.validate().is_err());

        let bad_endpoint = StowageConfig {
            storage: "remote".to_string(),
            remote: Some(RemoteConfig {
                endpoint: "objects.example.com".to_string(),
                bucket: "b".to_string(),
                access_token: None,
                public_url: None,
                timeout_seconds: 30,
            }),
            ..Default::default()
        };
        assert!(bad_endpoint.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
storage = "remote"
store_dir = "attachments"
use_cache = false

[remote]
endpoint = "https://objects.example.com"
bucket = "media"
"#
        )
        .unwrap();

        let _env = EnvVars::set(&[]);
        let config = StowageConfig::load(file.path()).unwrap();
        assert_eq!(config.storage, "remote");
        assert_eq!(config.store_dir, "attachments");
        assert!(!config.use_cache);
        assert_eq!(config.cache_dir, PathBuf::from("uploads/tmp"));

        let remote = config.remote.unwrap();
        assert_eq!(remote.bucket, "media");
        assert_eq!(remote.timeout_seconds, 30);
        assert_eq!(remote.access_token, None);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "store_dir = \"../outside\"").unwrap();
        let _env = EnvVars::set(&[]);

        assert!(matches!(
            StowageConfig::load(file.path()),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_both_loaders_read_the_same_variables() {
        let _env = EnvVars::set(&[
            ("STOWAGE_STORAGE", "remote"),
            ("STOWAGE_REMOTE_ENDPOINT", "https://objects.example.com"),
            ("STOWAGE_REMOTE_BUCKET", "media"),
            ("STOWAGE_USE_CACHE", "False"),
        ]);
        let dir = tempfile::tempdir().unwrap();

        let from_env = StowageConfig::from_env().unwrap();
        let loaded = StowageConfig::load(dir.path().join("absent.toml")).unwrap();

        assert_eq!(from_env, loaded);
        assert_eq!(loaded.storage, "remote");
        assert!(!loaded.use_cache);
        let remote = loaded.remote.unwrap();
        assert_eq!(remote.endpoint, "https://objects.example.com");
        assert_eq!(remote.bucket, "media");
    }

    #[test]
    fn test_env_overrides_file_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
storage = "remote"

[remote]
endpoint = "https://objects.example.com"
bucket = "media"
timeout_seconds = 10
"#
        )
        .unwrap();
        let _env = EnvVars::set(&[
            ("STOWAGE_REMOTE_BUCKET", "archive"),
            ("STOWAGE_STORE_DIR", "files"),
        ]);

        let config = StowageConfig::load(file.path()).unwrap();
        assert_eq!(config.store_dir, "files");
        let remote = config.remote.unwrap();
        assert_eq!(remote.endpoint, "https://objects.example.com");
        assert_eq!(remote.bucket, "archive");
        assert_eq!(remote.timeout_seconds, 10);
    }

    #[test]
    fn test_endpoint_without_bucket() {
        let _env = EnvVars::set(&[("STOWAGE_REMOTE_ENDPOINT", "https://objects.example.com")]);

        assert!(matches!(
            StowageConfig::from_env(),
            Err(ConfigError::MissingEnvVar(ref key)) if key == "STOWAGE_REMOTE_BUCKET"
        ));
    }

    #[test]
    fn test_parse_bool_ignores_case() {
        for value in ["true", "TRUE", "True", " yes ", "1"] {
            assert!(parse_bool(value), "{value}");
        }
        for value in ["false", "FALSE", "0", "no", ""] {
            assert!(!parse_bool(value), "{value}");
        }
    }
}
