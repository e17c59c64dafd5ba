//! Server configuration.
//!
//! Configuration is loaded from `KEYFORGE_*` environment variables, the
//! canonical runtime path for container deployments. Exactly one storage
//! driver and one queue broker are selected at process start; outside
//! debug mode both must be configured explicitly.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use keyforge_core::{Error, Result};

/// Configuration for the Keyforge API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server port.
    pub http_port: u16,

    /// Enable debug mode.
    ///
    /// When enabled, missing storage/queue configuration falls back to
    /// in-memory stand-ins instead of failing startup.
    pub debug: bool,

    /// CORS configuration.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Storage driver selection.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Queue broker selection.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Seconds without a worker ping before the service reports degraded.
    #[serde(default = "default_check_timeout_secs")]
    pub check_timeout_secs: u64,
}

fn default_check_timeout_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            debug: false,
            cors: CorsConfig::default(),
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
            check_timeout_secs: default_check_timeout_secs(),
        }
    }
}

/// CORS configuration for browser-based configurators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins. Use `["*"]` to allow all origins (development only).
    /// Empty list disables CORS entirely.
    pub allowed_origins: Vec<String>,

    /// Max age for preflight cache (seconds).
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            max_age_seconds: 3600,
        }
    }
}

/// Storage driver selection.
///
/// `bucket` and `dir` are mutually exclusive; the bucket driver also needs
/// the public base URL artifacts are served under.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Local directory for the filesystem driver.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Bucket name for the object-store driver.
    #[serde(default)]
    pub bucket: Option<String>,

    /// Externally-reachable URL prefix for bucket-held artifacts.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

/// Queue broker selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Redis connection URL for the production broker.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Key prefix for broker keys.
    #[serde(default = "default_redis_prefix")]
    pub key_prefix: String,
}

fn default_redis_prefix() -> String {
    "keyforge".to_string()
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: default_redis_prefix(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// Supported env vars:
    /// - `KEYFORGE_HTTP_PORT`
    /// - `KEYFORGE_DEBUG`
    /// - `KEYFORGE_CORS_ALLOWED_ORIGINS` (comma-separated, or `*`)
    /// - `KEYFORGE_CORS_MAX_AGE_SECONDS`
    /// - `KEYFORGE_STORAGE_DIR`
    /// - `KEYFORGE_STORAGE_BUCKET`
    /// - `KEYFORGE_STORAGE_PUBLIC_URL`
    /// - `KEYFORGE_REDIS_URL`
    /// - `KEYFORGE_REDIS_PREFIX`
    /// - `KEYFORGE_CHECK_TIMEOUT_SECS`
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed, or
    /// if the storage selection is contradictory.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(port) = env_u16("KEYFORGE_HTTP_PORT")? {
            config.http_port = port;
        }
        if let Some(debug) = env_bool("KEYFORGE_DEBUG")? {
            config.debug = debug;
        }

        if let Some(origins) = env_string("KEYFORGE_CORS_ALLOWED_ORIGINS") {
            config.cors.allowed_origins = parse_cors_allowed_origins(&origins);
        }
        if let Some(max_age) = env_u64("KEYFORGE_CORS_MAX_AGE_SECONDS")? {
            config.cors.max_age_seconds = max_age;
        }

        config.storage.dir = env_string("KEYFORGE_STORAGE_DIR").map(PathBuf::from);
        config.storage.bucket = env_string("KEYFORGE_STORAGE_BUCKET");
        config.storage.public_base_url = env_string("KEYFORGE_STORAGE_PUBLIC_URL");

        config.queue.redis_url = env_string("KEYFORGE_REDIS_URL");
        if let Some(prefix) = env_string("KEYFORGE_REDIS_PREFIX") {
            config.queue.key_prefix = prefix;
        }

        if let Some(secs) = env_u64("KEYFORGE_CHECK_TIMEOUT_SECS")? {
            config.check_timeout_secs = secs;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error for contradictory storage selection.
    pub fn validate(&self) -> Result<()> {
        if self.storage.dir.is_some() && self.storage.bucket.is_some() {
            return Err(Error::validation(
                "KEYFORGE_STORAGE_DIR and KEYFORGE_STORAGE_BUCKET are mutually exclusive",
            ));
        }
        if self.storage.bucket.is_some() && self.storage.public_base_url.is_none() {
            return Err(Error::validation(
                "KEYFORGE_STORAGE_PUBLIC_URL is required with KEYFORGE_STORAGE_BUCKET",
            ));
        }
        Ok(())
    }

    /// Returns the worker liveness window as a `Duration`.
    #[must_use]
    pub const fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u16(name: &str) -> Result<Option<u16>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u16>()
        .map(Some)
        .map_err(|e| Error::validation(format!("{name} must be a u16: {e}")))
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::validation(format!("{name} must be a u64: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::validation(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    parse_bool(name, &v).map(Some)
}

fn parse_cors_allowed_origins(value: &str) -> Vec<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed == "*" {
        return vec!["*".to_string()];
    }

    trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_without_public_url_is_rejected() {
        let mut config = Config::default();
        config.storage.bucket = Some("builds".to_string());
        assert!(config.validate().is_err());

        config.storage.public_base_url = Some("https://cdn.example.com".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn dir_and_bucket_are_mutually_exclusive() {
        let mut config = Config::default();
        config.storage.dir = Some(PathBuf::from("/var/lib/keyforge"));
        config.storage.bucket = Some("builds".to_string());
        config.storage.public_base_url = Some("https://cdn.example.com".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("TEST", "true").unwrap());
        assert!(parse_bool("TEST", "1").unwrap());
        assert!(!parse_bool("TEST", "FALSE").unwrap());
        assert!(!parse_bool("TEST", "no").unwrap());
        assert!(parse_bool("TEST", "maybe").is_err());
    }

    #[test]
    fn cors_origins_parse_star_and_lists() {
        assert_eq!(parse_cors_allowed_origins("*"), vec!["*".to_string()]);
        assert_eq!(
            parse_cors_allowed_origins("https://a.example, https://b.example"),
            vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ]
        );
        assert!(parse_cors_allowed_origins("  ").is_empty());
    }

    #[test]
    fn check_timeout_defaults_to_five_minutes() {
        let config = Config::default();
        assert_eq!(config.check_timeout(), Duration::from_secs(300));
    }
}
