//! Configuration management for the attendance register
//!
//! Configuration is read from a TOML file, optionally overridden from the
//! environment, and every field has a default:
//!
//! ```toml
//! [redis]
//! url = "redis://127.0.0.1:6379"
//! pool_size = 16
//! connection_timeout_ms = 5000
//! command_timeout_ms = 1000
//! max_retries = 0
//! tls = false
//!
//! [register]
//! namespace = "u:sign"
//!
//! [logging]
//! level = "info"
//! with_target = true
//! ```

use crate::error::{Error, Result, ValidationError};
use crate::redis::{RedisConfig, RetryPolicy};
use crate::register::{KeyBuilder, DEFAULT_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Redis connection settings
    #[serde(default)]
    pub redis: RedisSection,

    /// Register key settings
    #[serde(default)]
    pub register: RegisterSection,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Redis connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisSection {
    /// Redis server URL
    #[serde(default = "default_url")]
    pub url: String,

    /// Maximum commands in flight
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Connect timeout in milliseconds
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Per-command timeout in milliseconds
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Retries for transport failures (0 = single round trip)
    #[serde(default)]
    pub max_retries: u32,

    /// Use TLS (`rediss://`)
    #[serde(default)]
    pub tls: bool,
}

/// Register key settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterSection {
    /// Prefix of every register key
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Include the event target in log lines
    #[serde(default = "default_true")]
    pub with_target: bool,
}

fn default_url() -> String { "redis://127.0.0.1:6379".to_string() }
fn default_pool_size() -> u32 { 16 }
fn default_connection_timeout_ms() -> u64 { 5_000 }
fn default_command_timeout_ms() -> u64 { 1_000 }
fn default_namespace() -> String { DEFAULT_NAMESPACE.to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

impl Default for RedisSection {
    fn default() -> Self {
        Self {
            url: default_url(),
            pool_size: default_pool_size(),
            connection_timeout_ms: default_connection_timeout_ms(),
            command_timeout_ms: default_command_timeout_ms(),
            max_retries: 0,
            tls: false,
        }
    }
}

impl Default for RegisterSection {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("ATTENDANCE_REDIS_URL") {
            self.redis.url = url;
        }
        if let Ok(size) = std::env::var("ATTENDANCE_REDIS_POOL_SIZE") {
            if let Ok(s) = size.parse() {
                self.redis.pool_size = s;
            }
        }
        if let Ok(namespace) = std::env::var("ATTENDANCE_NAMESPACE") {
            self.register.namespace = namespace;
        }
        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.register.namespace.is_empty() {
            return Err(ValidationError::MissingField("register.namespace".to_string()).into());
        }
        if self.register.namespace.contains(char::is_whitespace) {
            return Err(ValidationError::InvalidFormat {
                field: "register.namespace".to_string(),
                message: "must not contain whitespace".to_string(),
            }
            .into());
        }
        if self.redis.max_retries > 10 {
            return Err(ValidationError::OutOfRange {
                field: "redis.max_retries".to_string(),
                value: self.redis.max_retries.to_string(),
                min: "0".to_string(),
                max: "10".to_string(),
            }
            .into());
        }

        self.redis_config()
            .validate()
            .map_err(|e| Error::Configuration(format!("redis: {}", e)))
    }

    /// Connection pool configuration for the `[redis]` section
    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig::with_url(self.redis.url.clone())
            .pool_size(self.redis.pool_size)
            .connection_timeout(Duration::from_millis(self.redis.connection_timeout_ms))
            .command_timeout(Duration::from_millis(self.redis.command_timeout_ms))
            .retry(RetryPolicy::new(self.redis.max_retries))
            .tls(self.redis.tls)
    }

    /// Key builder for the `[register]` section
    pub fn key_builder(&self) -> KeyBuilder {
        KeyBuilder::new(self.register.namespace.clone())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.redis.pool_size, 16);
        assert_eq!(config.register.namespace, "u:sign");
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [redis]
            url = "redis://cache:6380/2"

            [register]
            namespace = "att"
            "#,
        )
        .unwrap();

        assert_eq!(config.redis.url, "redis://cache:6380/2");
        assert_eq!(config.redis.command_timeout_ms, 1_000);
        assert_eq!(config.key_builder().namespace(), "att");
        assert!(config.logging.with_target);
    }

    #[test]
    fn test_invalid_values() {
        let mut config = Config::default();
        config.register.namespace.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.register.namespace = "u sign".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.redis.pool_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.redis.url.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.redis.max_retries = 11;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_redis_config_conversion() {
        let mut config = Config::default();
        config.redis.command_timeout_ms = 250;
        config.redis.max_retries = 2;

        let redis = config.redis_config();
        assert_eq!(redis.command_timeout, Duration::from_millis(250));
        assert_eq!(redis.retry.max_retries, 2);
        assert_eq!(Config::default().redis_config().retry, RetryPolicy::none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attendance.toml");

        let mut config = Config::default();
        config.register.namespace = "checkin".to_string();
        config.redis.pool_size = 4;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.register.namespace, "checkin");
        assert_eq!(loaded.redis.pool_size, 4);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = Config::from_file(dir.path().join("absent.toml"));
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("ATTENDANCE_NAMESPACE", "env:sign");
        let config = Config::from_env();
        assert_eq!(config.register.namespace, "env:sign");
        std::env::remove_var("ATTENDANCE_NAMESPACE");
    }
}
