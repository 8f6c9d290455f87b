//! Configuration types for Toolgate

use crate::error::{Result, ToolgateError};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolgateConfig {
    /// Executor defaults
    pub executor: ExecutorConfig,

    /// Log output
    pub logging: LoggingConfig,
}

/// Defaults the executor applies when a call leaves an option unset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Per-attempt timeout
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Delay before the first retry
    #[serde(with = "humantime_serde")]
    pub default_retry_delay: Duration,

    /// Backoff growth per retry
    pub default_backoff_multiplier: f64,

    /// Cap on any computed retry delay
    #[serde(default, with = "humantime_serde")]
    pub default_max_retry_delay: Option<Duration>,

    /// Lifetime of cached results
    #[serde(with = "humantime_serde")]
    pub default_cache_ttl: Duration,

    /// Maximum history records kept (unbounded if unset)
    pub history_capacity: Option<usize>,

    /// Record cache hits in history
    pub record_cache_hits: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            default_retry_delay: Duration::from_secs(1),
            default_backoff_multiplier: 2.0,
            default_max_retry_delay: None,
            default_cache_ttl: Duration::from_secs(300),
            history_capacity: None,
            record_cache_hits: false,
        }
    }
}

impl ExecutorConfig {
    /// Validate the executor defaults.
    ///
    /// # Errors
    ///
    /// Returns an error for zero durations, a multiplier below 1.0 or a zero
    /// history capacity.
    pub fn validate(&self) -> Result<()> {
        if self.default_timeout.is_zero() {
            return Err(invalid("executor.default_timeout must be greater than zero"));
        }
        if self.default_backoff_multiplier.is_nan() || self.default_backoff_multiplier < 1.0 {
            return Err(invalid(format!(
                "executor.default_backoff_multiplier must be at least 1.0, got {}",
                self.default_backoff_multiplier
            )));
        }
        if self.default_cache_ttl.is_zero() {
            return Err(invalid("executor.default_cache_ttl must be greater than zero"));
        }
        if self.history_capacity == Some(0) {
            return Err(invalid("executor.history_capacity must be greater than zero"));
        }
        Ok(())
    }
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives, used when `RUST_LOG` is unset
    pub filter: String,

    /// Colored output
    pub ansi: bool,

    /// Include the event target (module path)
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
            with_target: false,
        }
    }
}

fn invalid(message: impl Into<String>) -> ToolgateError {
    ToolgateError::Configuration(message.into())
}

impl ToolgateConfig {
    /// Load configuration from default sources.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `toolgate.toml` in the working directory
    /// 3. File named by `TOOLGATE_CONFIG_PATH`
    /// 4. `TOOLGATE_*` environment variables (`__` separates nested keys,
    ///    e.g. `TOOLGATE_EXECUTOR__DEFAULT_TIMEOUT=5s`)
    ///
    /// # Errors
    ///
    /// Returns an error if a source is malformed or the result fails validation.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(ToolgateConfig::default()))
            .merge(Toml::file("toolgate.toml"));

        if let Ok(path) = std::env::var("TOOLGATE_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: ToolgateConfig = figment
            .merge(Env::prefixed("TOOLGATE_").split("__"))
            .extract()
            .map_err(|e| {
                ToolgateError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// Keys missing from the file keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ToolgateError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config: ToolgateConfig = Figment::from(Serialized::defaults(ToolgateConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                ToolgateError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        self.executor.validate()
    }
}
