//! Synchronizer configuration.
//!
//! Built in code with the `with_*` builders, or loaded from a TOML file:
//!
//! ```toml
//! [timeouts]
//! operation_ms = 10000
//!
//! [lookup_retry]
//! max_attempts = 3
//! base_delay_ms = 250
//! max_delay_ms = 2000
//! jitter_ms = 100
//! ```
//!
//! Every key is optional.

use campus_session_core::RetryPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on every remote call.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Synchronizer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bound on each provider or store call.
    pub operation_timeout: Duration,
    /// Retry policy for the profile lookup during reconciliation.
    pub lookup_retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            lookup_retry: RetryPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Set the per-call timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the lookup retry policy.
    pub fn with_lookup_retry(mut self, policy: RetryPolicy) -> Self {
        self.lookup_retry = policy;
        self
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        file.into_config()
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        file.into_config()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    timeouts: TimeoutsSection,
    #[serde(default)]
    lookup_retry: LookupRetrySection,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimeoutsSection {
    #[serde(default = "default_operation_ms")]
    operation_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LookupRetrySection {
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    jitter_ms: u64,
}

// Default value functions
fn default_operation_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    2_000
}

fn default_jitter_ms() -> u64 {
    100
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            operation_ms: default_operation_ms(),
        }
    }
}

impl Default for LookupRetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl ConfigFile {
    fn into_config(self) -> Result<SessionConfig, ConfigError> {
        if self.timeouts.operation_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeouts.operation_ms must be greater than zero".into(),
            ));
        }
        if self.lookup_retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "lookup_retry.max_attempts must be at least 1".into(),
            ));
        }

        Ok(SessionConfig {
            operation_timeout: Duration::from_millis(self.timeouts.operation_ms),
            lookup_retry: RetryPolicy {
                max_attempts: self.lookup_retry.max_attempts,
                base_delay: Duration::from_millis(self.lookup_retry.base_delay_ms),
                max_delay: Duration::from_millis(self.lookup_retry.max_delay_ms),
                jitter: Duration::from_millis(self.lookup_retry.jitter_ms),
            },
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}
