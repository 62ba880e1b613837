//! Configuration module for the relay
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`RELAY_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use relay::config::RelayConfig;
//!
//! let toml = r#"
//! [retry]
//! max_retries = 3
//!
//! [[endpoints]]
//! id = "local"
//! dialect = "generate"
//! url = "http://localhost:11434"
//! model = "llama3"
//! "#;
//! let config: RelayConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.retry.max_retries, 3);
//! assert_eq!(config.endpoints.len(), 1);
//! ```

pub mod endpoint;
pub mod error;
pub mod logging;

pub use endpoint::{EndpointConfig, ProxyConfig};
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};

pub use crate::protocol::Dialect;
pub use crate::retry::RetryConfig;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Upper bound for either backoff setting.
pub const MAX_BACKOFF_SECONDS: f64 = 86_400.0;

/// Unified configuration for the relay.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Backend definitions, in selection order
    pub endpoints: Vec<EndpointConfig>,
    /// Retry, backoff and circuit-breaker settings
    pub retry: RetryConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (the loaded value is kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("RELAY_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("RELAY_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        if let Ok(retries) = std::env::var("RELAY_MAX_RETRIES") {
            if let Ok(n) = retries.parse::<u32>() {
                if n > 0 {
                    self.retry.max_retries = n;
                }
            }
        }
        if let Ok(no_jitter) = std::env::var("RELAY_NO_JITTER") {
            match no_jitter.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.retry.jitter = false,
                "0" | "false" | "no" => self.retry.jitter = true,
                _ => {}
            }
        }

        self
    }

    /// Validate configuration
    ///
    /// Missing `url`/`model` are not checked here; they surface as a
    /// configuration error when the endpoint is actually selected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            if endpoint.id.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("endpoints[{}].id", i),
                    message: "id cannot be empty".to_string(),
                });
            }
            if !seen.insert(endpoint.id.as_str()) {
                return Err(ConfigError::Validation {
                    field: format!("endpoints[{}].id", i),
                    message: format!("duplicate endpoint id '{}'", endpoint.id),
                });
            }
            if endpoint.timeout_seconds == 0 {
                return Err(ConfigError::Validation {
                    field: format!("endpoints[{}].timeout_seconds", i),
                    message: "timeout must be non-zero".to_string(),
                });
            }
        }

        let retry = &self.retry;
        if retry.max_retries == 0 {
            return Err(validation("retry.max_retries", "must be at least 1"));
        }
        if retry.failure_threshold == 0 {
            return Err(validation("retry.failure_threshold", "must be at least 1"));
        }
        if !(retry.backoff_multiplier >= 1.0) {
            return Err(validation("retry.backoff_multiplier", "must be >= 1.0"));
        }
        if !retry.backoff_multiplier.is_finite() {
            return Err(validation("retry.backoff_multiplier", "must be finite"));
        }
        for (field, value) in [
            ("retry.initial_backoff_seconds", retry.initial_backoff_seconds),
            ("retry.max_backoff_seconds", retry.max_backoff_seconds),
        ] {
            if !(value >= 0.0) {
                return Err(validation(field, "must be non-negative"));
            }
            if !(value <= MAX_BACKOFF_SECONDS) {
                return Err(validation(field, "must be at most one day"));
            }
        }

        Ok(())
    }

    /// Enabled endpoints in selection order, the first `default` endpoint leading.
    pub fn ordered_endpoints(&self) -> Vec<EndpointConfig> {
        let mut endpoints: Vec<EndpointConfig> =
            self.endpoints.iter().filter(|e| e.enabled).cloned().collect();
        if let Some(pos) = endpoints.iter().position(|e| e.default) {
            let preferred = endpoints.remove(pos);
            endpoints.insert(0, preferred);
        }
        endpoints
    }

    pub fn endpoint(&self, id: &str) -> Option<&EndpointConfig> {
        self.endpoints.iter().find(|e| e.id == id)
    }
}

fn validation(field: &str, message: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}
