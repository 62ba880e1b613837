//! Configuration for retries, backoff and circuit breaking.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry manager construction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per dispatch, across all endpoints
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_backoff_seconds: f64,
    /// Upper bound for the un-jittered delay
    pub max_backoff_seconds: f64,
    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,
    /// Scale each delay by a random factor in [0.5, 1.5]
    pub jitter: bool,
    /// Consecutive failures before an endpoint's circuit opens
    pub failure_threshold: u32,
    /// Seconds an open circuit waits before allowing a probe
    pub recovery_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 6,
            initial_backoff_seconds: 1.0,
            max_backoff_seconds: 30.0,
            backoff_multiplier: 2.0,
            jitter: true,
            failure_threshold: 3,
            recovery_seconds: 120,
        }
    }
}

impl RetryConfig {
    pub fn recovery(&self) -> Duration {
        Duration::from_secs(self.recovery_seconds)
    }
}
