//! Exponential backoff with optional jitter.

use super::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Delay schedule between attempts.
///
/// `delay(n) = min(initial × multiplier^(n−1), max)`, optionally scaled by a
/// uniform factor in [0.5, 1.5]. Attempts are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    initial: f64,
    max: f64,
    multiplier: f64,
    jitter: bool,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration, multiplier: f64, jitter: bool) -> Self {
        Self {
            initial: initial.as_secs_f64(),
            max: max.as_secs_f64(),
            multiplier: if multiplier.is_finite() { multiplier.max(1.0) } else { 1.0 },
            jitter,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            seconds(config.initial_backoff_seconds),
            seconds(config.max_backoff_seconds),
            config.backoff_multiplier,
            config.jitter,
        )
    }

    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Un-jittered delay before the retry that follows failed attempt `attempt`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        if self.initial <= 0.0 || self.max <= 0.0 {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.initial * self.multiplier.powi(exponent);
        let capped = if raw.is_finite() { raw.min(self.max) } else { self.max };
        seconds(capped)
    }

    /// Delay to wait, with jitter applied when enabled.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let factor = rand::thread_rng().gen_range(0.5..1.5);
        seconds(base.as_secs_f64() * factor)
    }
}

/// Negative and NaN map to zero, anything too large for a `Duration` saturates.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}
