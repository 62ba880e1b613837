//! Error types for the retry loop.

use crate::health::HealthSnapshot;
use thiserror::Error;

/// How an operation error should steer the retry loop.
pub trait RetryClassify {
    /// Whether another attempt (possibly on another endpoint) may follow.
    fn is_retryable(&self) -> bool;

    /// Whether the error counts as a failure in the endpoint's health record.
    fn records_failure(&self) -> bool {
        true
    }
}

/// Terminal outcome of [`RetryManager::execute_with_retry`](super::RetryManager::execute_with_retry).
#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// No endpoint could be selected, even after clearing exclusions
    #[error("No endpoint available")]
    NoEndpointAvailable { last: Option<E> },

    /// Every allowed attempt failed
    #[error("Failed after {attempts} attempts across {} endpoint(s): {last}", .endpoints_tried.len())]
    Exhausted {
        attempts: u32,
        endpoints_tried: Vec<String>,
        health: Vec<HealthSnapshot>,
        #[source]
        last: E,
    },

    /// The operation returned an error that must not be retried
    #[error(transparent)]
    Aborted(E),
}
