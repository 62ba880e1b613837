//! Retry loop with endpoint selection and failover.
//!
//! [`RetryManager`] owns one [`EndpointHealth`] per endpoint and drives the
//! attempt loop around a caller-supplied operation:
//!
//! 1. Select an endpoint: the available, not-yet-tried endpoint with the best
//!    success rate (ties go to configuration order). When every untried
//!    endpoint has an open circuit, the best of them is probed anyway. Once
//!    every endpoint has been tried, the exclusion list is cleared once.
//! 2. Run the operation. Success is recorded and returned immediately.
//! 3. Failure is recorded; non-retryable errors are returned as they are,
//!    otherwise the loop backs off and tries again until `max_retries`
//!    attempts have been made.

mod backoff;
mod config;
mod error;


pub use backoff::BackoffPolicy;
pub use config::RetryConfig;
pub use error::{RetryClassify, RetryError};

use crate::health::{EndpointHealth, HealthSnapshot};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Notifications emitted by the retry loop.
///
/// Both methods default to no-ops; `()` is the silent observer.
pub trait RetryObserver: Send + Sync {
    /// An attempt failed and the loop will wait `wait` before the next one.
    fn on_retry(&self, _attempt: u32, _endpoint: &str, _wait: Duration) {}

    /// The next attempt targets a different endpoint than the previous one.
    fn on_endpoint_switch(&self, _endpoint: &str) {}
}

impl RetryObserver for () {}

/// Adjustments for a retry loop that continues earlier attempts.
#[derive(Debug, Clone, Default)]
pub struct RetryOptions {
    /// Endpoints excluded from selection until the exclusion list is cleared
    pub exclude: Vec<String>,
    /// Attempts already made by the caller; added to reported attempt numbers
    /// and counted against `max_retries`
    pub attempt_offset: u32,
    /// Endpoint of the caller's last attempt, for switch notifications
    pub previous_endpoint: Option<String>,
}

/// Selects endpoints, tracks their health and retries failed operations.
#[derive(Debug)]
pub struct RetryManager {
    /// Endpoint identifiers in selection-tie order
    endpoints: Vec<String>,
    health: HashMap<String, Arc<EndpointHealth>>,
    max_retries: u32,
    backoff: BackoffPolicy,
}

impl RetryManager {
    /// Create a manager for the given endpoints. Duplicate identifiers are
    /// dropped, keeping the first occurrence.
    pub fn new<I, S>(endpoints: I, config: &RetryConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut order = Vec::new();
        let mut health = HashMap::new();
        for id in endpoints {
            let id = id.into();
            if health.contains_key(&id) {
                continue;
            }
            health.insert(
                id.clone(),
                Arc::new(EndpointHealth::new(
                    id.clone(),
                    config.failure_threshold,
                    config.recovery(),
                )),
            );
            order.push(id);
        }

        Self {
            endpoints: order,
            health,
            max_retries: config.max_retries.max(1),
            backoff: BackoffPolicy::from_config(config),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Health record for one endpoint.
    pub fn health(&self, endpoint_id: &str) -> Option<&Arc<EndpointHealth>> {
        self.health.get(endpoint_id)
    }

    /// Snapshot of every endpoint, in selection order.
    pub fn health_status(&self) -> Vec<HealthSnapshot> {
        self.endpoints
            .iter()
            .filter_map(|id| self.health.get(id))
            .map(|h| h.snapshot())
            .collect()
    }

    /// Operator reset of one endpoint. Returns false for unknown identifiers.
    pub fn reset_endpoint(&self, endpoint_id: &str) -> bool {
        match self.health.get(endpoint_id) {
            Some(h) => {
                h.reset();
                true
            }
            None => false,
        }
    }

    /// Pick the next endpoint, skipping `exclude`.
    ///
    /// Prefers available endpoints by success rate; when none of the
    /// remaining endpoints is available, the best remaining one is returned
    /// anyway as a forced probe. Returns `None` only when nothing remains.
    pub fn next_endpoint(&self, exclude: &[String]) -> Option<String> {
        let candidates: Vec<&Arc<EndpointHealth>> = self
            .endpoints
            .iter()
            .filter(|id| !exclude.contains(id))
            .filter_map(|id| self.health.get(id))
            .collect();

        // is_available() may demote an open circuit, so it runs for every candidate.
        let available: Vec<&Arc<EndpointHealth>> =
            candidates.iter().copied().filter(|h| h.is_available()).collect();

        best_by_success_rate(&available)
            .or_else(|| best_by_success_rate(&candidates))
            .map(|h| h.endpoint_id().to_string())
    }

    /// Run `operation` with retries and failover.
    pub async fn execute_with_retry<T, E, F, Fut>(
        &self,
        operation: F,
        observer: &dyn RetryObserver,
    ) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + RetryClassify + 'static,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_options(operation, RetryOptions::default(), observer)
            .await
    }

    /// Run `operation` with retries, continuing from earlier attempts.
    pub async fn execute_with_options<T, E, F, Fut>(
        &self,
        mut operation: F,
        options: RetryOptions,
        observer: &dyn RetryObserver,
    ) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + RetryClassify + 'static,
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let RetryOptions {
            exclude: mut used,
            attempt_offset,
            previous_endpoint: mut previous,
        } = options;

        let mut attempt: u32 = 0;
        let mut tried: Vec<String> = previous.iter().cloned().collect();
        let mut last_error: Option<E> = None;

        loop {
            let endpoint = match self.next_endpoint(&used) {
                Some(endpoint) => endpoint,
                None if used.len() >= self.endpoints.len() => {
                    debug!("All endpoints tried, clearing exclusions");
                    used.clear();
                    match self.next_endpoint(&used) {
                        Some(endpoint) => endpoint,
                        None => return Err(RetryError::NoEndpointAvailable { last: last_error }),
                    }
                }
                None => return Err(RetryError::NoEndpointAvailable { last: last_error }),
            };

            if !used.contains(&endpoint) {
                used.push(endpoint.clone());
            }
            if !tried.contains(&endpoint) {
                tried.push(endpoint.clone());
            }
            if let Some(prev) = &previous {
                if *prev != endpoint {
                    observer.on_endpoint_switch(&endpoint);
                }
            }

            let reported = attempt + attempt_offset + 1;
            debug!(
                attempt = reported,
                max_retries = self.max_retries,
                endpoint = %endpoint,
                "Attempting operation"
            );

            let Some(health) = self.health.get(&endpoint) else {
                return Err(RetryError::NoEndpointAvailable { last: last_error });
            };

            match operation(endpoint.clone()).await {
                Ok(value) => {
                    health.record_success();
                    return Ok(value);
                }
                Err(err) => {
                    if err.records_failure() {
                        health.record_failure();
                    }
                    if !err.is_retryable() {
                        debug!(endpoint = %endpoint, error = %err, "Error is not retryable");
                        return Err(RetryError::Aborted(err));
                    }

                    warn!(endpoint = %endpoint, attempt = reported, error = %err, "Attempt failed");
                    attempt += 1;

                    if attempt + attempt_offset >= self.max_retries {
                        error!(
                            attempts = attempt + attempt_offset,
                            endpoints = tried.len(),
                            "Retries exhausted"
                        );
                        return Err(RetryError::Exhausted {
                            attempts: attempt + attempt_offset,
                            endpoints_tried: tried,
                            health: self.health_status(),
                            last: err,
                        });
                    }

                    let wait = self.backoff.delay(attempt + attempt_offset);
                    observer.on_retry(attempt + attempt_offset, &endpoint, wait);
                    debug!(wait_ms = wait.as_millis() as u64, "Backing off before next attempt");
                    if !wait.is_zero() {
                        tokio::time::sleep(wait).await;
                    }

                    previous = Some(endpoint);
                    last_error = Some(err);
                }
            }
        }
    }
}

/// First entry with the strictly highest success rate.
fn best_by_success_rate<'a>(candidates: &[&'a Arc<EndpointHealth>]) -> Option<&'a Arc<EndpointHealth>> {
    let mut best: Option<(&'a Arc<EndpointHealth>, f64)> = None;
    for &health in candidates {
        let rate = health.success_rate();
        match best {
            Some((_, best_rate)) if rate <= best_rate => {}
            _ => best = Some((health, rate)),
        }
    }
    best.map(|(health, _)| health)
}
