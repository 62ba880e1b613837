//! Per-endpoint health tracking and circuit breaking.
//!
//! Each configured endpoint owns one [`EndpointHealth`] for the lifetime of
//! the dispatcher. Records are mutated only through [`EndpointHealth::record_success`],
//! [`EndpointHealth::record_failure`], [`EndpointHealth::is_available`] and the
//! operator [`EndpointHealth::reset`]; every mutation happens under the record's
//! own mutex, so concurrent dispatches never contend across endpoints.

mod state;


pub use state::{EndpointState, HealthSnapshot};

use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct HealthRecord {
    consecutive_failures: u32,
    total_requests: u64,
    total_failures: u64,
    /// Monotonic clock reading used for recovery decisions
    last_failure_instant: Option<Instant>,
    last_failure: Option<DateTime<Utc>>,
    last_success: Option<DateTime<Utc>>,
    state: EndpointState,
}

/// Health record and circuit breaker for one endpoint.
#[derive(Debug)]
pub struct EndpointHealth {
    endpoint_id: String,
    failure_threshold: u32,
    recovery: Duration,
    record: Mutex<HealthRecord>,
}

impl EndpointHealth {
    /// Create a healthy record. A zero threshold is treated as one.
    pub fn new(endpoint_id: impl Into<String>, failure_threshold: u32, recovery: Duration) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            failure_threshold: failure_threshold.max(1),
            recovery,
            record: Mutex::new(HealthRecord::default()),
        }
    }

    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn recovery(&self) -> Duration {
        self.recovery
    }

    // The record holds plain counters, so a panic in another holder cannot
    // leave it in a state worth refusing to read.
    fn lock(&self) -> MutexGuard<'_, HealthRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a successful call: clears the failure streak and closes an open circuit.
    pub fn record_success(&self) {
        let mut record = self.lock();
        record.consecutive_failures = 0;
        record.total_requests += 1;
        record.last_success = Some(Utc::now());

        if record.state == EndpointState::CircuitOpen {
            tracing::info!(endpoint = %self.endpoint_id, "Circuit closed after successful call");
        }
        // Degraded (including a half-open probe) also returns to Healthy.
        record.state = EndpointState::Healthy;
    }

    /// Record a failed call and advance the circuit state.
    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub(crate) fn record_failure_at(&self, now: Instant) {
        let mut record = self.lock();
        record.consecutive_failures += 1;
        record.total_failures += 1;
        record.total_requests += 1;
        record.last_failure_instant = Some(now);
        record.last_failure = Some(Utc::now());

        if record.consecutive_failures >= self.failure_threshold {
            if record.state != EndpointState::CircuitOpen {
                tracing::warn!(
                    endpoint = %self.endpoint_id,
                    consecutive_failures = record.consecutive_failures,
                    "Circuit opened"
                );
                metrics::counter!("relay_circuit_open_total",
                    "endpoint" => self.endpoint_id.clone()
                )
                .increment(1);
            }
            record.state = EndpointState::CircuitOpen;
        } else if record.consecutive_failures >= self.failure_threshold / 2 {
            record.state = EndpointState::Degraded;
        }
    }

    /// Whether the endpoint may be selected.
    ///
    /// An open circuit whose last failure is older than the recovery duration
    /// is demoted to `Degraded` with its failure streak halved, letting one
    /// probe through: a success closes the circuit, further failures reopen it
    /// once the threshold is reached again.
    pub fn is_available(&self) -> bool {
        self.is_available_at(Instant::now())
    }

    pub(crate) fn is_available_at(&self, now: Instant) -> bool {
        let mut record = self.lock();
        if record.state != EndpointState::CircuitOpen {
            return true;
        }

        let recovered = record
            .last_failure_instant
            .map(|at| now.saturating_duration_since(at) > self.recovery)
            .unwrap_or(false);

        if recovered {
            record.state = EndpointState::Degraded;
            record.consecutive_failures /= 2;
            tracing::info!(endpoint = %self.endpoint_id, "Recovery window elapsed, probing endpoint");
        }

        recovered
    }

    /// `1 - failures / requests`, or 1.0 before any request.
    pub fn success_rate(&self) -> f64 {
        let record = self.lock();
        if record.total_requests == 0 {
            return 1.0;
        }
        1.0 - (record.total_failures as f64 / record.total_requests as f64)
    }

    pub fn state(&self) -> EndpointState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn total_requests(&self) -> u64 {
        self.lock().total_requests
    }

    pub fn total_failures(&self) -> u64 {
        self.lock().total_failures
    }

    /// Operator reset: clears failure counters and forces `Healthy`.
    pub fn reset(&self) {
        let mut record = self.lock();
        record.consecutive_failures = 0;
        record.total_failures = 0;
        record.total_requests = 0;
        record.last_failure_instant = None;
        record.state = EndpointState::Healthy;
        tracing::info!(endpoint = %self.endpoint_id, "Endpoint health reset");
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let record = self.lock();
        let success_rate = if record.total_requests == 0 {
            1.0
        } else {
            1.0 - (record.total_failures as f64 / record.total_requests as f64)
        };

        HealthSnapshot {
            endpoint_id: self.endpoint_id.clone(),
            state: record.state,
            consecutive_failures: record.consecutive_failures,
            success_rate,
            total_requests: record.total_requests,
            total_failures: record.total_failures,
            last_failure: record.last_failure,
            last_success: record.last_success,
        }
    }
}
