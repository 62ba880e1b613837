//! Circuit state and read-only health views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Circuit-breaker state of a single endpoint.
///
/// ```text
/// Healthy → Degraded:     consecutive failures >= threshold / 2
/// Degraded → CircuitOpen: consecutive failures >= threshold
/// CircuitOpen → Degraded: recovery duration elapsed (half-open probe)
/// CircuitOpen → Healthy:  any recorded success
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EndpointState {
    /// Endpoint is serving normally
    #[default]
    Healthy,
    /// Endpoint is failing but still receives traffic
    Degraded,
    /// Endpoint is excluded from selection until the recovery duration elapses
    CircuitOpen,
}

impl EndpointState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointState::Healthy => "healthy",
            EndpointState::Degraded => "degraded",
            EndpointState::CircuitOpen => "circuit_open",
        }
    }
}

impl fmt::Display for EndpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of an endpoint's health record, for dashboards and
/// aggregate error reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub endpoint_id: String,
    pub state: EndpointState,
    pub consecutive_failures: u32,
    pub success_rate: f64,
    pub total_requests: u64,
    pub total_failures: u64,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
}
