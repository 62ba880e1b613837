//! Notifications published to [`Dispatcher::subscribe`](super::Dispatcher::subscribe) receivers.

use super::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Something a UI layer may want to surface while a dispatch is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// About to sleep before the next attempt
    Retry {
        attempt: u32,
        endpoint: String,
        wait_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// The next attempt targets a different endpoint
    EndpointSwitch {
        endpoint: String,
        timestamp: DateTime<Utc>,
    },
    /// One attempt failed
    AttemptFailed {
        attempt: u32,
        endpoint: String,
        kind: ErrorKind,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DispatchEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DispatchEvent::Retry { timestamp, .. }
            | DispatchEvent::EndpointSwitch { timestamp, .. }
            | DispatchEvent::AttemptFailed { timestamp, .. } => *timestamp,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            DispatchEvent::Retry { endpoint, .. }
            | DispatchEvent::EndpointSwitch { endpoint, .. }
            | DispatchEvent::AttemptFailed { endpoint, .. } => endpoint,
        }
    }
}
