//! Error taxonomy for dispatches.

use crate::health::HealthSnapshot;
use crate::protocol::ProtocolError;
use crate::retry::{RetryClassify, RetryError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Seconds to wait when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER_SECONDS: u64 = 60;

/// Transport-level failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    Connect,
    Timeout,
    Other,
}

impl NetworkErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkErrorKind::Connect => "connect",
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::Other => "other",
        }
    }

    pub fn classify(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkErrorKind::Timeout
        } else if err.is_connect() {
            NetworkErrorKind::Connect
        } else {
            NetworkErrorKind::Other
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-kind of a 5xx response, kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceErrorKind {
    InternalError,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    Other,
}

impl ServiceErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            500 => ServiceErrorKind::InternalError,
            502 => ServiceErrorKind::BadGateway,
            503 => ServiceErrorKind::ServiceUnavailable,
            504 => ServiceErrorKind::GatewayTimeout,
            _ => ServiceErrorKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceErrorKind::InternalError => "internal_error",
            ServiceErrorKind::BadGateway => "bad_gateway",
            ServiceErrorKind::ServiceUnavailable => "service_unavailable",
            ServiceErrorKind::GatewayTimeout => "gateway_timeout",
            ServiceErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable tag for a [`DispatchError`], suitable for UIs and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Network,
    RateLimited,
    Service,
    Rejected,
    Protocol,
    UnknownEndpoint,
    NoEndpoint,
    Exhausted,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Network => "network",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Service => "service",
            ErrorKind::Rejected => "rejected",
            ErrorKind::Protocol => "protocol",
            ErrorKind::UnknownEndpoint => "unknown_endpoint",
            ErrorKind::NoEndpoint => "no_endpoint",
            ErrorKind::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the dispatcher.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Selected endpoint lacks an address or model, or its client could not be built
    #[error("Configuration error for endpoint '{endpoint}': {message}")]
    Configuration { endpoint: String, message: String },

    /// Connect, timeout, TLS or proxy failure
    #[error("Network error ({kind}) on endpoint '{endpoint}': {message}")]
    Network {
        endpoint: String,
        kind: NetworkErrorKind,
        message: String,
    },

    /// HTTP 429; returned to the caller instead of being retried
    #[error("Rate limited by endpoint '{endpoint}', retry after {retry_after_seconds}s")]
    RateLimited {
        endpoint: String,
        retry_after_seconds: u64,
    },

    /// HTTP 5xx
    #[error("Service error {status} ({kind}) from endpoint '{endpoint}': {message}")]
    Service {
        endpoint: String,
        status: u16,
        kind: ServiceErrorKind,
        message: String,
    },

    /// Any other non-success status
    #[error("Request rejected with status {status} by endpoint '{endpoint}': {message}")]
    Rejected {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// Response body did not match the dialect
    #[error("Protocol error from endpoint '{endpoint}': {source}")]
    Protocol {
        endpoint: String,
        #[source]
        source: ProtocolError,
    },

    #[error("Unknown endpoint '{0}'")]
    UnknownEndpoint(String),

    #[error("No endpoint available")]
    NoEndpointAvailable { last: Option<Box<DispatchError>> },

    /// Retry budget spent; wraps the last concrete failure
    #[error("Failed after {attempts} attempts across {} endpoint(s): {last}", .endpoints_tried.len())]
    Exhausted {
        attempts: u32,
        endpoints_tried: Vec<String>,
        health: Vec<HealthSnapshot>,
        #[source]
        last: Box<DispatchError>,
    },
}

impl DispatchError {
    /// Map a non-success HTTP status to its error variant.
    pub fn from_status(
        endpoint: &str,
        status: u16,
        retry_after: Option<&str>,
        body: String,
    ) -> Self {
        match status {
            429 => DispatchError::RateLimited {
                endpoint: endpoint.to_string(),
                retry_after_seconds: parse_retry_after(retry_after),
            },
            500..=599 => DispatchError::Service {
                endpoint: endpoint.to_string(),
                status,
                kind: ServiceErrorKind::from_status(status),
                message: body,
            },
            _ => DispatchError::Rejected {
                endpoint: endpoint.to_string(),
                status,
                message: body,
            },
        }
    }

    pub fn network(endpoint: &str, err: &reqwest::Error) -> Self {
        DispatchError::Network {
            endpoint: endpoint.to_string(),
            kind: NetworkErrorKind::classify(err),
            message: err.to_string(),
        }
    }

    pub fn protocol(endpoint: &str, source: ProtocolError) -> Self {
        DispatchError::Protocol {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Configuration { .. } => ErrorKind::Configuration,
            DispatchError::Network { .. } => ErrorKind::Network,
            DispatchError::RateLimited { .. } => ErrorKind::RateLimited,
            DispatchError::Service { .. } => ErrorKind::Service,
            DispatchError::Rejected { .. } => ErrorKind::Rejected,
            DispatchError::Protocol { .. } => ErrorKind::Protocol,
            DispatchError::UnknownEndpoint(_) => ErrorKind::UnknownEndpoint,
            DispatchError::NoEndpointAvailable { .. } => ErrorKind::NoEndpoint,
            DispatchError::Exhausted { .. } => ErrorKind::Exhausted,
        }
    }

    /// Endpoint the failure is attributed to, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            DispatchError::Configuration { endpoint, .. }
            | DispatchError::Network { endpoint, .. }
            | DispatchError::RateLimited { endpoint, .. }
            | DispatchError::Service { endpoint, .. }
            | DispatchError::Rejected { endpoint, .. }
            | DispatchError::Protocol { endpoint, .. } => Some(endpoint),
            DispatchError::UnknownEndpoint(endpoint) => Some(endpoint),
            DispatchError::NoEndpointAvailable { .. } | DispatchError::Exhausted { .. } => None,
        }
    }

    /// Server-requested wait for a rate-limited request.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            DispatchError::RateLimited {
                retry_after_seconds,
                ..
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }

    /// The innermost concrete failure, unwrapping aggregates.
    pub fn root(&self) -> &DispatchError {
        match self {
            DispatchError::Exhausted { last, .. } => last.root(),
            DispatchError::NoEndpointAvailable { last: Some(last) } => last.root(),
            other => other,
        }
    }
}

fn parse_retry_after(value: Option<&str>) -> u64 {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECONDS)
}

impl RetryClassify for DispatchError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::Network { .. }
                | DispatchError::Service { .. }
                | DispatchError::Rejected { .. }
                | DispatchError::Protocol { .. }
        )
    }

    fn records_failure(&self) -> bool {
        !matches!(
            self,
            DispatchError::Configuration { .. }
                | DispatchError::UnknownEndpoint(_)
                | DispatchError::NoEndpointAvailable { .. }
                | DispatchError::Exhausted { .. }
        )
    }
}

impl From<RetryError<DispatchError>> for DispatchError {
    fn from(err: RetryError<DispatchError>) -> Self {
        match err {
            RetryError::NoEndpointAvailable { last } => DispatchError::NoEndpointAvailable {
                last: last.map(Box::new),
            },
            RetryError::Exhausted {
                attempts,
                endpoints_tried,
                health,
                last,
            } => DispatchError::Exhausted {
                attempts,
                endpoints_tried,
                health,
                last: Box::new(last),
            },
            RetryError::Aborted(err) => err,
        }
    }
}
