//! Request options, results and caller hooks.

use super::error::{DispatchError, ErrorKind};
use serde::{Deserialize, Serialize};

/// Aggregated answer of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    /// Approximate token count of conversation plus answer
    pub token_count: usize,
    /// Endpoint that produced the answer
    pub endpoint_id: String,
}

/// Item of [`Dispatcher::stream`](super::Dispatcher::stream).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental text fragment
    Delta { text: String },
    /// An attempt failed; text streamed since the last reset should be
    /// discarded while failover continues
    Reset { message: String },
    /// Terminal success
    End { token_count: usize },
    /// Terminal failure
    Error { kind: ErrorKind, message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::End { .. } | StreamEvent::Error { .. })
    }
}

/// Per-call dispatch options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Use the dialect's streaming response mode
    pub stream: bool,
    /// Try this endpoint first, outside the retry manager
    pub preferred_endpoint: Option<String>,
    /// Fail over to other endpoints after the preferred one fails
    pub use_failover: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            stream: false,
            preferred_endpoint: None,
            use_failover: true,
        }
    }
}

impl DispatchOptions {
    pub fn streaming() -> Self {
        Self {
            stream: true,
            ..Self::default()
        }
    }

    pub fn prefer(mut self, endpoint_id: impl Into<String>) -> Self {
        self.preferred_endpoint = Some(endpoint_id.into());
        self
    }

    pub fn without_failover(mut self) -> Self {
        self.use_failover = false;
        self
    }
}

/// Hooks invoked while a streaming dispatch runs.
///
/// Called once per attempt: `on_start` after the endpoint accepted the
/// request, `on_chunk` per delta, then either `on_end` with the token
/// estimate or `on_error` before the failure is handed to the retry loop.
/// A failed attempt may therefore be followed by a fresh `on_start`.
pub trait StreamObserver: Send + Sync {
    fn on_start(&self) {}

    fn on_chunk(&self, _text: &str) {}

    fn on_end(&self, _token_count: usize) {}

    fn on_error(&self, _error: &DispatchError) {}
}

impl StreamObserver for () {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options = DispatchOptions::default();
        assert!(!options.stream);
        assert!(options.use_failover);
        assert!(options.preferred_endpoint.is_none());
    }

    #[test]
    fn test_options_builder() {
        let options = DispatchOptions::streaming().prefer("local").without_failover();
        assert!(options.stream);
        assert_eq!(options.preferred_endpoint.as_deref(), Some("local"));
        assert!(!options.use_failover);
    }

    #[test]
    fn test_stream_event_serialization() {
        let json = serde_json::to_string(&StreamEvent::Delta {
            text: "Hi".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"delta","text":"Hi"}"#);

        let json = serde_json::to_string(&StreamEvent::Error {
            kind: ErrorKind::Network,
            message: "refused".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"error","kind":"network","message":"refused"}"#);
    }

    #[test]
    fn test_terminal_events() {
        assert!(StreamEvent::End { token_count: 1 }.is_terminal());
        assert!(!StreamEvent::Reset {
            message: "x".to_string()
        }
        .is_terminal());
    }
}
