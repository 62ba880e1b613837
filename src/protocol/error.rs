//! Error types for wire parsing.

use thiserror::Error;

/// A response body that does not match the dialect's expected shape.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Body is not valid JSON
    #[error("Malformed JSON: {0}")]
    Malformed(String),

    /// JSON is valid but fields are missing or mistyped
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// Successful status with no generated text
    #[error("Empty response from backend")]
    EmptyResponse,

    /// Backend reported an error inside a successful response
    #[error("Backend reported error: {0}")]
    Upstream(String),
}
