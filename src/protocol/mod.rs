//! Wire dialects spoken by text-generation endpoints.
//!
//! Each [`Dialect`] maps to one [`WireProtocol`] implementation that knows how
//! to address the endpoint, build the request body, and parse both buffered
//! and line-oriented streaming responses:
//!
//! - [`Dialect::ChatCompletions`]: `POST …/v1/chat/completions`, buffered JSON
//!   with `choices[0].message.content`, or SSE lines `data: {json}` ending in
//!   `data: [DONE]`.
//! - [`Dialect::Generate`]: `POST …/api/generate` with a flattened prompt,
//!   buffered JSON with `response`, or newline-delimited JSON objects ending
//!   with `"done": true`.
//!
//! Adapters are stateless; per-stream state lives in [`StreamAccumulator`].

pub mod chat;
pub mod error;
pub mod generate;
pub mod stream;
pub mod tokens;

pub use chat::ChatCompletionsProtocol;
pub use error::ProtocolError;
pub use generate::GenerateProtocol;
pub use stream::{LineSplitter, StreamAccumulator};
pub use tokens::{conversation_tokens, estimate_tokens};

use crate::conversation::Conversation;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire protocol shape of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// OpenAI-style chat completions
    #[default]
    #[serde(alias = "openai")]
    ChatCompletions,
    /// Ollama-style prompt generation
    #[serde(alias = "ollama")]
    Generate,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::ChatCompletions => "chat-completions",
            Dialect::Generate => "generate",
        }
    }

    /// Adapter implementing this dialect.
    pub fn protocol(&self) -> &'static dyn WireProtocol {
        match self {
            Dialect::ChatCompletions => &ChatCompletionsProtocol,
            Dialect::Generate => &GenerateProtocol,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chat-completions" | "openai" => Ok(Dialect::ChatCompletions),
            "generate" | "ollama" => Ok(Dialect::Generate),
            _ => Err(format!("Invalid dialect: {}", s)),
        }
    }
}

/// Model selection and sampling parameters for one request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams<'a> {
    pub model: &'a str,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Result of interpreting one streamed line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineOutcome {
    /// Text fragment carried by the line
    pub delta: Option<String>,
    /// The line terminates the stream
    pub done: bool,
}

impl LineOutcome {
    pub fn skip() -> Self {
        Self::default()
    }

    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta: Some(text.into()),
            done: false,
        }
    }

    pub fn done() -> Self {
        Self {
            delta: None,
            done: true,
        }
    }
}

/// Request construction and response parsing for one dialect.
pub trait WireProtocol: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Normalize the configured base address to the dialect's request path.
    fn target_url(&self, base_url: &str) -> String;

    /// JSON request body.
    fn build_body(
        &self,
        conversation: &Conversation,
        params: &ModelParams<'_>,
        stream: bool,
    ) -> serde_json::Value;

    /// Extract the generated text from a buffered response body.
    fn parse_response(&self, body: &str) -> Result<String, ProtocolError>;

    /// Interpret one line of a streamed response body.
    ///
    /// Lines that cannot be decoded are skipped, not treated as errors.
    fn parse_stream_line(&self, line: &str) -> Result<LineOutcome, ProtocolError>;
}

/// Message carried by an `error` field, if the payload has one.
pub(crate) fn embedded_error(value: &serde_json::Value) -> Option<String> {
    let error = value.get("error")?;
    match error {
        serde_json::Value::Null => None,
        serde_json::Value::String(message) => Some(message.clone()),
        serde_json::Value::Object(fields) => Some(
            fields
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        ),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dialect_serde_names() {
        assert_eq!(
            serde_json::to_string(&Dialect::ChatCompletions).unwrap(),
            "\"chat-completions\""
        );
        assert_eq!(
            serde_json::to_string(&Dialect::Generate).unwrap(),
            "\"generate\""
        );
    }

    #[test]
    fn test_dialect_aliases() {
        let d: Dialect = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(d, Dialect::ChatCompletions);
        let d: Dialect = serde_json::from_str("\"ollama\"").unwrap();
        assert_eq!(d, Dialect::Generate);
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!(Dialect::from_str("GENERATE").unwrap(), Dialect::Generate);
        assert_eq!(
            Dialect::from_str("chat-completions").unwrap(),
            Dialect::ChatCompletions
        );
        assert!(Dialect::from_str("grpc").is_err());
    }

    #[test]
    fn test_dialect_selects_protocol() {
        assert_eq!(
            Dialect::ChatCompletions.protocol().dialect(),
            Dialect::ChatCompletions
        );
        assert_eq!(Dialect::Generate.protocol().dialect(), Dialect::Generate);
    }

    #[test]
    fn test_embedded_error_shapes() {
        assert_eq!(
            embedded_error(&json!({"error": "model not found"})),
            Some("model not found".to_string())
        );
        assert_eq!(
            embedded_error(&json!({"error": {"message": "overloaded", "type": "server"}})),
            Some("overloaded".to_string())
        );
        assert_eq!(embedded_error(&json!({"error": null})), None);
        assert_eq!(embedded_error(&json!({"response": "ok"})), None);
    }
}
