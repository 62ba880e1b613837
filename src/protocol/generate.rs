//! Prompt-generation dialect.

use super::{embedded_error, Dialect, LineOutcome, ModelParams, ProtocolError, WireProtocol};
use crate::conversation::Conversation;
use serde_json::{json, Map, Value};

const GENERATE_PATH: &str = "/api/generate";

/// Ollama-compatible `/api/generate` adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateProtocol;

/// Flatten a conversation into one prompt: `ROLE: content` blocks separated
/// by blank lines.
pub fn flatten_prompt(conversation: &Conversation) -> String {
    conversation
        .turns()
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str().to_uppercase(), turn.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl WireProtocol for GenerateProtocol {
    fn dialect(&self) -> Dialect {
        Dialect::Generate
    }

    fn target_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if base.ends_with(GENERATE_PATH) {
            base.to_string()
        } else {
            format!("{}{}", base, GENERATE_PATH)
        }
    }

    fn build_body(
        &self,
        conversation: &Conversation,
        params: &ModelParams<'_>,
        stream: bool,
    ) -> Value {
        let mut body = json!({
            "model": params.model,
            "prompt": flatten_prompt(conversation),
            "stream": stream,
        });

        let mut options = Map::new();
        if let Some(temperature) = params.temperature {
            options.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(max_tokens) = params.max_tokens {
            options.insert("num_predict".to_string(), json!(max_tokens));
        }
        if !options.is_empty() {
            body["options"] = Value::Object(options);
        }
        body
    }

    fn parse_response(&self, body: &str) -> Result<String, ProtocolError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        if let Some(message) = embedded_error(&value) {
            return Err(ProtocolError::Upstream(message));
        }

        value
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ProtocolError::UnexpectedShape("missing `response` field".to_string())
            })
    }

    fn parse_stream_line(&self, line: &str) -> Result<LineOutcome, ProtocolError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(LineOutcome::skip());
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, line = %line, "Skipping malformed stream line");
                return Ok(LineOutcome::skip());
            }
        };

        if let Some(message) = embedded_error(&value) {
            return Err(ProtocolError::Upstream(message));
        }

        let delta = value
            .get("response")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let done = value.get("done").and_then(Value::as_bool).unwrap_or(false);

        Ok(LineOutcome { delta, done })
    }
}
