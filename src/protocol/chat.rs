//! Chat-completions dialect.

use super::{embedded_error, Dialect, LineOutcome, ModelParams, ProtocolError, WireProtocol};
use crate::conversation::Conversation;
use serde::Deserialize;
use serde_json::{json, Value};

const COMPLETIONS_PATH: &str = "/chat/completions";
const SSE_DATA_PREFIX: &str = "data: ";
const SSE_DONE: &str = "[DONE]";

/// OpenAI-compatible `/v1/chat/completions` adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatCompletionsProtocol;

#[derive(Deserialize)]
struct CompletionBody {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkBody {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl WireProtocol for ChatCompletionsProtocol {
    fn dialect(&self) -> Dialect {
        Dialect::ChatCompletions
    }

    fn target_url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if base.ends_with(COMPLETIONS_PATH) {
            base.to_string()
        } else if base.contains("/v1") {
            format!("{}{}", base, COMPLETIONS_PATH)
        } else {
            format!("{}/v1{}", base, COMPLETIONS_PATH)
        }
    }

    fn build_body(
        &self,
        conversation: &Conversation,
        params: &ModelParams<'_>,
        stream: bool,
    ) -> Value {
        let messages: Vec<Value> = conversation
            .turns()
            .iter()
            .map(|turn| json!({ "role": turn.role.as_str(), "content": turn.content }))
            .collect();

        let mut body = json!({
            "model": params.model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(temperature) = params.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = params.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    fn parse_response(&self, body: &str) -> Result<String, ProtocolError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        if let Some(message) = embedded_error(&value) {
            return Err(ProtocolError::Upstream(message));
        }

        let parsed: CompletionBody = serde_json::from_value(value)
            .map_err(|e| ProtocolError::UnexpectedShape(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProtocolError::UnexpectedShape("no choices in response".to_string()))?;

        if choice.finish_reason.as_deref() == Some("length") {
            tracing::warn!("Response truncated by max output length");
        }

        match choice.message.and_then(|m| m.content) {
            Some(content) if !content.is_empty() => Ok(content),
            _ => Err(ProtocolError::EmptyResponse),
        }
    }

    fn parse_stream_line(&self, line: &str) -> Result<LineOutcome, ProtocolError> {
        let Some(data) = line.strip_prefix(SSE_DATA_PREFIX) else {
            // comments, event names and blank separators
            return Ok(LineOutcome::skip());
        };
        let data = data.trim();
        if data == SSE_DONE {
            return Ok(LineOutcome::done());
        }

        let value: Value = match serde_json::from_str(data) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, data = %data, "Skipping malformed stream line");
                return Ok(LineOutcome::skip());
            }
        };

        if let Some(message) = embedded_error(&value) {
            return Err(ProtocolError::Upstream(message));
        }

        let chunk: ChunkBody = match serde_json::from_value(value) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping stream chunk with unexpected shape");
                return Ok(LineOutcome::skip());
            }
        };

        let content = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .filter(|c| !c.is_empty());

        Ok(match content {
            Some(text) => LineOutcome::delta(text),
            None => LineOutcome::skip(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ModelParams<'static> {
        ModelParams {
            model: "gpt-4o",
            temperature: None,
            max_tokens: None,
        }
    }

    #[test]
    fn test_target_url_appends_v1_path() {
        let p = ChatCompletionsProtocol;
        assert_eq!(
            p.target_url("http://localhost:8000"),
            "http://localhost:8000/v1/chat/completions"
        );
        assert_eq!(
            p.target_url("http://localhost:8000/"),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_target_url_keeps_existing_v1() {
        let p = ChatCompletionsProtocol;
        assert_eq!(
            p.target_url("https://api.example.com/v1/"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            p.target_url("https://gw.example.com/openai/v1beta"),
            "https://gw.example.com/openai/v1beta/chat/completions"
        );
    }

    #[test]
    fn test_target_url_already_complete() {
        let p = ChatCompletionsProtocol;
        assert_eq!(
            p.target_url("https://api.example.com/v1/chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_build_body_messages_in_order() {
        let conversation = Conversation::new().system("be brief").user("hi");
        let body = ChatCompletionsProtocol.build_body(&conversation, &params(), false);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_build_body_sampling_params() {
        let conversation = Conversation::new().user("hi");
        let params = ModelParams {
            model: "gpt-4o",
            temperature: Some(0.5),
            max_tokens: Some(256),
        };
        let body = ChatCompletionsProtocol.build_body(&conversation, &params, true);

        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn test_parse_response_content() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Hello"},"finish_reason":"stop"}]}"#;
        assert_eq!(ChatCompletionsProtocol.parse_response(body).unwrap(), "Hello");
    }

    #[test]
    fn test_parse_response_truncated_is_not_error() {
        let body = r#"{"choices":[{"message":{"content":"Partial"},"finish_reason":"length"}]}"#;
        assert_eq!(ChatCompletionsProtocol.parse_response(body).unwrap(), "Partial");
    }

    #[test]
    fn test_parse_response_empty_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":""}}]}"#;
        assert_eq!(
            ChatCompletionsProtocol.parse_response(body),
            Err(ProtocolError::EmptyResponse)
        );
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert_eq!(
            ChatCompletionsProtocol.parse_response(body),
            Err(ProtocolError::EmptyResponse)
        );
    }

    #[test]
    fn test_parse_response_no_choices() {
        assert!(matches!(
            ChatCompletionsProtocol.parse_response(r#"{"choices":[]}"#),
            Err(ProtocolError::UnexpectedShape(_))
        ));
        assert!(matches!(
            ChatCompletionsProtocol.parse_response(r#"{"object":"list"}"#),
            Err(ProtocolError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn test_parse_response_malformed() {
        assert!(matches!(
            ChatCompletionsProtocol.parse_response("<html>bad gateway</html>"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_response_embedded_error() {
        let body = r#"{"error":{"message":"model overloaded","type":"server_error"}}"#;
        assert_eq!(
            ChatCompletionsProtocol.parse_response(body),
            Err(ProtocolError::Upstream("model overloaded".to_string()))
        );
    }

    #[test]
    fn test_stream_line_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
        assert_eq!(
            ChatCompletionsProtocol.parse_stream_line(line).unwrap(),
            LineOutcome::delta("Hi")
        );
    }

    #[test]
    fn test_stream_line_done() {
        assert_eq!(
            ChatCompletionsProtocol.parse_stream_line("data: [DONE]").unwrap(),
            LineOutcome::done()
        );
    }

    #[test]
    fn test_stream_line_role_only_delta_skipped() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(
            ChatCompletionsProtocol.parse_stream_line(line).unwrap(),
            LineOutcome::skip()
        );
    }

    #[test]
    fn test_stream_line_malformed_skipped() {
        assert_eq!(
            ChatCompletionsProtocol
                .parse_stream_line("data: {not json")
                .unwrap(),
            LineOutcome::skip()
        );
    }

    #[test]
    fn test_stream_line_non_data_skipped() {
        for line in ["", ": keep-alive", "event: message"] {
            assert_eq!(
                ChatCompletionsProtocol.parse_stream_line(line).unwrap(),
                LineOutcome::skip()
            );
        }
    }

    #[test]
    fn test_stream_line_embedded_error() {
        let line = r#"data: {"error":{"message":"rate exceeded"}}"#;
        assert_eq!(
            ChatCompletionsProtocol.parse_stream_line(line),
            Err(ProtocolError::Upstream("rate exceeded".to_string()))
        );
    }
}
