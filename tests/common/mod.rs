//! Shared test utilities for relay integration tests.
//!
//! Provides endpoint builders, canned dialect payloads and observers that
//! record callbacks, to reduce duplication across test files.

#![allow(dead_code)]

use relay::config::{Dialect, EndpointConfig, RetryConfig};
use relay::conversation::Conversation;
use relay::dispatch::{DispatchError, DispatchEvent, StreamObserver};
use std::sync::Mutex;
use tokio::sync::broadcast;

// =============================================================================
// Well-Known Paths
// =============================================================================

/// Request path of the chat-completions dialect for a bare host URL
pub const CHAT_PATH: &str = "/v1/chat/completions";

/// Request path of the generate dialect
pub const GENERATE_PATH: &str = "/api/generate";

// =============================================================================
// Configuration Builders
// =============================================================================

/// Retry settings with no waiting between attempts.
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        initial_backoff_seconds: 0.0,
        jitter: false,
        ..RetryConfig::default()
    }
}

/// Fast retry settings with a custom budget and circuit threshold.
pub fn retry_with(max_retries: u32, failure_threshold: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        failure_threshold,
        ..fast_retry()
    }
}

pub fn chat_endpoint(id: &str, url: &str) -> EndpointConfig {
    EndpointConfig::new(id, Dialect::ChatCompletions, url, "gpt-4o-mini").with_timeout(5)
}

pub fn generate_endpoint(id: &str, url: &str) -> EndpointConfig {
    EndpointConfig::new(id, Dialect::Generate, url, "llama3").with_timeout(5)
}

pub fn question() -> Conversation {
    Conversation::new().system("Be brief").user("Say hello")
}

// =============================================================================
// Dialect Payloads
// =============================================================================

/// Non-streaming chat-completions answer.
pub fn chat_answer(text: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }]
    })
}

/// Non-streaming generate answer.
pub fn generate_answer(text: &str) -> serde_json::Value {
    serde_json::json!({ "model": "llama3", "response": text, "done": true })
}

/// Server-sent-events body emitting one delta per fragment, then `[DONE]`.
pub fn sse_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        let chunk = serde_json::json!({
            "choices": [{ "index": 0, "delta": { "content": fragment } }]
        });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// Newline-delimited JSON body of the generate dialect.
pub fn ndjson_body(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        body.push_str(&format!(
            "{}\n",
            serde_json::json!({ "response": fragment, "done": false })
        ));
    }
    body.push_str("{\"response\":\"\",\"done\":true}\n");
    body
}

// =============================================================================
// Observers
// =============================================================================

/// Records every streaming callback in order.
#[derive(Default)]
pub struct RecordingObserver {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl StreamObserver for RecordingObserver {
    fn on_start(&self) {
        self.calls.lock().unwrap().push("start".to_string());
    }

    fn on_chunk(&self, text: &str) {
        self.calls.lock().unwrap().push(format!("chunk:{}", text));
    }

    fn on_end(&self, token_count: usize) {
        self.calls.lock().unwrap().push(format!("end:{}", token_count));
    }

    fn on_error(&self, error: &DispatchError) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("error:{}", error.kind()));
    }
}

/// Drain everything currently buffered on an event receiver.
pub fn drain(rx: &mut broadcast::Receiver<DispatchEvent>) -> Vec<DispatchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
