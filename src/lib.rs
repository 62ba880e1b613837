//! Relay - resilient multi-endpoint LLM dispatcher
//!
//! This library sends a conversation to one of several configured LLM
//! endpoints, speaking either the chat-completions or the generate dialect.
//! Failed attempts are retried with exponential backoff, endpoints that keep
//! failing are taken out of rotation by a per-endpoint circuit breaker, and
//! streamed answers are delivered incrementally.
//!
//! ```no_run
//! use relay::config::{Dialect, EndpointConfig, RetryConfig};
//! use relay::conversation::Conversation;
//! use relay::dispatch::{DispatchOptions, Dispatcher};
//!
//! # async fn demo() -> Result<(), relay::dispatch::DispatchError> {
//! let dispatcher = Dispatcher::new(
//!     vec![
//!         EndpointConfig::new("local", Dialect::Generate, "http://localhost:11434", "llama3"),
//!         EndpointConfig::new("cloud", Dialect::ChatCompletions, "https://api.example.com/v1", "gpt-4o-mini"),
//!     ],
//!     &RetryConfig::default(),
//! )?;
//! let answer = dispatcher
//!     .send(&Conversation::new().user("Hello"), &DispatchOptions::default())
//!     .await?;
//! println!("{} (from {})", answer.text, answer.endpoint_id);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod conversation;
pub mod dispatch;
pub mod health;
pub mod logging;
pub mod protocol;
pub mod retry;
