//! Dispatcher façade.
//!
//! [`Dispatcher`] wires one HTTP client per configured endpoint into the
//! [`RetryManager`] loop and exposes a uniform send/stream API:
//!
//! - With a preferred endpoint, that endpoint is tried first outside the
//!   retry loop. On a retryable failure, and only when failover is enabled
//!   and more than one endpoint exists, the retry loop takes over with the
//!   preferred endpoint excluded and attempt numbering continued.
//! - Otherwise the retry loop selects endpoints from the start.
//!
//! Retry and endpoint-switch notifications, and every failed attempt, are
//! published on a broadcast channel (see [`Dispatcher::subscribe`]).

mod client;
pub mod error;
pub mod events;
pub mod types;

pub use client::mask_credentials;
pub use error::{DispatchError, ErrorKind, NetworkErrorKind, ServiceErrorKind};
pub use events::DispatchEvent;
pub use types::{Completion, DispatchOptions, StreamEvent, StreamObserver};

use crate::config::{EndpointConfig, RelayConfig, RetryConfig};
use crate::conversation::Conversation;
use crate::health::HealthSnapshot;
use crate::logging::{conversation_preview, outcome_label};
use crate::retry::{RetryClassify, RetryManager, RetryObserver, RetryOptions};
use chrono::Utc;
use client::EndpointClient;
use futures_util::stream::BoxStream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn, Instrument};

/// Buffered events per subscriber before old ones are dropped.
const EVENT_CAPACITY: usize = 64;

/// Resilient multi-endpoint dispatcher.
pub struct Dispatcher {
    clients: HashMap<String, EndpointClient>,
    retry: RetryManager,
    events: broadcast::Sender<DispatchEvent>,
    retry_observer: Option<Arc<dyn RetryObserver>>,
    log_content: bool,
}

impl Dispatcher {
    /// Build a dispatcher over `endpoints`, in selection-tie order.
    ///
    /// Fails when an endpoint's HTTP client cannot be built (e.g. an invalid
    /// proxy URL). Endpoints with a repeated id are skipped.
    pub fn new(endpoints: Vec<EndpointConfig>, retry: &RetryConfig) -> Result<Self, DispatchError> {
        let mut clients = HashMap::new();
        let mut order = Vec::new();
        for endpoint in endpoints {
            if clients.contains_key(&endpoint.id) {
                warn!(endpoint = %endpoint.id, "Duplicate endpoint id ignored");
                continue;
            }
            let id = endpoint.id.clone();
            let client = EndpointClient::new(endpoint)?;
            debug!(endpoint = %id, url = %client.target_url(), "Endpoint registered");
            order.push(id.clone());
            clients.insert(id, client);
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            clients,
            retry: RetryManager::new(order, retry),
            events,
            retry_observer: None,
            log_content: false,
        })
    }

    /// Build from a loaded configuration: enabled endpoints only, the
    /// default endpoint first.
    pub fn from_config(config: &RelayConfig) -> Result<Self, DispatchError> {
        Ok(Self::new(config.ordered_endpoints(), &config.retry)?
            .with_content_logging(config.logging.log_content))
    }

    /// Also forward retry notifications to `observer`.
    pub fn with_retry_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.retry_observer = Some(observer);
        self
    }

    /// Log a truncated preview of each conversation at debug level.
    pub fn with_content_logging(mut self, enabled: bool) -> Self {
        self.log_content = enabled;
        self
    }

    /// Endpoint ids in selection-tie order.
    pub fn endpoints(&self) -> &[String] {
        self.retry.endpoints()
    }

    pub fn endpoint(&self, id: &str) -> Option<&EndpointConfig> {
        self.clients.get(id).map(|c| c.config())
    }

    /// Receive retry, switch and attempt-failure notifications.
    ///
    /// Slow receivers miss old events rather than delaying dispatches.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.events.subscribe()
    }

    pub fn health_status(&self) -> Vec<HealthSnapshot> {
        self.retry.health_status()
    }

    /// Operator reset: clear an endpoint's counters and close its circuit.
    pub fn reset_endpoint(&self, id: &str) -> bool {
        self.retry.reset_endpoint(id)
    }

    /// Dispatch a conversation and return the aggregated answer.
    pub async fn send(
        &self,
        conversation: &Conversation,
        options: &DispatchOptions,
    ) -> Result<Completion, DispatchError> {
        self.send_with_observer(conversation, options, &()).await
    }

    /// Dispatch a conversation, reporting streaming progress to `observer`.
    pub async fn send_with_observer(
        &self,
        conversation: &Conversation,
        options: &DispatchOptions,
        observer: &dyn StreamObserver,
    ) -> Result<Completion, DispatchError> {
        let span = tracing::info_span!(
            "dispatch",
            dispatch_id = %uuid::Uuid::new_v4(),
            stream = options.stream,
        );
        self.dispatch(conversation, options, observer)
            .instrument(span)
            .await
    }

    /// Dispatch in streaming mode and receive the progress as events.
    ///
    /// The dispatch runs on a spawned task. The stream yields `Delta` events,
    /// a `Reset` whenever a failed attempt is followed by another one, and
    /// ends with exactly one `End` or `Error`.
    pub fn stream(
        self: &Arc<Self>,
        conversation: Conversation,
        options: DispatchOptions,
    ) -> BoxStream<'static, StreamEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Arc::clone(self);
        let options = DispatchOptions {
            stream: true,
            ..options
        };

        tokio::spawn(async move {
            let observer = ChannelObserver::new(tx.clone());
            let terminal = match dispatcher
                .send_with_observer(&conversation, &options, &observer)
                .await
            {
                Ok(completion) => StreamEvent::End {
                    token_count: completion.token_count,
                },
                Err(e) => StreamEvent::Error {
                    kind: e.kind(),
                    message: e.to_string(),
                },
            };
            let _ = tx.send(terminal);
        });

        Box::pin(async_stream::stream! {
            while let Some(event) = rx.recv().await {
                let terminal = event.is_terminal();
                yield event;
                if terminal {
                    break;
                }
            }
        })
    }

    async fn dispatch(
        &self,
        conversation: &Conversation,
        options: &DispatchOptions,
        observer: &dyn StreamObserver,
    ) -> Result<Completion, DispatchError> {
        if let Some(preview) = conversation_preview(conversation, self.log_content) {
            debug!(turns = conversation.len(), preview = %preview, "Dispatching conversation");
        }

        let notifier = Notifier {
            events: &self.events,
            forward: self.retry_observer.as_deref(),
        };
        let attempts = AtomicU32::new(0);

        let result = match options.preferred_endpoint.as_deref() {
            Some(preferred) => {
                self.send_preferred(preferred, conversation, options, observer, &notifier, &attempts)
                    .await
            }
            None => {
                let stream = options.stream;
                let attempts = &attempts;
                self.retry
                    .execute_with_retry(
                        move |endpoint| self.attempt(endpoint, conversation, stream, observer, attempts),
                        &notifier,
                    )
                    .await
                    .map_err(DispatchError::from)
            }
        };

        match &result {
            Ok(completion) => info!(
                endpoint = %completion.endpoint_id,
                tokens = completion.token_count,
                attempts = attempts.load(Ordering::Relaxed),
                "Dispatch completed"
            ),
            Err(e) => error!(kind = %e.kind(), error = %e, "Dispatch failed"),
        }
        result
    }

    async fn send_preferred(
        &self,
        preferred: &str,
        conversation: &Conversation,
        options: &DispatchOptions,
        observer: &dyn StreamObserver,
        notifier: &Notifier<'_>,
        attempts: &AtomicU32,
    ) -> Result<Completion, DispatchError> {
        let Some(health) = self.retry.health(preferred) else {
            return Err(DispatchError::UnknownEndpoint(preferred.to_string()));
        };

        let err = match self
            .attempt(preferred.to_string(), conversation, options.stream, observer, attempts)
            .await
        {
            Ok(completion) => {
                health.record_success();
                return Ok(completion);
            }
            Err(err) => err,
        };

        if err.records_failure() {
            health.record_failure();
        }
        if !options.use_failover || self.retry.endpoints().len() <= 1 || !err.is_retryable() {
            return Err(err);
        }

        warn!(endpoint = %preferred, error = %err, "Preferred endpoint failed, failing over");
        let wait = self.retry.backoff().delay(1);
        notifier.on_retry(1, preferred, wait);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        let retry_options = RetryOptions {
            exclude: vec![preferred.to_string()],
            attempt_offset: 1,
            previous_endpoint: Some(preferred.to_string()),
        };
        let stream = options.stream;
        self.retry
            .execute_with_options(
                move |endpoint| self.attempt(endpoint, conversation, stream, observer, attempts),
                retry_options,
                notifier,
            )
            .await
            .map_err(DispatchError::from)
    }

    /// One request against one endpoint.
    async fn attempt(
        &self,
        endpoint: String,
        conversation: &Conversation,
        stream: bool,
        observer: &dyn StreamObserver,
        attempts: &AtomicU32,
    ) -> Result<Completion, DispatchError> {
        let number = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let Some(client) = self.clients.get(&endpoint) else {
            return Err(DispatchError::UnknownEndpoint(endpoint));
        };

        let span = tracing::debug_span!("attempt", endpoint = %endpoint, attempt = number);
        let result = async {
            if stream {
                client.complete_streaming(conversation, observer).await
            } else {
                client.complete(conversation).await
            }
        }
        .instrument(span)
        .await;

        metrics::counter!(
            "relay_attempts_total",
            "endpoint" => endpoint.clone(),
            "outcome" => outcome_label(&result)
        )
        .increment(1);

        if let Err(err) = &result {
            observer.on_error(err);
            let _ = self.events.send(DispatchEvent::AttemptFailed {
                attempt: number,
                endpoint,
                kind: err.kind(),
                message: err.to_string(),
                timestamp: Utc::now(),
            });
        }
        result
    }
}

/// Publishes retry-loop notifications and forwards them to the caller's observer.
struct Notifier<'a> {
    events: &'a broadcast::Sender<DispatchEvent>,
    forward: Option<&'a dyn RetryObserver>,
}

impl RetryObserver for Notifier<'_> {
    fn on_retry(&self, attempt: u32, endpoint: &str, wait: Duration) {
        let wait_ms = wait.as_millis() as u64;
        warn!(attempt, endpoint, wait_ms, "Retrying after failure");
        let _ = self.events.send(DispatchEvent::Retry {
            attempt,
            endpoint: endpoint.to_string(),
            wait_ms,
            timestamp: Utc::now(),
        });
        if let Some(observer) = self.forward {
            observer.on_retry(attempt, endpoint, wait);
        }
    }

    fn on_endpoint_switch(&self, endpoint: &str) {
        info!(endpoint, "Switching endpoint");
        metrics::counter!("relay_failovers_total", "endpoint" => endpoint.to_string()).increment(1);
        let _ = self.events.send(DispatchEvent::EndpointSwitch {
            endpoint: endpoint.to_string(),
            timestamp: Utc::now(),
        });
        if let Some(observer) = self.forward {
            observer.on_endpoint_switch(endpoint);
        }
    }
}

/// Turns observer callbacks into [`StreamEvent`]s.
///
/// A failed attempt becomes a `Reset` only once the next attempt starts, so
/// the final failure is reported solely by the terminal `Error`.
struct ChannelObserver {
    tx: mpsc::UnboundedSender<StreamEvent>,
    pending_reset: Mutex<Option<String>>,
}

impl ChannelObserver {
    fn new(tx: mpsc::UnboundedSender<StreamEvent>) -> Self {
        Self {
            tx,
            pending_reset: Mutex::new(None),
        }
    }
}

impl StreamObserver for ChannelObserver {
    fn on_start(&self) {
        let pending = self
            .pending_reset
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(message) = pending {
            let _ = self.tx.send(StreamEvent::Reset { message });
        }
    }

    fn on_chunk(&self, text: &str) {
        let _ = self.tx.send(StreamEvent::Delta {
            text: text.to_string(),
        });
    }

    fn on_error(&self, error: &DispatchError) {
        *self
            .pending_reset
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error.to_string());
    }
}
