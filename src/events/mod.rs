//! Event channel core.
//!
//! A publish/subscribe abstraction with three pluggable semantics:
//!
//! - [`native`] - ephemeral engine pub/sub (LISTEN/NOTIFY);
//!   at-most-once, real-time.
//! - [`durable`] - table-backed queue with leased delivery;
//!   at-least-once with bounded redelivery.
//! - [`hybrid`] - durable storage plus a native wakeup hint;
//!   at-least-once with real-time latency while a subscriber is
//!   connected.
//!
//! The [`EventChannel`] facade wraps any backend with channel-name
//! validation and a cancellable subscribe loop.

pub mod blocking;
pub mod durable;
pub mod hybrid;
pub mod native;
pub mod queue;

pub use self::durable::DurableBackend;
pub use self::hybrid::HybridBackend;
pub use self::native::NativeBackend;
pub use self::queue::{QueueConfig, TableEventQueue};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::builder::BuildError;
use crate::error::ErrorKind;
use crate::session::{SessionError, SessionProvider};

/// JSON object payloads carried by events.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Result type for event channel operations.
pub type EventResult<T> = Result<T, EventError>;

/// Default byte bound for native notify envelopes (PostgreSQL's NOTIFY
/// limit).
pub const DEFAULT_NOTIFY_PAYLOAD_LIMIT: usize = 8000;

/// Errors surfaced by the event channel.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("invalid channel name: {0}")]
    InvalidChannel(String),

    #[error("notify payload exceeds the configured bound of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("event envelope could not be encoded or decoded: {0}")]
    Envelope(String),

    #[error("backend does not support this operation: {0}")]
    NotSupported(String),

    #[error("event channel error: {0}")]
    Channel(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

impl EventError {
    /// Map into the crate-wide error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            EventError::NotSupported(_) => ErrorKind::ImproperConfiguration,
            EventError::Session(e) => e.kind(),
            EventError::Build(e) => e.kind(),
            _ => ErrorKind::EventChannel,
        }
    }
}

// ============================================================================
// Channel names and identifiers
// ============================================================================

static CHANNEL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z_][A-Za-z0-9_]*$").expect("valid channel regex"));

/// Validate a logical topic name.
pub fn validate_channel(name: &str) -> EventResult<()> {
    if CHANNEL_NAME.is_match(name) {
        Ok(())
    } else {
        Err(EventError::InvalidChannel(name.to_string()))
    }
}

/// Opaque unique event id: 128 random bits as lowercase hex.
pub fn new_event_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// ============================================================================
// Messages and envelopes
// ============================================================================

/// A delivered event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    pub event_id: String,
    pub channel: String,
    pub payload: JsonMap,
    pub metadata: Option<JsonMap>,
    /// Delivery attempt counter; meaningful for durable backends only.
    pub attempts: u32,
    pub available_at: DateTime<Utc>,
    /// Set while a claim's lease is live; `None` otherwise.
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The NOTIFY wire envelope.
///
/// Hybrid wakeups carry only `event_id`; native delivery carries the
/// full message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Envelope {
    /// Full envelope for native delivery.
    pub fn full(event_id: &str, payload: JsonMap, metadata: Option<JsonMap>) -> Self {
        Self {
            event_id: event_id.into(),
            payload: Some(payload),
            metadata,
            published_at: Some(Utc::now()),
        }
    }

    /// Wakeup-only envelope for hybrid publish.
    pub fn wakeup(event_id: &str) -> Self {
        Self {
            event_id: event_id.into(),
            payload: None,
            metadata: None,
            published_at: None,
        }
    }

    /// Encode as JSON, enforcing the notify byte bound.
    pub fn encode(&self, limit: usize) -> EventResult<String> {
        let encoded =
            serde_json::to_string(self).map_err(|e| EventError::Envelope(e.to_string()))?;
        if encoded.len() > limit {
            return Err(EventError::PayloadTooLarge { limit });
        }
        Ok(encoded)
    }

    /// Decode a NOTIFY payload.
    pub fn decode(raw: &str) -> EventResult<Self> {
        serde_json::from_str(raw).map_err(|e| EventError::Envelope(e.to_string()))
    }

    /// Promote into a message as delivered by an ephemeral backend.
    pub fn into_message(self, channel: &str) -> EventMessage {
        let published = self.published_at.unwrap_or_else(Utc::now);
        EventMessage {
            event_id: self.event_id,
            channel: channel.into(),
            payload: self.payload.unwrap_or_default(),
            metadata: self.metadata,
            attempts: 0,
            available_at: published,
            lease_expires_at: None,
            created_at: published,
        }
    }
}

// ============================================================================
// Backend contract
// ============================================================================

/// What a subscriber decides after handling a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDecision {
    Ack,
    Nack { delay: Option<Duration> },
}

/// The pluggable delivery backend.
#[async_trait]
pub trait EventBackend: Send + Sync {
    /// Publish a message, returning its event id.
    async fn publish(
        &self,
        channel: &str,
        payload: JsonMap,
        metadata: Option<JsonMap>,
    ) -> EventResult<String>;

    /// Wait up to `poll_interval` for one message; `None` on timeout.
    async fn dequeue(
        &self,
        channel: &str,
        poll_interval: Duration,
    ) -> EventResult<Option<EventMessage>>;

    /// Acknowledge successful processing.
    async fn ack(&self, event_id: &str) -> EventResult<()>;

    /// Return a message for redelivery, optionally delayed.
    async fn nack(&self, event_id: &str, delay: Option<Duration>) -> EventResult<()>;

    /// Release backend resources. Idempotent.
    async fn shutdown(&self) -> EventResult<()>;
}

/// Select a backend implementation by configured name.
///
/// `native` (alias `listen_notify`), `durable` (alias `table`), or
/// `hybrid` (alias `listen_notify_durable`).
pub fn backend_from_name<P>(
    provider: Arc<P>,
    name: &str,
    config: QueueConfig,
) -> EventResult<Arc<dyn EventBackend>>
where
    P: SessionProvider + 'static,
{
    match name {
        "native" | "listen_notify" => Ok(Arc::new(NativeBackend::new(provider))),
        "durable" | "table" => Ok(Arc::new(DurableBackend::new(provider, config))),
        "hybrid" | "listen_notify_durable" => Ok(Arc::new(HybridBackend::new(provider, config))),
        other => Err(EventError::NotSupported(format!(
            "unknown event backend: {other}"
        ))),
    }
}

// ============================================================================
// Channel facade
// ============================================================================

/// The public event channel API over any backend.
#[derive(Clone)]
pub struct EventChannel {
    backend: Arc<dyn EventBackend>,
}

impl EventChannel {
    pub fn new(backend: Arc<dyn EventBackend>) -> Self {
        Self { backend }
    }

    /// Publish a message.
    pub async fn publish(
        &self,
        channel: &str,
        payload: JsonMap,
        metadata: Option<JsonMap>,
    ) -> EventResult<String> {
        validate_channel(channel)?;
        self.backend.publish(channel, payload, metadata).await
    }

    /// Wait up to `poll_interval` for one message.
    pub async fn dequeue(
        &self,
        channel: &str,
        poll_interval: Duration,
    ) -> EventResult<Option<EventMessage>> {
        validate_channel(channel)?;
        self.backend.dequeue(channel, poll_interval).await
    }

    pub async fn ack(&self, event_id: &str) -> EventResult<()> {
        self.backend.ack(event_id).await
    }

    pub async fn nack(&self, event_id: &str, delay: Option<Duration>) -> EventResult<()> {
        self.backend.nack(event_id, delay).await
    }

    /// Long-running subscribe loop: dequeue, invoke the handler, then
    /// ack or nack by its decision. Returns when the shutdown signal
    /// flips to `true`.
    pub async fn subscribe<F, Fut>(
        &self,
        channel: &str,
        poll_interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
        mut handler: F,
    ) -> EventResult<()>
    where
        F: FnMut(EventMessage) -> Fut + Send,
        Fut: Future<Output = AckDecision> + Send,
    {
        validate_channel(channel)?;

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let message = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                    continue;
                }
                result = self.backend.dequeue(channel, poll_interval) => result?,
            };

            let Some(message) = message else {
                continue;
            };
            let event_id = message.event_id.clone();
            match handler(message).await {
                AckDecision::Ack => {
                    if let Err(err) = self.backend.ack(&event_id).await {
                        warn!(event_id = %event_id, error = %err, "ack failed");
                    }
                }
                AckDecision::Nack { delay } => {
                    debug!(event_id = %event_id, "handler rejected message");
                    if let Err(err) = self.backend.nack(&event_id, delay).await {
                        warn!(event_id = %event_id, error = %err, "nack failed");
                    }
                }
            }
        }
    }

    /// Shut the backend down. Idempotent.
    pub async fn shutdown(&self) -> EventResult<()> {
        self.backend.shutdown().await
    }
}
