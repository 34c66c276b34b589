//! Blocking facade over the event channel.
//!
//! Thread-based callers drive the async channel through an owned
//! current-thread runtime; each call blocks until the underlying
//! operation completes. Cooperative callers should use
//! [`EventChannel`](super::EventChannel) directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::{AckDecision, EventBackend, EventChannel, EventMessage, EventResult, JsonMap};

/// Synchronous event channel surface.
pub struct BlockingEventChannel {
    runtime: tokio::runtime::Runtime,
    channel: EventChannel,
}

impl BlockingEventChannel {
    pub fn new(backend: Arc<dyn EventBackend>) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime,
            channel: EventChannel::new(backend),
        })
    }

    pub fn publish(
        &self,
        channel: &str,
        payload: JsonMap,
        metadata: Option<JsonMap>,
    ) -> EventResult<String> {
        self.runtime
            .block_on(self.channel.publish(channel, payload, metadata))
    }

    pub fn dequeue(
        &self,
        channel: &str,
        poll_interval: Duration,
    ) -> EventResult<Option<EventMessage>> {
        self.runtime
            .block_on(self.channel.dequeue(channel, poll_interval))
    }

    pub fn ack(&self, event_id: &str) -> EventResult<()> {
        self.runtime.block_on(self.channel.ack(event_id))
    }

    pub fn nack(&self, event_id: &str, delay: Option<Duration>) -> EventResult<()> {
        self.runtime.block_on(self.channel.nack(event_id, delay))
    }

    /// Blocking subscribe loop; returns once `stop` flips to true.
    pub fn subscribe(
        &self,
        channel: &str,
        poll_interval: Duration,
        stop: Arc<AtomicBool>,
        mut handler: impl FnMut(EventMessage) -> AckDecision,
    ) -> EventResult<()> {
        super::validate_channel(channel)?;

        while !stop.load(Ordering::Relaxed) {
            let Some(message) = self.dequeue(channel, poll_interval)? else {
                continue;
            };
            let event_id = message.event_id.clone();
            match handler(message) {
                AckDecision::Ack => {
                    if let Err(err) = self.ack(&event_id) {
                        warn!(event_id = %event_id, error = %err, "ack failed");
                    }
                }
                AckDecision::Nack { delay } => {
                    if let Err(err) = self.nack(&event_id, delay) {
                        warn!(event_id = %event_id, error = %err, "nack failed");
                    }
                }
            }
        }
        Ok(())
    }

    pub fn shutdown(&self) -> EventResult<()> {
        self.runtime.block_on(self.channel.shutdown())
    }
}
