//! Hybrid backend: durable storage with native wakeups.
//!
//! Publish inserts into the durable queue and issues a NOTIFY carrying
//! only the event id, in one transaction. Dequeue waits on the
//! subscribing connection as a wakeup hint, then always claims from
//! the queue - correctness never relies on the notification arriving.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::builder::SelectBuilder;
use crate::session::{NotificationListener, Session, SessionError, SessionProvider};
use crate::sql::expr::{func, param};

use super::queue::{QueueConfig, TableEventQueue};
use super::{
    validate_channel, Envelope, EventBackend, EventMessage, EventResult, JsonMap,
    DEFAULT_NOTIFY_PAYLOAD_LIMIT,
};

struct ListenerState {
    listener: Box<dyn NotificationListener>,
    channels: Vec<String>,
}

/// At-least-once delivery with real-time latency while a subscriber is
/// connected.
pub struct HybridBackend<P: SessionProvider> {
    provider: Arc<P>,
    queue: TableEventQueue<P>,
    /// The subscribing connection, or `None` when the driver cannot
    /// listen (pure polling fallback).
    listener: Mutex<Option<ListenerState>>,
    payload_limit: usize,
}

impl<P: SessionProvider> HybridBackend<P> {
    pub fn new(provider: Arc<P>, config: QueueConfig) -> Self {
        Self {
            queue: TableEventQueue::new(Arc::clone(&provider), config),
            provider,
            listener: Mutex::new(None),
            payload_limit: DEFAULT_NOTIFY_PAYLOAD_LIMIT,
        }
    }

    pub fn queue(&self) -> &TableEventQueue<P> {
        &self.queue
    }

    /// Insert + NOTIFY in one transaction.
    async fn publish_durable(
        &self,
        channel: &str,
        event_id: &str,
        payload: JsonMap,
        metadata: Option<JsonMap>,
    ) -> EventResult<()> {
        let insert = self
            .queue
            .upsert_statement(event_id, channel, &payload, metadata.as_ref())?;

        let dialect = self.provider.capabilities().dialect;
        let wakeup = Envelope::wakeup(event_id).encode(self.payload_limit)?;
        let mut builder = SelectBuilder::new().dialect(dialect);
        let channel_param = builder.add_parameter(channel, Some("notify"));
        let payload_param = builder.add_parameter(wakeup.as_str(), Some("notify"));
        let notify = builder
            .select(vec![func(
                "pg_notify",
                vec![param(&channel_param), param(&payload_param)],
            )])
            .to_statement()?;

        let mut session = self.provider.acquire().await?;
        session.execute(&insert).await?;
        if self.provider.capabilities().supports_listen_notify {
            session.execute(&notify).await?;
        }
        session.commit().await?;
        Ok(())
    }

    /// Wait for a wakeup on the subscribing connection. `Ok(false)`
    /// means the driver cannot listen at all.
    async fn wait_for_wakeup(&self, channel: &str, poll_interval: Duration) -> EventResult<bool> {
        let mut guard = self.listener.lock().await;

        if guard.is_none() {
            match self.provider.listener().await {
                Ok(listener) => {
                    *guard = Some(ListenerState {
                        listener,
                        channels: Vec::new(),
                    });
                }
                Err(SessionError::ListenUnsupported) => return Ok(false),
                Err(err) => return Err(err.into()),
            }
        }

        let state = guard.as_mut().expect("listener just ensured");
        if !state.channels.iter().any(|c| c == channel) {
            state.listener.listen(channel).await?;
            state.channels.push(channel.to_string());
        }

        match state.listener.recv(poll_interval).await? {
            Some(notification) => {
                debug!(channel = %notification.channel, "wakeup received");
            }
            None => {
                debug!(channel = %channel, "wakeup timeout, falling back to poll");
            }
        }
        // Wakeup or timeout, the queue decides what is deliverable
        Ok(true)
    }
}

#[async_trait]
impl<P: SessionProvider + 'static> EventBackend for HybridBackend<P> {
    async fn publish(
        &self,
        channel: &str,
        payload: JsonMap,
        metadata: Option<JsonMap>,
    ) -> EventResult<String> {
        validate_channel(channel)?;
        let event_id = super::new_event_id();
        self.publish_durable(channel, &event_id, payload, metadata)
            .await?;
        Ok(event_id)
    }

    async fn dequeue(
        &self,
        channel: &str,
        poll_interval: Duration,
    ) -> EventResult<Option<EventMessage>> {
        validate_channel(channel)?;

        if self.provider.capabilities().supports_listen_notify {
            if self.wait_for_wakeup(channel, poll_interval).await? {
                return self.queue.claim_once(channel).await;
            }
        }
        // No native wakeup available: plain durable polling
        self.queue.dequeue(channel, poll_interval).await
    }

    async fn ack(&self, event_id: &str) -> EventResult<()> {
        self.queue.ack(event_id).await
    }

    async fn nack(&self, event_id: &str, delay: Option<Duration>) -> EventResult<()> {
        self.queue.nack(event_id, delay).await
    }

    /// Close the subscribing connection. Idempotent; queue state is
    /// unaffected.
    async fn shutdown(&self) -> EventResult<()> {
        let mut guard = self.listener.lock().await;
        if let Some(mut state) = guard.take() {
            state.listener.close().await?;
        }
        Ok(())
    }
}
