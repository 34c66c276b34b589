//! Native backend: the engine's own pub/sub primitive.
//!
//! Fire-and-forget semantics: `publish` issues NOTIFY with a JSON
//! envelope, `dequeue` waits on a dedicated subscribing connection,
//! and ack/nack are no-ops. Delivery is at-most-once and ephemeral.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::builder::SelectBuilder;
use crate::session::{NotificationListener, Session, SessionProvider};
use crate::sql::expr::{func, param};

use super::{
    validate_channel, Envelope, EventBackend, EventError, EventMessage, EventResult, JsonMap,
    DEFAULT_NOTIFY_PAYLOAD_LIMIT,
};

struct ListenerState {
    listener: Box<dyn NotificationListener>,
    channels: Vec<String>,
}

/// Ephemeral pub/sub over LISTEN/NOTIFY (or equivalent).
pub struct NativeBackend<P: SessionProvider> {
    provider: Arc<P>,
    /// The subscribing connection. Owned exclusively by this backend;
    /// concurrent dequeues serialize on the lock.
    listener: Mutex<Option<ListenerState>>,
    payload_limit: usize,
}

impl<P: SessionProvider> NativeBackend<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self::with_payload_limit(provider, DEFAULT_NOTIFY_PAYLOAD_LIMIT)
    }

    pub fn with_payload_limit(provider: Arc<P>, payload_limit: usize) -> Self {
        Self {
            provider,
            listener: Mutex::new(None),
            payload_limit,
        }
    }

    fn require_native(&self) -> EventResult<()> {
        if self.provider.capabilities().supports_listen_notify {
            Ok(())
        } else {
            Err(EventError::NotSupported(
                "driver has no native pub/sub primitive".into(),
            ))
        }
    }

    /// Issue NOTIFY through a regular session.
    async fn send_notify(&self, channel: &str, envelope: &str) -> EventResult<()> {
        let dialect = self.provider.capabilities().dialect;
        let mut builder = SelectBuilder::new().dialect(dialect);
        let channel_param = builder.add_parameter(channel, Some("notify"));
        let payload_param = builder.add_parameter(envelope, Some("notify"));
        let stmt = builder
            .select(vec![func(
                "pg_notify",
                vec![param(&channel_param), param(&payload_param)],
            )])
            .to_statement()?;

        let mut session = self.provider.acquire().await?;
        session.execute(&stmt).await?;
        session.commit().await?;
        Ok(())
    }

    /// Ensure the subscribing connection exists and listens on
    /// `channel`. Must be called with the listener lock held.
    async fn ensure_listening<'a>(
        &self,
        state: &'a mut Option<ListenerState>,
        channel: &str,
    ) -> EventResult<&'a mut ListenerState> {
        if state.is_none() {
            let listener = self.provider.listener().await?;
            *state = Some(ListenerState {
                listener,
                channels: Vec::new(),
            });
        }
        let state = state.as_mut().expect("listener just ensured");
        if !state.channels.iter().any(|c| c == channel) {
            state.listener.listen(channel).await?;
            state.channels.push(channel.to_string());
        }
        Ok(state)
    }
}

#[async_trait]
impl<P: SessionProvider + 'static> EventBackend for NativeBackend<P> {
    async fn publish(
        &self,
        channel: &str,
        payload: JsonMap,
        metadata: Option<JsonMap>,
    ) -> EventResult<String> {
        validate_channel(channel)?;
        self.require_native()?;

        let event_id = super::new_event_id();
        let envelope = Envelope::full(&event_id, payload, metadata).encode(self.payload_limit)?;
        self.send_notify(channel, &envelope).await?;
        Ok(event_id)
    }

    async fn dequeue(
        &self,
        channel: &str,
        poll_interval: Duration,
    ) -> EventResult<Option<EventMessage>> {
        validate_channel(channel)?;
        self.require_native()?;

        let mut guard = self.listener.lock().await;
        let state = self.ensure_listening(&mut guard, channel).await?;

        let Some(notification) = state.listener.recv(poll_interval).await? else {
            return Ok(None);
        };
        if notification.channel != channel {
            return Ok(None);
        }
        let envelope = Envelope::decode(&notification.payload)?;
        Ok(Some(envelope.into_message(channel)))
    }

    /// Fire-and-forget delivery: nothing to acknowledge.
    async fn ack(&self, _event_id: &str) -> EventResult<()> {
        Ok(())
    }

    /// Fire-and-forget delivery: nothing to return.
    async fn nack(&self, _event_id: &str, _delay: Option<Duration>) -> EventResult<()> {
        Ok(())
    }

    /// Close the subscribing connection. Idempotent.
    async fn shutdown(&self) -> EventResult<()> {
        let mut guard = self.listener.lock().await;
        if let Some(mut state) = guard.take() {
            state.listener.close().await?;
        }
        Ok(())
    }
}
