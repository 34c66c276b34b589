//! Durable backend: the table queue behind the backend contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::session::SessionProvider;

use super::queue::{QueueConfig, TableEventQueue};
use super::{EventBackend, EventMessage, EventResult, JsonMap};

/// At-least-once, persistent delivery via the durable queue.
pub struct DurableBackend<P: SessionProvider> {
    queue: TableEventQueue<P>,
}

impl<P: SessionProvider> DurableBackend<P> {
    pub fn new(provider: Arc<P>, config: QueueConfig) -> Self {
        Self {
            queue: TableEventQueue::new(provider, config),
        }
    }

    pub fn queue(&self) -> &TableEventQueue<P> {
        &self.queue
    }
}

#[async_trait]
impl<P: SessionProvider + 'static> EventBackend for DurableBackend<P> {
    async fn publish(
        &self,
        channel: &str,
        payload: JsonMap,
        metadata: Option<JsonMap>,
    ) -> EventResult<String> {
        self.queue.publish(channel, payload, metadata).await
    }

    async fn dequeue(
        &self,
        channel: &str,
        poll_interval: Duration,
    ) -> EventResult<Option<EventMessage>> {
        self.queue.dequeue(channel, poll_interval).await
    }

    async fn ack(&self, event_id: &str) -> EventResult<()> {
        self.queue.ack(event_id).await
    }

    async fn nack(&self, event_id: &str, delay: Option<Duration>) -> EventResult<()> {
        self.queue.nack(event_id, delay).await
    }

    async fn shutdown(&self) -> EventResult<()> {
        // The queue holds no dedicated connection
        Ok(())
    }
}
