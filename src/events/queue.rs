//! Durable table-backed event queue with leased delivery.
//!
//! One row per event. Claims take a time-bounded lease; unacked claims
//! become reclaimable when the lease expires. Row exclusion uses
//! `FOR UPDATE SKIP LOCKED` where the engine supports it; elsewhere the
//! claim update's compare-and-swap on `status` gives the same
//! guarantee.
//!
//! Every statement the queue issues is generated through the crate's
//! own builders, so placeholder style and quoting follow the session's
//! dialect automatically.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::builder::{DeleteBuilder, InsertBuilder, SelectBuilder, UpdateBuilder};
use crate::pipeline::statement::Statement;
use crate::session::{ResultSet, Session, SessionProvider};
use crate::sql::expr::{col, lit_null, raw_sql};
use crate::sql::query::OrderByExpr;
use crate::value::Value;

use super::{new_event_id, validate_channel, EventError, EventMessage, EventResult, JsonMap};

/// Durable queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Table holding queued events.
    pub queue_table: String,
    /// Claim lease length.
    pub lease_seconds: u64,
    /// Retention after ack: 0 deletes acked rows, otherwise they are
    /// kept in `acked` state.
    pub retention_seconds: u64,
    /// Claim candidates with SELECT ... FOR UPDATE when available.
    pub select_for_update: bool,
    /// Add SKIP LOCKED to the locking clause when available.
    pub skip_locked: bool,
    /// Store payloads as native JSON values instead of encoded text.
    pub json_passthrough: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_table: "event_queue".into(),
            lease_seconds: 30,
            retention_seconds: 0,
            select_for_update: true,
            skip_locked: true,
            json_passthrough: false,
        }
    }
}

const ROW_COLUMNS: [&str; 7] = [
    "event_id",
    "channel",
    "payload_json",
    "metadata_json",
    "attempts",
    "available_at",
    "created_at",
];

/// The durable queue.
pub struct TableEventQueue<P: SessionProvider> {
    provider: Arc<P>,
    config: QueueConfig,
}

impl<P: SessionProvider> TableEventQueue<P> {
    pub fn new(provider: Arc<P>, config: QueueConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    fn dialect(&self) -> crate::sql::dialect::Dialect {
        self.provider.capabilities().dialect
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Insert a pending event, returning its id.
    pub async fn publish(
        &self,
        channel: &str,
        payload: JsonMap,
        metadata: Option<JsonMap>,
    ) -> EventResult<String> {
        validate_channel(channel)?;
        let event_id = new_event_id();
        let mut session = self.provider.acquire().await?;
        let stmt = self.upsert_statement(&event_id, channel, &payload, metadata.as_ref())?;
        session.execute(&stmt).await?;
        session.commit().await?;
        Ok(event_id)
    }

    /// Wait up to `poll_interval` for one claimable event.
    ///
    /// Tries immediately, then once more after `poll_interval`, so the
    /// call returns within `poll_interval` plus one claim round-trip.
    pub async fn dequeue(
        &self,
        channel: &str,
        poll_interval: Duration,
    ) -> EventResult<Option<EventMessage>> {
        validate_channel(channel)?;
        if let Some(message) = self.claim_once(channel).await? {
            return Ok(Some(message));
        }
        tokio::time::sleep(poll_interval).await;
        self.claim_once(channel).await
    }

    /// Acknowledge a claimed event.
    ///
    /// A no-op when the lease has already expired (the row is pending
    /// again and will be redelivered).
    pub async fn ack(&self, event_id: &str) -> EventResult<()> {
        let now = Utc::now();
        let stmt = if self.config.retention_seconds == 0 {
            DeleteBuilder::from_(&self.config.queue_table)
                .dialect(self.dialect())
                .where_(("event_id", event_id))
                .where_(("status", "claimed"))
                .where_(("lease_expires_at", ">", Value::Datetime(now)))
                .to_statement()?
        } else {
            UpdateBuilder::table(&self.config.queue_table)
                .dialect(self.dialect())
                .set("status", "acked")
                .set_expr("lease_expires_at", lit_null())
                .where_(("event_id", event_id))
                .where_(("status", "claimed"))
                .where_(("lease_expires_at", ">", Value::Datetime(now)))
                .to_statement()?
        };

        let mut session = self.provider.acquire().await?;
        let result = session.execute(&stmt).await?;
        session.commit().await?;
        if result.rows_affected == 0 {
            debug!(event_id = %event_id, "ack after lease expiry ignored");
        }
        Ok(())
    }

    /// Return a claimed event to pending, optionally delaying its next
    /// delivery.
    pub async fn nack(&self, event_id: &str, delay: Option<Duration>) -> EventResult<()> {
        let available_at = Utc::now()
            + chrono::Duration::from_std(delay.unwrap_or_default())
                .unwrap_or_else(|_| chrono::Duration::zero());

        let stmt = UpdateBuilder::table(&self.config.queue_table)
            .dialect(self.dialect())
            .set("status", "pending")
            .set_expr("lease_expires_at", lit_null())
            .set("available_at", Value::Datetime(available_at))
            .where_(("event_id", event_id))
            .to_statement()?;

        let mut session = self.provider.acquire().await?;
        session.execute(&stmt).await?;
        session.commit().await?;
        Ok(())
    }

    /// One claim attempt: reclaim expired leases, pick the oldest
    /// eligible row, and move it to `claimed` under a fresh lease.
    pub(crate) async fn claim_once(&self, channel: &str) -> EventResult<Option<EventMessage>> {
        let mut session = self.provider.acquire().await?;

        // Lazy reclaim at the head of every dequeue
        let reclaim = self.reclaim_statement()?;
        session.execute(&reclaim).await?;

        let candidate = self.candidate_statement(channel)?;
        let rows = session.execute(&candidate).await?;
        let Some(event_id) = rows.get(0, "event_id").cloned() else {
            session.commit().await?;
            return Ok(None);
        };
        let event_id = value_to_string(&event_id)?;

        let lease_expires_at =
            Utc::now() + chrono::Duration::seconds(self.config.lease_seconds as i64);
        let claim = self.claim_statement(&event_id, lease_expires_at)?;
        let claimed = session.execute(&claim).await?;
        session.commit().await?;

        if claimed.rows_affected == 0 {
            // Another consumer won the row between select and update
            return Ok(None);
        }

        let message = self.message_from_row(&rows, lease_expires_at)?;
        Ok(Some(message))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub(crate) fn upsert_statement(
        &self,
        event_id: &str,
        channel: &str,
        payload: &JsonMap,
        metadata: Option<&JsonMap>,
    ) -> EventResult<Statement> {
        let now = Utc::now();
        let stmt = InsertBuilder::into(&self.config.queue_table)
            .dialect(self.dialect())
            .columns([
                "event_id",
                "channel",
                "payload_json",
                "metadata_json",
                "status",
                "available_at",
                "lease_expires_at",
                "attempts",
                "created_at",
            ])
            .values(vec![
                Value::String(event_id.into()),
                Value::String(channel.into()),
                self.encode_json(Some(payload))?,
                self.encode_json(metadata)?,
                Value::String("pending".into()),
                Value::Datetime(now),
                Value::Null,
                Value::Int(0),
                Value::Datetime(now),
            ])
            .on_conflict_do_update(
                vec!["event_id"],
                vec![
                    ("status", Value::String("pending".into())),
                    ("available_at", Value::Datetime(now)),
                ],
            )
            .to_statement()?;
        Ok(stmt)
    }

    fn reclaim_statement(&self) -> EventResult<Statement> {
        let stmt = UpdateBuilder::table(&self.config.queue_table)
            .dialect(self.dialect())
            .set("status", "pending")
            .set_expr("lease_expires_at", lit_null())
            .where_(("status", "claimed"))
            .where_(("lease_expires_at", "<", Value::Datetime(Utc::now())))
            .to_statement()?;
        Ok(stmt)
    }

    fn candidate_statement(&self, channel: &str) -> EventResult<Statement> {
        let caps = self.provider.capabilities();
        let mut builder = SelectBuilder::new()
            .dialect(self.dialect())
            .select(ROW_COLUMNS.iter().map(|&c| col(c)).collect::<Vec<_>>())
            .from_(self.config.queue_table.as_str())
            .where_(("status", "pending"))
            .where_(("channel", channel))
            .where_(("available_at", "<=", Value::Datetime(Utc::now())))
            .order_by(vec![
                OrderByExpr::asc(col("available_at")),
                OrderByExpr::asc(col("created_at")),
            ])
            .limit(1);

        if self.config.select_for_update && caps.supports_select_for_update {
            builder = builder.for_update();
            if self.config.skip_locked && caps.supports_skip_locked {
                builder = builder.skip_locked();
            }
        }

        Ok(builder.to_statement()?)
    }

    fn claim_statement(
        &self,
        event_id: &str,
        lease_expires_at: DateTime<Utc>,
    ) -> EventResult<Statement> {
        let stmt = UpdateBuilder::table(&self.config.queue_table)
            .dialect(self.dialect())
            .set("status", "claimed")
            .set("lease_expires_at", Value::Datetime(lease_expires_at))
            .set_expr("attempts", raw_sql("attempts + 1"))
            .where_(("event_id", event_id))
            // CAS: only a still-pending row can be claimed
            .where_(("status", "pending"))
            .to_statement()?;
        Ok(stmt)
    }

    // =========================================================================
    // Row mapping
    // =========================================================================

    fn encode_json(&self, map: Option<&JsonMap>) -> EventResult<Value> {
        let Some(map) = map else {
            return Ok(Value::Null);
        };
        if self.config.json_passthrough {
            Ok(Value::Json(serde_json::Value::Object(map.clone())))
        } else {
            let encoded = serde_json::to_string(map)
                .map_err(|e| EventError::Envelope(e.to_string()))?;
            Ok(Value::String(encoded))
        }
    }

    fn message_from_row(
        &self,
        rows: &ResultSet,
        lease_expires_at: DateTime<Utc>,
    ) -> EventResult<EventMessage> {
        let get = |column: &str| -> EventResult<&Value> {
            rows.get(0, column).ok_or_else(|| {
                EventError::Channel(format!("queue row is missing column {column}"))
            })
        };

        Ok(EventMessage {
            event_id: value_to_string(get("event_id")?)?,
            channel: value_to_string(get("channel")?)?,
            payload: decode_json_object(get("payload_json")?)?.unwrap_or_default(),
            metadata: decode_json_object(get("metadata_json")?)?,
            attempts: value_to_i64(get("attempts")?)? as u32 + 1,
            available_at: value_to_datetime(get("available_at")?)?,
            lease_expires_at: Some(lease_expires_at),
            created_at: value_to_datetime(get("created_at")?)?,
        })
    }
}

fn value_to_string(value: &Value) -> EventResult<String> {
    match value {
        Value::String(s) | Value::Raw(s) => Ok(s.clone()),
        other => Err(EventError::Channel(format!(
            "expected text column, got {}",
            other.type_name()
        ))),
    }
}

fn value_to_i64(value: &Value) -> EventResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        other => Err(EventError::Channel(format!(
            "expected integer column, got {}",
            other.type_name()
        ))),
    }
}

fn value_to_datetime(value: &Value) -> EventResult<DateTime<Utc>> {
    match value {
        Value::Datetime(dt) => Ok(*dt),
        Value::String(s) => s
            .parse::<DateTime<Utc>>()
            .map_err(|e| EventError::Channel(format!("bad timestamp column: {e}"))),
        other => Err(EventError::Channel(format!(
            "expected timestamp column, got {}",
            other.type_name()
        ))),
    }
}

fn decode_json_object(value: &Value) -> EventResult<Option<JsonMap>> {
    match value {
        Value::Null => Ok(None),
        Value::Json(serde_json::Value::Object(map)) => Ok(Some(map.clone())),
        Value::String(s) => {
            let parsed: serde_json::Value =
                serde_json::from_str(s).map_err(|e| EventError::Envelope(e.to_string()))?;
            match parsed {
                serde_json::Value::Object(map) => Ok(Some(map)),
                serde_json::Value::Null => Ok(None),
                other => {
                    let mut map = JsonMap::new();
                    map.insert("value".into(), other);
                    Ok(Some(map))
                }
            }
        }
        other => Err(EventError::Channel(format!(
            "expected JSON column, got {}",
            other.type_name()
        ))),
    }
}
