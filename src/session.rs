//! Database session contract.
//!
//! The pipeline and event channel never speak a wire protocol; they
//! consume this contract. A driver supplies a [`SessionProvider`]
//! handing out [`Session`]s, a [`DriverCapabilities`] record (instead
//! of subclass overrides), and optionally a dedicated
//! [`NotificationListener`] for engines with native pub/sub.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::ErrorKind;
use crate::pipeline::statement::Statement;
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::value::Value;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors crossing the session boundary.
///
/// Execution failures carry the originating statement's text, which is
/// parameter-free by construction; parameter values never appear in
/// messages.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("failed to acquire a session: {0}")]
    Acquire(String),

    #[error("statement execution failed: {message} (statement: {statement})")]
    Execution { message: String, statement: String },

    #[error("transaction operation failed: {0}")]
    Transaction(String),

    #[error("native pub/sub is not supported by this driver")]
    ListenUnsupported,

    #[error("session is closed")]
    Closed,
}

impl SessionError {
    /// Map into the crate-wide error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::ListenUnsupported => ErrorKind::ImproperConfiguration,
            _ => ErrorKind::Dependency,
        }
    }

    /// Wrap a driver failure with the statement that caused it.
    pub fn execution(message: impl Into<String>, statement: &Statement) -> Self {
        SessionError::Execution {
            message: message.into(),
            statement: statement.text.clone(),
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// One result set: column descriptions, row data, rows affected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub rows_affected: u64,
}

impl ResultSet {
    /// A result with no rows, only an affected count.
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at `(row, column_name)`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }

    pub fn first_row(&self) -> Option<&[Value]> {
        self.rows.first().map(|r| r.as_slice())
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// What a driver can do, carried alongside its sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCapabilities {
    pub dialect: Dialect,
    pub supports_returning: bool,
    pub supports_select_for_update: bool,
    pub supports_skip_locked: bool,
    pub supports_listen_notify: bool,
    pub supports_transactional_ddl: bool,
}

impl DriverCapabilities {
    /// Derive the default capability record from a dialect; drivers
    /// override fields where their support differs.
    pub fn for_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            supports_returning: dialect.supports_returning(),
            supports_select_for_update: dialect.supports_select_for_update(),
            supports_skip_locked: dialect.supports_skip_locked(),
            supports_listen_notify: dialect.supports_listen_notify(),
            supports_transactional_ddl: dialect.supports_transactional_ddl(),
        }
    }
}

// ============================================================================
// Session traits
// ============================================================================

/// A live database session.
#[async_trait]
pub trait Session: Send {
    /// Execute a prepared statement.
    async fn execute(&mut self, statement: &Statement) -> SessionResult<ResultSet>;

    async fn commit(&mut self) -> SessionResult<()>;

    async fn rollback(&mut self) -> SessionResult<()>;

    async fn close(&mut self) -> SessionResult<()>;
}

/// A notification delivered by the engine's native pub/sub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: String,
    pub payload: String,
}

/// A dedicated subscribing connection.
///
/// Owned exclusively by one backend instance; concurrent dequeues
/// serialize on it. `close` is idempotent.
#[async_trait]
pub trait NotificationListener: Send {
    /// Subscribe to a channel. Idempotent per channel.
    async fn listen(&mut self, channel: &str) -> SessionResult<()>;

    /// Wait up to `timeout` for a notification; `None` on timeout.
    async fn recv(&mut self, timeout: Duration) -> SessionResult<Option<Notification>>;

    async fn close(&mut self) -> SessionResult<()>;
}

/// Hands out sessions and advertises capabilities.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: Session;

    async fn acquire(&self) -> SessionResult<Self::Session>;

    fn capabilities(&self) -> DriverCapabilities;

    /// Open a dedicated subscribing connection. Engines without native
    /// pub/sub keep the default.
    async fn listener(&self) -> SessionResult<Box<dyn NotificationListener>> {
        Err(SessionError::ListenUnsupported)
    }
}

// ============================================================================
// Schema decoding
// ============================================================================

/// Decodes one row into a caller-defined representation. The core
/// treats decoding as opaque and never depends on it for correctness.
pub trait SchemaDecoder: Send + Sync {
    fn decode(&self, columns: &[String], row: &[Value]) -> serde_json::Value;
}

/// An optional schema decoder, with "absent" as a first-class variant
/// rather than a sniffable null.
#[derive(Clone, Default)]
pub enum DecoderHook {
    #[default]
    Absent,
    Decoder(Arc<dyn SchemaDecoder>),
}

impl DecoderHook {
    pub fn is_absent(&self) -> bool {
        matches!(self, DecoderHook::Absent)
    }

    /// Decode a row when a decoder is installed.
    pub fn decode(&self, columns: &[String], row: &[Value]) -> Option<serde_json::Value> {
        match self {
            DecoderHook::Absent => None,
            DecoderHook::Decoder(decoder) => Some(decoder.decode(columns, row)),
        }
    }
}

impl std::fmt::Debug for DecoderHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoderHook::Absent => write!(f, "DecoderHook::Absent"),
            DecoderHook::Decoder(_) => write!(f, "DecoderHook::Decoder(..)"),
        }
    }
}
