//! # sqlbridge
//!
//! A dialect-aware SQL statement pipeline, fluent query builder, and
//! event channel core.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Input (raw SQL │ builder │ built statement)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [pipeline]
//! ┌─────────────────────────────────────────────────────────┐
//! │   parse validation · placeholder inventory · filters     │
//! │   parameter binding · style rewrite · dialect render     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │        Statement { text, parameters, dialect }           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [session contract]
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Driver                              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The builder layer ([`builder`]) assembles typed ASTs ([`sql`]) with
//! implicit parameter capture; the pipeline ([`pipeline`]) turns any
//! input into an executable statement. The event channel ([`events`])
//! is orthogonal: native, durable, and hybrid delivery over the same
//! session contract ([`session`]).

pub mod builder;
pub mod config;
pub mod error;
pub mod events;
pub mod filters;
pub mod pipeline;
pub mod session;
pub mod sql;
pub mod value;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::builder::{
        BuildError, BuiltStatement, CaseBuilder, DdlBuilder, DeleteBuilder, InsertBuilder,
        MergeBuilder, ParamBag, SelectBuilder, UpdateBuilder,
    };
    pub use crate::error::ErrorKind;
    pub use crate::events::{
        AckDecision, EventBackend, EventChannel, EventMessage, JsonMap, QueueConfig,
        TableEventQueue,
    };
    pub use crate::filters::{
        BeforeAfter, CollectionFilter, LimitOffset, NotInCollectionFilter, NotInSearchFilter,
        OnBeforeAfter, OrderBy, SearchFilter, StatementFilter,
    };
    pub use crate::pipeline::{
        Parameters, ParamsArg, PipelineError, PipelineInput, PrepareArg, Statement, StatementKind,
        StatementPipeline,
    };
    pub use crate::session::{
        DriverCapabilities, NotificationListener, ResultSet, Session, SessionProvider,
    };
    pub use crate::sql::{
        col, lit_bool, lit_float, lit_int, lit_null, lit_str, param, table_col, Dialect, Expr,
        ExprExt, OrderByExpr, ParamStyle, Query, SortDir, TableRef,
    };
    pub use crate::value::Value;
}
