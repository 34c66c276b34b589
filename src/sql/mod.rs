//! SQL generation engine.
//!
//! A typed, dialect-aware AST with token-stream rendering:
//!
//! - [`expr`] - Expression AST and builder DSL
//! - [`query`] - SELECT query AST
//! - [`dml`] - INSERT, UPDATE, DELETE, MERGE
//! - [`ddl`] - CREATE TABLE AS, CREATE INDEX, CREATE SCHEMA, DROP, TRUNCATE
//! - [`token`] - Token types for SQL rendering
//! - [`dialect`] - SQL dialect implementations and parameter styles
//! - [`optimize`] - Pure AST transform passes

pub mod ddl;
pub mod dialect;
pub mod dml;
pub mod expr;
pub mod optimize;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use dialect::{Dialect, ParamStyle, SqlDialect};
pub use expr::{
    avg, coalesce, col, count, count_distinct, count_star, func, lit_bool, lit_float, lit_int,
    lit_null, lit_str, max, min, param, raw_sql, row_number, star, sum, table_col, table_star,
    BinaryOperator, Expr, ExprExt, Literal, UnaryOperator, WindowBuilder, WindowError, WindowExt,
    WindowFrame, WindowOrderBy,
};
pub use query::{
    Cte, CteBody, FromItem, Join, JoinType, LimitOffset, LockClause, NullsOrder, OrderByExpr,
    Query, SelectExpr, SetOpType, SetOperation, SortDir, TableRef,
};
pub use token::{Token, TokenStream};

pub use ddl::{
    CreateIndex, CreateSchema, CreateTableAs, DdlStatement, DropBehavior, DropKind, DropObject,
    IdentityOption, Truncate,
};
pub use dml::{Delete, Insert, Merge, MergeAction, MergeSource, OnConflict, Update, WhenClause};
pub use optimize::{OptimizeFlags, OptimizerPass};

/// A complete statement AST of any kind.
///
/// This is what builders hand to the statement pipeline and what
/// filters rewrite.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlAst {
    Select(Query),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Merge(Merge),
    Ddl(DdlStatement),
}

impl SqlAst {
    /// Render to a token stream.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        match self {
            SqlAst::Select(q) => q.to_tokens_for_dialect(dialect),
            SqlAst::Insert(i) => i.to_tokens(dialect),
            SqlAst::Update(u) => u.to_tokens(dialect),
            SqlAst::Delete(d) => d.to_tokens(dialect),
            SqlAst::Merge(m) => m.to_tokens(dialect),
            SqlAst::Ddl(d) => d.to_tokens(dialect),
        }
    }

    /// Render to SQL text.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    /// Whether the top-level statement carries a RETURNING projection.
    pub fn has_returning(&self) -> bool {
        match self {
            SqlAst::Insert(i) => !i.returning.is_empty(),
            SqlAst::Update(u) => !u.returning.is_empty(),
            SqlAst::Delete(d) => !d.returning.is_empty(),
            SqlAst::Select(_) | SqlAst::Merge(_) | SqlAst::Ddl(_) => false,
        }
    }
}
