//! DML (Data Manipulation Language) AST.
//!
//! INSERT, UPDATE, DELETE, and MERGE roots with token rendering across
//! dialects. Shape validation (column/value arity, MERGE clause rules)
//! lives in the builder layer; these types render whatever they hold.

use super::dialect::{Dialect, SqlDialect};
use super::expr::Expr;
use super::query::{emit_with_clause, Cte, Query};
use super::token::{Token, TokenStream};

// ============================================================================
// INSERT
// ============================================================================

/// INSERT statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DML statements have no effect until rendered"]
pub struct Insert {
    pub with: Vec<Cte>,
    pub schema: Option<String>,
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Expr>>,
    pub from_query: Option<Box<Query>>,
    pub on_conflict: Option<OnConflict>,
    pub returning: Vec<Expr>,
}

impl Insert {
    /// Create a new INSERT statement.
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            with: Vec::new(),
            schema: None,
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
            from_query: None,
            on_conflict: None,
            returning: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = cols.into_iter().map(|c| c.into()).collect();
        self
    }

    /// Add a row of values.
    pub fn values(mut self, vals: impl IntoIterator<Item = impl Into<Expr>>) -> Self {
        self.values
            .push(vals.into_iter().map(|v| v.into()).collect());
        self
    }

    /// Add multiple rows of values.
    pub fn values_many(mut self, rows: impl IntoIterator<Item = Vec<Expr>>) -> Self {
        self.values.extend(rows);
        self
    }

    /// Insert from a SELECT query.
    pub fn from_select(mut self, query: Query) -> Self {
        self.from_query = Some(Box::new(query));
        self
    }

    /// Add an ON CONFLICT clause.
    pub fn on_conflict(mut self, conflict: OnConflict) -> Self {
        self.on_conflict = Some(conflict);
        self
    }

    /// Add a RETURNING clause.
    pub fn returning(mut self, exprs: impl IntoIterator<Item = impl Into<Expr>>) -> Self {
        self.returning = exprs.into_iter().map(|e| e.into()).collect();
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        emit_with_clause(&mut ts, &self.with, dialect);
        ts.push(Token::Insert).space().push(Token::Into).space();

        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.table.clone(),
        });

        if !self.columns.is_empty() {
            ts.space().lparen();
            for (i, col) in self.columns.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.push(Token::Ident(col.clone()));
            }
            ts.rparen();
        }

        if let Some(ref query) = self.from_query {
            ts.space().append(&query.to_tokens_for_dialect(dialect));
        } else if !self.values.is_empty() {
            ts.space().push(Token::Values);
            for (row_idx, row) in self.values.iter().enumerate() {
                if row_idx > 0 {
                    ts.comma();
                }
                ts.space().lparen();
                for (i, val) in row.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&val.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }
        }

        if let Some(ref conflict) = self.on_conflict {
            if dialect.supports_on_conflict() {
                ts.space().append(&conflict.to_tokens(dialect));
            }
        }

        if !self.returning.is_empty() && dialect.supports_returning() {
            emit_returning(&mut ts, &self.returning, dialect);
        }

        ts
    }
}

/// ON CONFLICT clause for INSERT.
#[derive(Debug, Clone, PartialEq)]
pub enum OnConflict {
    DoNothing,
    DoUpdate {
        conflict_columns: Vec<String>,
        set: Vec<(String, Expr)>,
    },
}

impl OnConflict {
    /// ON CONFLICT DO NOTHING.
    pub fn do_nothing() -> Self {
        OnConflict::DoNothing
    }

    /// ON CONFLICT (columns) DO UPDATE SET ...
    pub fn do_update(
        conflict_columns: impl IntoIterator<Item = impl Into<String>>,
        set: impl IntoIterator<Item = (impl Into<String>, Expr)>,
    ) -> Self {
        OnConflict::DoUpdate {
            conflict_columns: conflict_columns.into_iter().map(|c| c.into()).collect(),
            set: set.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            OnConflict::DoNothing => {
                ts.push(Token::On)
                    .space()
                    .push(Token::Conflict)
                    .space()
                    .push(Token::Do)
                    .space()
                    .push(Token::Nothing);
            }
            OnConflict::DoUpdate {
                conflict_columns,
                set,
            } => {
                ts.push(Token::On)
                    .space()
                    .push(Token::Conflict)
                    .space()
                    .lparen();
                for (i, col) in conflict_columns.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.push(Token::Ident(col.clone()));
                }
                ts.rparen()
                    .space()
                    .push(Token::Do)
                    .space()
                    .push(Token::Update)
                    .space()
                    .push(Token::Set)
                    .space();
                for (i, (col, expr)) in set.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.push(Token::Ident(col.clone()))
                        .space()
                        .push(Token::Eq)
                        .space()
                        .append(&expr.to_tokens_for_dialect(dialect));
                }
            }
        }

        ts
    }
}

// ============================================================================
// UPDATE
// ============================================================================

/// UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DML statements have no effect until rendered"]
pub struct Update {
    pub with: Vec<Cte>,
    pub schema: Option<String>,
    pub table: String,
    pub set: Vec<(String, Expr)>,
    pub filter: Option<Expr>,
    pub returning: Vec<Expr>,
}

impl Update {
    /// Create a new UPDATE statement.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            with: Vec::new(),
            schema: None,
            table: table.into(),
            set: Vec::new(),
            filter: None,
            returning: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set a column to a value.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.set.push((column.into(), value.into()));
        self
    }

    /// Set multiple columns.
    pub fn set_many(
        mut self,
        assignments: impl IntoIterator<Item = (impl Into<String>, impl Into<Expr>)>,
    ) -> Self {
        self.set
            .extend(assignments.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => Expr::BinaryOp {
                left: Box::new(existing),
                op: super::expr::BinaryOperator::And,
                right: Box::new(expr),
            },
            None => expr,
        });
        self
    }

    /// Add a RETURNING clause.
    pub fn returning(mut self, exprs: impl IntoIterator<Item = impl Into<Expr>>) -> Self {
        self.returning = exprs.into_iter().map(|e| e.into()).collect();
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        emit_with_clause(&mut ts, &self.with, dialect);
        ts.push(Token::Update).space();
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.table.clone(),
        });

        ts.space().push(Token::Set).space();
        for (i, (col, expr)) in self.set.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(col.clone()))
                .space()
                .push(Token::Eq)
                .space()
                .append(&expr.to_tokens_for_dialect(dialect));
        }

        if let Some(ref filter) = self.filter {
            ts.space()
                .push(Token::Where)
                .space()
                .append(&filter.to_tokens_for_dialect(dialect));
        }

        if !self.returning.is_empty() && dialect.supports_returning() {
            emit_returning(&mut ts, &self.returning, dialect);
        }

        ts
    }
}

// ============================================================================
// DELETE
// ============================================================================

/// DELETE statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DML statements have no effect until rendered"]
pub struct Delete {
    pub with: Vec<Cte>,
    pub schema: Option<String>,
    pub table: String,
    pub using: Vec<String>,
    pub filter: Option<Expr>,
    pub returning: Vec<Expr>,
}

impl Delete {
    /// Create a new DELETE statement.
    pub fn from(table: impl Into<String>) -> Self {
        Self {
            with: Vec::new(),
            schema: None,
            table: table.into(),
            using: Vec::new(),
            filter: None,
            returning: Vec::new(),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Add a USING table.
    pub fn using(mut self, table: impl Into<String>) -> Self {
        self.using.push(table.into());
        self
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => Expr::BinaryOp {
                left: Box::new(existing),
                op: super::expr::BinaryOperator::And,
                right: Box::new(expr),
            },
            None => expr,
        });
        self
    }

    /// Add a RETURNING clause.
    pub fn returning(mut self, exprs: impl IntoIterator<Item = impl Into<Expr>>) -> Self {
        self.returning = exprs.into_iter().map(|e| e.into()).collect();
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        emit_with_clause(&mut ts, &self.with, dialect);
        ts.push(Token::Delete).space().push(Token::From).space();
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.table.clone(),
        });

        if !self.using.is_empty() {
            ts.space().push(Token::Using).space();
            for (i, table) in self.using.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.push(Token::Ident(table.clone()));
            }
        }

        if let Some(ref filter) = self.filter {
            ts.space()
                .push(Token::Where)
                .space()
                .append(&filter.to_tokens_for_dialect(dialect));
        }

        if !self.returning.is_empty() && dialect.supports_returning() {
            emit_returning(&mut ts, &self.returning, dialect);
        }

        ts
    }
}

// ============================================================================
// MERGE
// ============================================================================

/// MERGE statement.
///
/// Only emitted for dialects with native MERGE; builders targeting
/// other engines should use [`Insert::on_conflict`] instead.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DML statements have no effect until rendered"]
pub struct Merge {
    pub with: Vec<Cte>,
    pub target_schema: Option<String>,
    pub target_table: String,
    pub target_alias: Option<String>,
    pub source: MergeSource,
    pub source_alias: Option<String>,
    pub on_condition: Option<Expr>,
    pub when_clauses: Vec<WhenClause>,
}

/// Source for a MERGE statement - a table or a subquery.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeSource {
    Table {
        schema: Option<String>,
        name: String,
    },
    Query(Box<Query>),
}

/// A WHEN clause in a MERGE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    /// true = WHEN MATCHED, false = WHEN NOT MATCHED
    pub matched: bool,
    /// Optional additional condition (AND ...)
    pub condition: Option<Expr>,
    pub action: MergeAction,
}

/// Action to take in a WHEN clause.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeAction {
    Update { assignments: Vec<(String, Expr)> },
    Delete,
    Insert {
        columns: Vec<String>,
        values: Vec<Expr>,
    },
}

impl Merge {
    /// Create a new MERGE statement targeting a table.
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            with: Vec::new(),
            target_schema: None,
            target_table: table.into(),
            target_alias: None,
            source: MergeSource::Table {
                schema: None,
                name: String::new(),
            },
            source_alias: None,
            on_condition: None,
            when_clauses: Vec::new(),
        }
    }

    pub fn target_schema(mut self, schema: impl Into<String>) -> Self {
        self.target_schema = Some(schema.into());
        self
    }

    pub fn target_alias(mut self, alias: impl Into<String>) -> Self {
        self.target_alias = Some(alias.into());
        self
    }

    /// Set the source to a table.
    pub fn using_table(mut self, table: impl Into<String>) -> Self {
        self.source = MergeSource::Table {
            schema: None,
            name: table.into(),
        };
        self
    }

    /// Set the source to a subquery.
    pub fn using_query(mut self, query: Query) -> Self {
        self.source = MergeSource::Query(Box::new(query));
        self
    }

    pub fn source_alias(mut self, alias: impl Into<String>) -> Self {
        self.source_alias = Some(alias.into());
        self
    }

    /// Set the ON condition.
    pub fn on(mut self, condition: Expr) -> Self {
        self.on_condition = Some(condition);
        self
    }

    /// Add a WHEN clause.
    pub fn when(mut self, clause: WhenClause) -> Self {
        self.when_clauses.push(clause);
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        emit_with_clause(&mut ts, &self.with, dialect);
        ts.push(Token::Merge).space().push(Token::Into).space();

        ts.push(Token::QualifiedIdent {
            schema: self.target_schema.clone(),
            name: self.target_table.clone(),
        });

        if let Some(ref alias) = self.target_alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }

        ts.space().push(Token::Using).space();

        match &self.source {
            MergeSource::Table { schema, name } => {
                ts.push(Token::QualifiedIdent {
                    schema: schema.clone(),
                    name: name.clone(),
                });
            }
            MergeSource::Query(query) => {
                ts.lparen()
                    .append(&query.to_tokens_for_dialect(dialect))
                    .rparen();
            }
        }

        if let Some(ref alias) = self.source_alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }

        if let Some(ref on) = self.on_condition {
            ts.space()
                .push(Token::On)
                .space()
                .append(&on.to_tokens_for_dialect(dialect));
        }

        for clause in &self.when_clauses {
            ts.space().append(&clause.to_tokens(dialect));
        }

        ts
    }
}

impl WhenClause {
    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::When).space();
        if !self.matched {
            ts.push(Token::Not).space();
        }
        ts.push(Token::Matched);

        if let Some(ref cond) = self.condition {
            ts.space()
                .push(Token::And)
                .space()
                .append(&cond.to_tokens_for_dialect(dialect));
        }

        ts.space().push(Token::Then).space();

        match &self.action {
            MergeAction::Update { assignments } => {
                ts.push(Token::Update).space().push(Token::Set).space();
                for (i, (col, expr)) in assignments.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.push(Token::Ident(col.clone()))
                        .space()
                        .push(Token::Eq)
                        .space()
                        .append(&expr.to_tokens_for_dialect(dialect));
                }
            }
            MergeAction::Delete => {
                ts.push(Token::Delete);
            }
            MergeAction::Insert { columns, values } => {
                ts.push(Token::Insert);
                if columns.is_empty() && values.is_empty() {
                    ts.space().push(Token::Raw("DEFAULT VALUES".into()));
                    return ts;
                }
                if !columns.is_empty() {
                    ts.space().lparen();
                    for (i, col) in columns.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.push(Token::Ident(col.clone()));
                    }
                    ts.rparen();
                }
                ts.space().push(Token::Values).space().lparen();
                for (i, val) in values.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&val.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }
        }

        ts
    }
}

fn emit_returning(ts: &mut TokenStream, exprs: &[Expr], dialect: Dialect) {
    ts.space().push(Token::Returning).space();
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        ts.append(&expr.to_tokens_for_dialect(dialect));
    }
}
