//! DDL (Data Definition Language) AST.
//!
//! CREATE TABLE AS SELECT, CREATE INDEX, CREATE SCHEMA, DROP, and
//! TRUNCATE roots. Options a dialect lacks (CASCADE, RESTART IDENTITY,
//! index methods) are dropped at render time.

use super::dialect::{Dialect, SqlDialect};
use super::expr::Expr;
use super::query::Query;
use super::token::{Token, TokenStream};

/// DDL statement types.
#[derive(Debug, Clone, PartialEq)]
pub enum DdlStatement {
    CreateTableAs(CreateTableAs),
    CreateIndex(CreateIndex),
    CreateSchema(CreateSchema),
    Drop(DropObject),
    Truncate(Truncate),
}

impl DdlStatement {
    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        match self {
            DdlStatement::CreateTableAs(c) => c.to_tokens(dialect),
            DdlStatement::CreateIndex(c) => c.to_tokens(dialect),
            DdlStatement::CreateSchema(c) => c.to_tokens(dialect),
            DdlStatement::Drop(d) => d.to_tokens(dialect),
            DdlStatement::Truncate(t) => t.to_tokens(dialect),
        }
    }
}

// ============================================================================
// CREATE TABLE AS SELECT
// ============================================================================

/// CREATE TABLE ... AS SELECT statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DDL statements have no effect until rendered"]
pub struct CreateTableAs {
    pub if_not_exists: bool,
    pub schema: Option<String>,
    pub name: String,
    pub query: Box<Query>,
}

impl CreateTableAs {
    pub fn new(name: impl Into<String>, query: Query) -> Self {
        Self {
            if_not_exists: false,
            schema: None,
            name: name.into(),
            query: Box::new(query),
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Create).space().push(Token::Table).space();
        if self.if_not_exists {
            emit_if_not_exists(&mut ts);
        }
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.name.clone(),
        });
        ts.space().push(Token::As).space();
        ts.append(&self.query.to_tokens_for_dialect(dialect));

        ts
    }
}

// ============================================================================
// CREATE INDEX
// ============================================================================

/// CREATE [UNIQUE] INDEX statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DDL statements have no effect until rendered"]
pub struct CreateIndex {
    pub unique: bool,
    pub if_not_exists: bool,
    pub name: String,
    pub schema: Option<String>,
    pub table: String,
    pub columns: Vec<String>,
    /// Index access method (`USING gin` etc., engines that support it).
    pub method: Option<String>,
    /// Partial index predicate (engines that support it).
    pub where_clause: Option<Expr>,
}

impl CreateIndex {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            unique: false,
            if_not_exists: false,
            name: name.into(),
            schema: None,
            table: table.into(),
            columns: Vec::new(),
            method: None,
            where_clause: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = cols.into_iter().map(|c| c.into()).collect();
        self
    }

    pub fn using(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.where_clause = Some(predicate);
        self
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Create).space();
        if self.unique {
            ts.push(Token::Unique).space();
        }
        ts.push(Token::Index).space();
        if self.if_not_exists {
            emit_if_not_exists(&mut ts);
        }
        ts.push(Token::Ident(self.name.clone()));
        ts.space().push(Token::On).space();
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.table.clone(),
        });

        if let Some(ref method) = self.method {
            if dialect.supports_index_method() {
                ts.space()
                    .push(Token::Using)
                    .space()
                    .push(Token::Raw(method.clone()));
            }
        }

        ts.space().lparen();
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::Ident(col.clone()));
        }
        ts.rparen();

        if let Some(ref predicate) = self.where_clause {
            if dialect.supports_partial_indexes() {
                ts.space()
                    .push(Token::Where)
                    .space()
                    .append(&predicate.to_tokens_for_dialect(dialect));
            }
        }

        ts
    }
}

// ============================================================================
// CREATE SCHEMA
// ============================================================================

/// CREATE SCHEMA statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DDL statements have no effect until rendered"]
pub struct CreateSchema {
    pub if_not_exists: bool,
    pub name: String,
    pub authorization: Option<String>,
}

impl CreateSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            if_not_exists: false,
            name: name.into(),
            authorization: None,
        }
    }

    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    pub fn authorization(mut self, user: impl Into<String>) -> Self {
        self.authorization = Some(user.into());
        self
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Create).space().push(Token::Schema).space();
        if self.if_not_exists {
            emit_if_not_exists(&mut ts);
        }
        ts.push(Token::Ident(self.name.clone()));

        if let Some(ref user) = self.authorization {
            if dialect.supports_create_schema_authorization() {
                ts.space()
                    .push(Token::Authorization)
                    .space()
                    .push(Token::Ident(user.clone()));
            }
        }

        ts
    }
}

// ============================================================================
// DROP
// ============================================================================

/// Object kinds DROP can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    Table,
    Index,
    View,
    Schema,
}

/// CASCADE/RESTRICT behavior for DROP and TRUNCATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropBehavior {
    Cascade,
    Restrict,
}

/// DROP statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DDL statements have no effect until rendered"]
pub struct DropObject {
    pub kind: DropKind,
    pub if_exists: bool,
    pub schema: Option<String>,
    pub name: String,
    pub behavior: Option<DropBehavior>,
}

impl DropObject {
    pub fn table(name: impl Into<String>) -> Self {
        Self::new(DropKind::Table, name)
    }

    pub fn index(name: impl Into<String>) -> Self {
        Self::new(DropKind::Index, name)
    }

    pub fn view(name: impl Into<String>) -> Self {
        Self::new(DropKind::View, name)
    }

    pub fn schema_object(name: impl Into<String>) -> Self {
        Self::new(DropKind::Schema, name)
    }

    fn new(kind: DropKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            if_exists: false,
            schema: None,
            name: name.into(),
            behavior: None,
        }
    }

    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn cascade(mut self) -> Self {
        self.behavior = Some(DropBehavior::Cascade);
        self
    }

    pub fn restrict(mut self) -> Self {
        self.behavior = Some(DropBehavior::Restrict);
        self
    }

    pub fn to_tokens(&self, _dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Drop).space();
        ts.push(match self.kind {
            DropKind::Table => Token::Table,
            DropKind::Index => Token::Index,
            DropKind::View => Token::View,
            DropKind::Schema => Token::Schema,
        });
        ts.space();
        if self.if_exists {
            ts.push(Token::If).space().push(Token::Exists).space();
        }
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.name.clone(),
        });

        if let Some(behavior) = self.behavior {
            ts.space().push(match behavior {
                DropBehavior::Cascade => Token::Cascade,
                DropBehavior::Restrict => Token::Restrict,
            });
        }

        ts
    }
}

// ============================================================================
// TRUNCATE
// ============================================================================

/// Identity sequence handling for TRUNCATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityOption {
    Restart,
    Continue,
}

/// TRUNCATE TABLE statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DDL statements have no effect until rendered"]
pub struct Truncate {
    pub schema: Option<String>,
    pub table: String,
    pub identity: Option<IdentityOption>,
    pub behavior: Option<DropBehavior>,
}

impl Truncate {
    pub fn table(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: name.into(),
            identity: None,
            behavior: None,
        }
    }

    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn restart_identity(mut self) -> Self {
        self.identity = Some(IdentityOption::Restart);
        self
    }

    pub fn continue_identity(mut self) -> Self {
        self.identity = Some(IdentityOption::Continue);
        self
    }

    pub fn cascade(mut self) -> Self {
        self.behavior = Some(DropBehavior::Cascade);
        self
    }

    pub fn restrict(mut self) -> Self {
        self.behavior = Some(DropBehavior::Restrict);
        self
    }

    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Truncate).space().push(Token::Table).space();
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.table.clone(),
        });

        if let Some(identity) = self.identity {
            if dialect.supports_restart_identity() {
                ts.space().push(match identity {
                    IdentityOption::Restart => Token::Restart,
                    IdentityOption::Continue => Token::Continue,
                });
                ts.space().push(Token::Identity);
            }
        }

        if let Some(behavior) = self.behavior {
            if dialect.supports_truncate_cascade() {
                ts.space().push(match behavior {
                    DropBehavior::Cascade => Token::Cascade,
                    DropBehavior::Restrict => Token::Restrict,
                });
            }
        }

        ts
    }
}

fn emit_if_not_exists(ts: &mut TokenStream) {
    ts.push(Token::If)
        .space()
        .push(Token::Not)
        .space()
        .push(Token::Exists)
        .space();
}
