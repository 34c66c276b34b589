//! SELECT query AST with a fluent construction API.

use super::dialect::{Dialect, SqlDialect};
use super::expr::{Expr, ExprExt};
use super::token::{Token, TokenStream};

// =============================================================================
// Select Expression (column with optional alias)
// =============================================================================

/// A SELECT list item: expression with optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

// =============================================================================
// Table Reference and FROM items
// =============================================================================

/// A table reference with optional schema and alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct TableRef {
    pub schema: Option<String>,
    pub table: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(table: &str) -> Self {
        Self {
            schema: None,
            table: table.into(),
            alias: None,
        }
    }

    pub fn with_schema(mut self, schema: &str) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::QualifiedIdent {
            schema: self.schema.clone(),
            name: self.table.clone(),
        });
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        TableRef::new(name)
    }
}

/// A FROM clause item: a table or a derived table (subquery).
#[derive(Debug, Clone, PartialEq)]
pub enum FromItem {
    Table(TableRef),
    Subquery { query: Box<Query>, alias: String },
}

impl FromItem {
    /// Derived table with an alias.
    pub fn subquery(query: Query, alias: &str) -> Self {
        FromItem::Subquery {
            query: Box::new(query),
            alias: alias.into(),
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            FromItem::Table(table) => {
                ts.append(&table.to_tokens());
            }
            FromItem::Subquery { query, alias } => {
                ts.lparen()
                    .append(&query.to_tokens_for_dialect(dialect))
                    .rparen()
                    .space()
                    .push(Token::As)
                    .space()
                    .push(Token::Ident(alias.clone()));
            }
        }
        ts
    }
}

impl From<TableRef> for FromItem {
    fn from(table: TableRef) -> Self {
        FromItem::Table(table)
    }
}

impl From<&str> for FromItem {
    fn from(name: &str) -> Self {
        FromItem::Table(TableRef::new(name))
    }
}

// =============================================================================
// Joins
// =============================================================================

/// Type of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on: Option<Expr>,
}

impl Join {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self.join_type {
            JoinType::Inner => ts.push(Token::Inner),
            JoinType::Left => ts.push(Token::Left),
            JoinType::Right => ts.push(Token::Right),
            JoinType::Full => ts.push(Token::Full).space().push(Token::Outer),
            JoinType::Cross => ts.push(Token::Cross),
        };

        ts.space().push(Token::Join).space();
        ts.append(&self.table.to_tokens());

        if let Some(on) = &self.on {
            ts.space().push(Token::On).space();
            ts.append(&on.to_tokens_for_dialect(dialect));
        }

        ts
    }
}

// =============================================================================
// ORDER BY
// =============================================================================

pub use super::expr::{NullsOrder, SortDir};

/// An ORDER BY expression.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct OrderByExpr {
    pub expr: Expr,
    pub dir: Option<SortDir>,
    pub nulls: Option<NullsOrder>,
}

impl OrderByExpr {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            dir: None,
            nulls: None,
        }
    }

    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Asc),
            nulls: None,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            dir: Some(SortDir::Desc),
            nulls: None,
        }
    }

    pub fn nulls_first(mut self) -> Self {
        self.nulls = Some(NullsOrder::First);
        self
    }

    pub fn nulls_last(mut self) -> Self {
        self.nulls = Some(NullsOrder::Last);
        self
    }

    /// Convert to tokens for a specific dialect.
    ///
    /// NULLS FIRST/LAST is skipped for dialects that lack it.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);

        if let Some(dir) = &self.dir {
            ts.space().push(match dir {
                SortDir::Asc => Token::Asc,
                SortDir::Desc => Token::Desc,
            });
        }

        if let Some(nulls) = &self.nulls {
            if dialect.supports_nulls_ordering() {
                ts.space().push(match nulls {
                    NullsOrder::First => Token::NullsFirst,
                    NullsOrder::Last => Token::NullsLast,
                });
            }
        }

        ts
    }
}

// =============================================================================
// LIMIT / OFFSET
// =============================================================================

/// LIMIT and OFFSET clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitOffset {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl LimitOffset {
    /// Convert to tokens using dialect-specific pagination.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        dialect.emit_limit_offset(self.limit, self.offset)
    }
}

// =============================================================================
// Row Locking
// =============================================================================

/// FOR UPDATE [SKIP LOCKED] clause.
///
/// Emitted only when the dialect supports SELECT ... FOR UPDATE;
/// SKIP LOCKED additionally requires dialect support. Callers that need
/// the exclusion guarantee on other engines fall back to a
/// compare-and-swap update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockClause {
    pub for_update: bool,
    pub skip_locked: bool,
}

impl LockClause {
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        if self.for_update && dialect.supports_select_for_update() {
            ts.push(Token::For).space().push(Token::Update);
            if self.skip_locked && dialect.supports_skip_locked() {
                ts.space().push(Token::Skip).space().push(Token::Locked);
            }
        }
        ts
    }
}

// =============================================================================
// Set Operations (UNION, INTERSECT, EXCEPT)
// =============================================================================

/// Type of set operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOpType {
    Union,
    Intersect,
    Except,
}

/// A set operation combining two queries.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "SetOperation has no effect until rendered"]
pub struct SetOperation {
    pub left: Box<Query>,
    pub op: SetOpType,
    pub all: bool,
    pub right: Box<Query>,
}

impl SetOperation {
    pub fn new(left: Query, op: SetOpType, all: bool, right: Query) -> Self {
        Self {
            left: Box::new(left),
            op,
            all,
            right: Box::new(right),
        }
    }

    /// Chain another set operation (this becomes the left side).
    pub fn chain(self, op: SetOpType, all: bool, right: Query) -> Self {
        let left_query = Query {
            set_op: Some(Box::new(self)),
            ..Default::default()
        };
        Self::new(left_query, op, all, right)
    }

    /// Wrap into a [`Query`] container so further clauses can apply.
    pub fn into_query(self) -> Query {
        Query {
            set_op: Some(Box::new(self)),
            ..Default::default()
        }
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        if self.left.set_op.is_some() {
            // Nested set operation, already grouped
            ts.append(&self.left.to_tokens_for_dialect(dialect));
        } else {
            ts.lparen();
            ts.append(&self.left.to_tokens_for_dialect(dialect));
            ts.rparen();
        }

        ts.newline();
        ts.push(match self.op {
            SetOpType::Union => Token::Union,
            SetOpType::Intersect => Token::Intersect,
            SetOpType::Except => Token::Except,
        });
        if self.all {
            ts.space().push(Token::All);
        }
        ts.newline();

        ts.lparen();
        ts.append(&self.right.to_tokens_for_dialect(dialect));
        ts.rparen();

        ts
    }
}

// =============================================================================
// CTE (Common Table Expression)
// =============================================================================

/// Body of a CTE: a structured query or trusted raw SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum CteBody {
    Query(Box<Query>),
    /// Pre-rendered SQL text, spliced verbatim. Not sanitized.
    Raw(String),
}

/// A Common Table Expression (WITH clause entry).
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Cte {
    pub name: String,
    pub columns: Option<Vec<String>>,
    pub body: CteBody,
    pub recursive: bool,
}

impl Cte {
    pub fn new(name: &str, query: Query) -> Self {
        Self {
            name: name.into(),
            columns: None,
            body: CteBody::Query(Box::new(query)),
            recursive: false,
        }
    }

    /// Create a recursive CTE.
    pub fn recursive(name: &str, query: Query) -> Self {
        Self {
            name: name.into(),
            columns: None,
            body: CteBody::Query(Box::new(query)),
            recursive: true,
        }
    }

    /// Create a CTE from already-rendered SQL text.
    pub fn raw(name: &str, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: None,
            body: CteBody::Raw(sql.into()),
            recursive: false,
        }
    }

    pub fn with_columns(mut self, columns: Vec<&str>) -> Self {
        self.columns = Some(columns.into_iter().map(String::from).collect());
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.name.clone()));

        if let Some(cols) = &self.columns {
            ts.space().lparen();
            for (i, col) in cols.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.push(Token::Ident(col.clone()));
            }
            ts.rparen();
        }

        ts.space().push(Token::As).space().lparen().newline();
        match &self.body {
            CteBody::Query(query) => {
                ts.append(&query.to_tokens_for_dialect(dialect));
            }
            CteBody::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }
        ts.newline().rparen();

        ts
    }
}

// =============================================================================
// Query
// =============================================================================

/// A SELECT query.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until rendered"]
pub struct Query {
    pub with: Vec<Cte>,
    pub select: Vec<SelectExpr>,
    pub distinct: bool,
    pub from: Option<FromItem>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub group_by_rollup: bool,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByExpr>,
    pub limit_offset: Option<LimitOffset>,
    pub locking: Option<LockClause>,
    /// Set operation (UNION, INTERSECT, EXCEPT) with another query.
    pub set_op: Option<Box<SetOperation>>,
}

impl Query {
    /// Create a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a CTE (WITH clause entry).
    pub fn with_cte(mut self, cte: Cte) -> Self {
        self.with.push(cte);
        self
    }

    /// Set the SELECT list.
    pub fn select(mut self, exprs: Vec<impl Into<SelectExpr>>) -> Self {
        self.select = exprs.into_iter().map(|e| e.into()).collect();
        self
    }

    /// Append to the SELECT list.
    pub fn select_also(mut self, expr: impl Into<SelectExpr>) -> Self {
        self.select.push(expr.into());
        self
    }

    /// SELECT *
    pub fn select_star(mut self) -> Self {
        self.select = vec![SelectExpr::new(super::expr::star())];
        self
    }

    /// Add DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Set the FROM item.
    pub fn from(mut self, item: impl Into<FromItem>) -> Self {
        self.from = Some(item.into());
        self
    }

    /// Add a JOIN.
    pub fn join(mut self, join_type: JoinType, table: TableRef, on: Expr) -> Self {
        self.joins.push(Join {
            join_type,
            table,
            on: Some(on),
        });
        self
    }

    /// Add an INNER JOIN.
    pub fn inner_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Inner, table, on)
    }

    /// Add a LEFT JOIN.
    pub fn left_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Left, table, on)
    }

    /// Add a RIGHT JOIN.
    pub fn right_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Right, table, on)
    }

    /// Add a FULL OUTER JOIN.
    pub fn full_join(self, table: TableRef, on: Expr) -> Self {
        self.join(JoinType::Full, table, on)
    }

    /// Add a CROSS JOIN.
    pub fn cross_join(mut self, table: TableRef) -> Self {
        self.joins.push(Join {
            join_type: JoinType::Cross,
            table,
            on: None,
        });
        self
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(match self.where_clause {
            Some(existing) => existing.and(condition),
            None => condition,
        });
        self
    }

    /// Set the GROUP BY clause.
    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.group_by = exprs;
        self
    }

    /// Wrap the GROUP BY list in ROLLUP (...).
    pub fn rollup(mut self) -> Self {
        self.group_by_rollup = true;
        self
    }

    /// Set the HAVING clause.
    pub fn having(mut self, condition: Expr) -> Self {
        self.having = Some(condition);
        self
    }

    /// Set the ORDER BY clause.
    pub fn order_by(mut self, exprs: Vec<OrderByExpr>) -> Self {
        self.order_by = exprs;
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_offset
            .get_or_insert_with(LimitOffset::default)
            .limit = Some(limit);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, offset: u64) -> Self {
        self.limit_offset
            .get_or_insert_with(LimitOffset::default)
            .offset = Some(offset);
        self
    }

    /// Add FOR UPDATE row locking.
    pub fn for_update(mut self) -> Self {
        self.locking.get_or_insert_with(LockClause::default).for_update = true;
        self
    }

    /// Add SKIP LOCKED to the locking clause.
    pub fn skip_locked(mut self) -> Self {
        let lock = self.locking.get_or_insert_with(LockClause::default);
        lock.for_update = true;
        lock.skip_locked = true;
        self
    }

    // =========================================================================
    // Set Operations
    // =========================================================================

    /// Combine with another query using UNION.
    pub fn union(self, other: Query) -> SetOperation {
        SetOperation::new(self, SetOpType::Union, false, other)
    }

    /// Combine with another query using UNION ALL.
    pub fn union_all(self, other: Query) -> SetOperation {
        SetOperation::new(self, SetOpType::Union, true, other)
    }

    /// Combine with another query using INTERSECT.
    pub fn intersect(self, other: Query) -> SetOperation {
        SetOperation::new(self, SetOpType::Intersect, false, other)
    }

    /// Combine with another query using EXCEPT.
    pub fn except(self, other: Query) -> SetOperation {
        SetOperation::new(self, SetOpType::Except, false, other)
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Convert to token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        // A container for a set operation renders the operation instead
        if let Some(ref set_op) = self.set_op {
            return set_op.to_tokens_for_dialect(dialect);
        }

        let mut ts = TokenStream::new();

        // WITH clause
        emit_with_clause(&mut ts, &self.with, dialect);

        // SELECT
        ts.push(Token::Select);
        if self.distinct {
            ts.space().push(Token::Distinct);
        }

        for (i, select_expr) in self.select.iter().enumerate() {
            if i == 0 {
                ts.newline().indent(1);
            } else {
                ts.comma().newline().indent(1);
            }
            ts.append(&select_expr.to_tokens_for_dialect(dialect));
        }

        // FROM
        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space();
            ts.append(&from.to_tokens_for_dialect(dialect));
        }

        // JOINs
        for join in &self.joins {
            ts.newline();
            ts.append(&join.to_tokens_for_dialect(dialect));
        }

        // WHERE
        if let Some(where_clause) = &self.where_clause {
            ts.newline().push(Token::Where).space();
            ts.append(&where_clause.to_tokens_for_dialect(dialect));
        }

        // GROUP BY [ROLLUP]
        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            if self.group_by_rollup {
                ts.push(Token::Rollup).space().lparen();
            }
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }
            if self.group_by_rollup {
                ts.rparen();
            }
        }

        // HAVING
        if let Some(having) = &self.having {
            ts.newline().push(Token::Having).space();
            ts.append(&having.to_tokens_for_dialect(dialect));
        }

        // ORDER BY
        if !self.order_by.is_empty() {
            ts.newline().push(Token::OrderBy).space();
            for (i, order_expr) in self.order_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&order_expr.to_tokens_for_dialect(dialect));
            }
        }

        // LIMIT / OFFSET
        if let Some(lo) = &self.limit_offset {
            ts.newline();
            ts.append(&lo.to_tokens(dialect));
        }

        // FOR UPDATE [SKIP LOCKED]
        if let Some(lock) = &self.locking {
            let lock_ts = lock.to_tokens_for_dialect(dialect);
            if lock_ts != TokenStream::new() {
                ts.newline();
                ts.append(&lock_ts);
            }
        }

        ts
    }

    /// Generate SQL for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }

    /// Rename every placeholder in this query, including CTE bodies,
    /// derived tables, set operations, and expression subqueries.
    pub fn map_placeholders(&mut self, f: &mut impl FnMut(&mut String)) {
        for cte in &mut self.with {
            if let CteBody::Query(query) = &mut cte.body {
                query.map_placeholders(f);
            }
        }
        for item in &mut self.select {
            item.expr.map_placeholders(f);
        }
        if let Some(FromItem::Subquery { query, .. }) = &mut self.from {
            query.map_placeholders(f);
        }
        for join in &mut self.joins {
            if let Some(on) = &mut join.on {
                on.map_placeholders(f);
            }
        }
        if let Some(w) = &mut self.where_clause {
            w.map_placeholders(f);
        }
        for g in &mut self.group_by {
            g.map_placeholders(f);
        }
        if let Some(h) = &mut self.having {
            h.map_placeholders(f);
        }
        for ob in &mut self.order_by {
            ob.expr.map_placeholders(f);
        }
        if let Some(set_op) = &mut self.set_op {
            set_op.left.map_placeholders(f);
            set_op.right.map_placeholders(f);
        }
    }

    /// Collect every table name this query references, including CTE
    /// bodies, joined tables, derived tables, set operations, and
    /// subqueries inside expressions. Used for CTE cycle detection.
    pub fn referenced_tables(&self, out: &mut Vec<String>) {
        for cte in &self.with {
            if let CteBody::Query(query) = &cte.body {
                query.referenced_tables(out);
            }
        }
        match &self.from {
            Some(FromItem::Table(t)) => out.push(t.table.clone()),
            Some(FromItem::Subquery { query, .. }) => query.referenced_tables(out),
            None => {}
        }
        for join in &self.joins {
            out.push(join.table.table.clone());
            if let Some(on) = &join.on {
                collect_tables_from_expr(on, out);
            }
        }
        if let Some(w) = &self.where_clause {
            collect_tables_from_expr(w, out);
        }
        if let Some(h) = &self.having {
            collect_tables_from_expr(h, out);
        }
        for s in &self.select {
            collect_tables_from_expr(&s.expr, out);
        }
        if let Some(set_op) = &self.set_op {
            set_op.left.referenced_tables(out);
            set_op.right.referenced_tables(out);
        }
    }
}

/// Emit a WITH list; shared between SELECT and DML roots.
pub(crate) fn emit_with_clause(ts: &mut TokenStream, with: &[Cte], dialect: Dialect) {
    if with.is_empty() {
        return;
    }
    ts.push(Token::With);

    let has_recursive = with.iter().any(|cte| cte.recursive);
    if has_recursive && dialect.emit_recursive_keyword() {
        ts.space().push(Token::Recursive);
    }

    ts.space();
    for (i, cte) in with.iter().enumerate() {
        if i > 0 {
            ts.comma().newline();
        }
        ts.append(&cte.to_tokens_for_dialect(dialect));
    }
    ts.newline();
}

fn collect_tables_from_expr(expr: &Expr, out: &mut Vec<String>) {
    match expr {
        Expr::Subquery(q) => q.referenced_tables(out),
        Expr::InSubquery { expr, subquery, .. } => {
            collect_tables_from_expr(expr, out);
            subquery.referenced_tables(out);
        }
        Expr::Exists { subquery, .. } => subquery.referenced_tables(out),
        Expr::BinaryOp { left, right, .. } => {
            collect_tables_from_expr(left, out);
            collect_tables_from_expr(right, out);
        }
        Expr::UnaryOp { expr, .. } | Expr::Paren(expr) => collect_tables_from_expr(expr, out),
        Expr::Function { args, .. } => {
            for arg in args {
                collect_tables_from_expr(arg, out);
            }
        }
        Expr::Case {
            operand,
            when_clauses,
            else_clause,
        } => {
            if let Some(op) = operand {
                collect_tables_from_expr(op, out);
            }
            for (w, t) in when_clauses {
                collect_tables_from_expr(w, out);
                collect_tables_from_expr(t, out);
            }
            if let Some(e) = else_clause {
                collect_tables_from_expr(e, out);
            }
        }
        Expr::In { expr, values, .. } => {
            collect_tables_from_expr(expr, out);
            for v in values {
                collect_tables_from_expr(v, out);
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_tables_from_expr(expr, out);
            collect_tables_from_expr(low, out);
            collect_tables_from_expr(high, out);
        }
        Expr::IsNull { expr, .. } => collect_tables_from_expr(expr, out),
        Expr::LikeEscape { expr, pattern, .. } => {
            collect_tables_from_expr(expr, out);
            collect_tables_from_expr(pattern, out);
        }
        Expr::WindowFunction {
            function,
            partition_by,
            order_by,
            ..
        } => {
            collect_tables_from_expr(function, out);
            for e in partition_by {
                collect_tables_from_expr(e, out);
            }
            for ob in order_by {
                collect_tables_from_expr(&ob.expr, out);
            }
        }
        Expr::Column { .. }
        | Expr::Literal(_)
        | Expr::Placeholder { .. }
        | Expr::Star { .. }
        | Expr::Raw(_) => {}
    }
}

impl std::fmt::Display for Query {
    /// Formats using the default dialect (Postgres). For
    /// dialect-specific SQL use [`Query::to_sql`].
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{col, count_star, lit_int, param, sum, table_col};

    #[test]
    fn test_simple_select() {
        let query = Query::new()
            .select(vec![col("id"), col("name")])
            .from(TableRef::new("users").with_schema("app"));

        let sql = query.to_sql(Dialect::Postgres);
        assert!(sql.contains("\"app\".\"users\""));
        assert!(sql.contains("\"id\""));
        assert!(sql.contains("\"name\""));
    }

    #[test]
    fn test_filter_accumulates_with_and() {
        let query = Query::new()
            .select(vec![col("name")])
            .from("users")
            .filter(col("active").eq(true))
            .filter(col("age").gte(lit_int(18)));

        let sql = query.to_sql(Dialect::DuckDb);
        assert!(sql.contains("WHERE"));
        assert!(sql.contains("AND"));
    }

    #[test]
    fn test_join() {
        let query = Query::new()
            .select(vec![table_col("u", "name"), table_col("o", "total")])
            .from(TableRef::new("users").with_alias("u"))
            .inner_join(
                TableRef::new("orders").with_alias("o"),
                table_col("u", "id").eq(table_col("o", "user_id")),
            );

        let sql = query.to_sql(Dialect::MySql);
        assert!(sql.contains("INNER JOIN"));
        assert!(sql.contains("ON"));
    }

    #[test]
    fn test_aggregation_with_rollup() {
        let query = Query::new()
            .select(vec![
                col("region").into(),
                sum(col("amount")).alias("total"),
                count_star().alias("cnt"),
            ])
            .from("orders")
            .group_by(vec![col("region")])
            .rollup()
            .having(sum(col("amount")).gt(lit_int(1000)));

        let sql = query.to_sql(Dialect::Postgres);
        assert!(sql.contains("GROUP BY ROLLUP (\"region\")"));
        assert!(sql.contains("HAVING"));
    }

    #[test]
    fn test_order_limit_offset() {
        let query = Query::new()
            .select_star()
            .from("users")
            .order_by(vec![OrderByExpr::desc(col("age")).nulls_last()])
            .limit(10)
            .offset(20);

        let sql = query.to_sql(Dialect::Postgres);
        assert!(sql.contains("ORDER BY \"age\" DESC NULLS LAST"));
        assert!(sql.contains("LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn test_oracle_pagination() {
        let query = Query::new().select_star().from("users").limit(5).offset(10);

        let sql = query.to_sql(Dialect::Oracle);
        assert!(sql.contains("OFFSET 10 ROWS"));
        assert!(sql.contains("FETCH NEXT 5 ROWS ONLY"));
    }

    #[test]
    fn test_for_update_skip_locked() {
        let query = Query::new()
            .select(vec![col("event_id")])
            .from("event_queue")
            .skip_locked();

        let pg = query.to_sql(Dialect::Postgres);
        assert!(pg.contains("FOR UPDATE SKIP LOCKED"));

        // SQLite has no row locking clause at all
        let lite = query.to_sql(Dialect::Sqlite);
        assert!(!lite.contains("FOR UPDATE"));
    }

    #[test]
    fn test_cte_rendering() {
        let inner = Query::new()
            .select(vec![col("region").into(), sum(col("amount")).alias("total")])
            .from("orders")
            .group_by(vec![col("region")]);

        let query = Query::new()
            .with_cte(Cte::new("regional_totals", inner))
            .select_star()
            .from("regional_totals")
            .filter(col("total").gt(lit_int(10000)));

        let sql = query.to_sql(Dialect::Postgres);
        assert!(sql.starts_with("WITH \"regional_totals\" AS ("));
        assert!(sql.contains("SELECT"));
    }

    #[test]
    fn test_recursive_cte_keyword_per_dialect() {
        let seed = Query::new().select(vec![lit_int(1)]).from("t");
        let query = Query::new()
            .with_cte(Cte::recursive("walk", seed))
            .select_star()
            .from("walk");

        assert!(query.to_sql(Dialect::Postgres).contains("WITH RECURSIVE"));
        // Oracle spells it plain WITH
        let oracle = query.to_sql(Dialect::Oracle);
        assert!(oracle.contains("WITH "));
        assert!(!oracle.contains("RECURSIVE"));
    }

    #[test]
    fn test_from_subquery() {
        let inner = Query::new().select(vec![col("id")]).from("orders");
        let query = Query::new()
            .select_star()
            .from(FromItem::subquery(inner, "o"));

        let sql = query.to_sql(Dialect::Postgres);
        assert!(sql.contains("FROM (SELECT"));
        assert!(sql.contains(") AS \"o\""));
    }

    #[test]
    fn test_union_all() {
        let q1 = Query::new().select(vec![col("id")]).from("t1");
        let q2 = Query::new().select(vec![col("id")]).from("t2");

        let combined = q1.union_all(q2);
        let sql = combined
            .to_tokens_for_dialect(Dialect::Postgres)
            .serialize(Dialect::Postgres);
        assert!(sql.contains("UNION ALL"));
    }

    #[test]
    fn test_chained_set_operations() {
        let q1 = Query::new().select(vec![col("id")]).from("t1");
        let q2 = Query::new().select(vec![col("id")]).from("t2");
        let q3 = Query::new().select(vec![col("id")]).from("t3");

        let combined = q1.union(q2).chain(SetOpType::Union, true, q3);
        let sql = combined
            .to_tokens_for_dialect(Dialect::Postgres)
            .serialize(Dialect::Postgres);
        assert!(sql.contains("\"t1\""));
        assert!(sql.contains("\"t3\""));
        assert!(sql.contains("UNION ALL"));
    }

    #[test]
    fn test_placeholders_render_in_query() {
        let query = Query::new()
            .select(vec![col("id")])
            .from("t")
            .filter(col("name").eq(param("where_param_0")));

        assert!(query.to_sql(Dialect::Postgres).contains("\"name\" = $1"));
        assert!(query
            .to_sql(Dialect::Spanner)
            .contains("= @where_param_0"));
    }

    #[test]
    fn test_referenced_tables_walks_subqueries() {
        let sub = Query::new().select(vec![col("id")]).from("inactive");
        let query = Query::new()
            .select_star()
            .from("users")
            .filter(Expr::InSubquery {
                expr: Box::new(col("id")),
                subquery: Box::new(sub),
                negated: false,
            });

        let mut tables = vec![];
        query.referenced_tables(&mut tables);
        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"inactive".to_string()));
    }
}
