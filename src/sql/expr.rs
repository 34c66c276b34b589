//! Expression AST - the core of SQL expression building.
//!
//! A strongly-typed AST for SQL expressions with exhaustive pattern
//! matching enforced by the compiler. Parameter markers are first-class
//! nodes ([`Expr::Placeholder`]); their final syntax is decided by the
//! rendering dialect.

use thiserror::Error;

use super::dialect::{Dialect, SqlDialect};
use super::token::{Token, TokenStream};

// =============================================================================
// Expression AST
// =============================================================================

/// A SQL expression.
///
/// Every variant must be handled in `to_tokens_for_dialect()`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: optional_table.column
    Column {
        table: Option<String>,
        column: String,
    },

    /// Literal values
    Literal(Literal),

    /// Parameter marker bound by name in the builder's parameter map.
    Placeholder { name: String },

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Unary operation: op expr
    UnaryOp { op: UnaryOperator, expr: Box<Expr> },

    /// Function call: name(args...)
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },

    /// CASE [operand] WHEN... THEN... ELSE... END
    Case {
        operand: Option<Box<Expr>>,
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    /// Scalar subquery: (SELECT ...)
    Subquery(Box<crate::sql::query::Query>),

    /// IN list: expr [NOT] IN (values...)
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// IN subquery: expr [NOT] IN (SELECT ...)
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<crate::sql::query::Query>,
        negated: bool,
    },

    /// [NOT] EXISTS (SELECT ...)
    Exists {
        subquery: Box<crate::sql::query::Query>,
        negated: bool,
    },

    /// expr [NOT] BETWEEN low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// LIKE with ESCAPE: expr LIKE pattern ESCAPE escape_char
    LikeEscape {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        escape_char: char,
        negated: bool,
    },

    /// Wildcard: * or table.*
    Star { table: Option<String> },

    /// Parenthesized expression
    Paren(Box<Expr>),

    /// Window function: function OVER (PARTITION BY ... ORDER BY ... frame)
    WindowFunction {
        function: Box<Expr>,
        partition_by: Vec<Expr>,
        order_by: Vec<WindowOrderBy>,
        frame: Option<WindowFrame>,
    },

    /// Raw SQL passed directly to output without escaping.
    ///
    /// Never feed user input here; it is not sanitized. Use
    /// [`Expr::Literal`] or [`Expr::Placeholder`] for values.
    Raw(String),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    // Logical
    And,
    Or,
    // Arithmetic
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    // String
    Concat,
    Like,
}

impl BinaryOperator {
    /// Parse a comparison operator from its SQL spelling.
    pub fn from_symbol(sym: &str) -> Option<Self> {
        match sym.trim() {
            "=" | "==" => Some(BinaryOperator::Eq),
            "<>" | "!=" => Some(BinaryOperator::Ne),
            "<" => Some(BinaryOperator::Lt),
            ">" => Some(BinaryOperator::Gt),
            "<=" => Some(BinaryOperator::Lte),
            ">=" => Some(BinaryOperator::Gte),
            _ => {
                if sym.trim().eq_ignore_ascii_case("like") {
                    Some(BinaryOperator::Like)
                } else {
                    None
                }
            }
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

// =============================================================================
// Window Function Types
// =============================================================================

/// ORDER BY expression within a window specification.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOrderBy {
    pub expr: Expr,
    pub dir: Option<SortDir>,
    pub nulls: Option<NullsOrder>,
}

impl WindowOrderBy {
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
}

/// Sort direction (shared with query ORDER BY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

/// NULLS ordering (shared with query ORDER BY).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// Window frame specification.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFrame {
    pub kind: WindowFrameKind,
    pub start: WindowFrameBound,
    pub end: Option<WindowFrameBound>,
}

impl WindowFrame {
    /// Create a frame with just a start bound.
    pub fn new(kind: WindowFrameKind, start: WindowFrameBound) -> Self {
        Self {
            kind,
            start,
            end: None,
        }
    }

    /// Create a frame with BETWEEN start AND end.
    pub fn between(kind: WindowFrameKind, start: WindowFrameBound, end: WindowFrameBound) -> Self {
        Self {
            kind,
            start,
            end: Some(end),
        }
    }

    /// ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW (running aggregate).
    pub fn rows_to_current() -> Self {
        Self::between(
            WindowFrameKind::Rows,
            WindowFrameBound::UnboundedPreceding,
            WindowFrameBound::CurrentRow,
        )
    }

    /// Rolling window: ROWS BETWEEN (periods-1) PRECEDING AND CURRENT ROW.
    pub fn rolling(periods: u32) -> Self {
        let preceding = periods.saturating_sub(1);
        Self::between(
            WindowFrameKind::Rows,
            WindowFrameBound::Preceding(preceding as u64),
            WindowFrameBound::CurrentRow,
        )
    }
}

/// Frame type: ROWS, RANGE, or GROUPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFrameKind {
    Rows,
    Range,
    Groups,
}

/// Frame boundary specification.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowFrameBound {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

// =============================================================================
// Expression to Tokens
// =============================================================================

impl Expr {
    /// Convert this expression to a token stream (default dialect).
    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    /// Convert this expression to a token stream for a specific dialect.
    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Column { table, column } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Bool(b) => Token::LitBool(*b),
                    Literal::Null => Token::LitNull,
                });
            }

            Expr::Placeholder { name } => {
                ts.push(Token::Placeholder(name.clone()));
            }

            Expr::BinaryOp { left, op, right } => {
                // CONCAT as a function for dialects where || is not concat
                if *op == BinaryOperator::Concat && !dialect.supports_concat_operator() {
                    ts.push(Token::FunctionName("CONCAT".into()));
                    ts.lparen();
                    ts.append(&left.to_tokens_for_dialect(dialect));
                    ts.comma().space();
                    ts.append(&right.to_tokens_for_dialect(dialect));
                    ts.rparen();
                } else {
                    ts.append(&left.to_tokens_for_dialect(dialect));
                    ts.space();
                    ts.push(binary_op_to_token(*op));
                    ts.space();
                    ts.append(&right.to_tokens_for_dialect(dialect));
                }
            }

            Expr::UnaryOp { op, expr } => {
                ts.push(match op {
                    UnaryOperator::Not => Token::Not,
                    UnaryOperator::Minus => Token::Minus,
                });
                ts.space();
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }

            Expr::Function {
                name,
                args,
                distinct,
            } => {
                ts.push(Token::FunctionName(name.clone()));
                ts.lparen();
                if *distinct {
                    ts.push(Token::Distinct).space();
                }
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                ts.push(Token::Case);
                if let Some(op) = operand {
                    ts.space().append(&op.to_tokens_for_dialect(dialect));
                }
                for (when, then) in when_clauses {
                    ts.space().push(Token::When).space();
                    ts.append(&when.to_tokens_for_dialect(dialect));
                    ts.space().push(Token::Then).space();
                    ts.append(&then.to_tokens_for_dialect(dialect));
                }
                if let Some(else_expr) = else_clause {
                    ts.space().push(Token::Else).space();
                    ts.append(&else_expr.to_tokens_for_dialect(dialect));
                }
                ts.space().push(Token::End);
            }

            Expr::Subquery(query) => {
                ts.lparen();
                ts.append(&query.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                // "x IN ()" is invalid SQL; fold to a constant instead
                if values.is_empty() {
                    ts.push(if *negated {
                        Token::LitBool(true)
                    } else {
                        Token::LitBool(false)
                    });
                } else {
                    ts.append(&expr.to_tokens_for_dialect(dialect));
                    if *negated {
                        ts.space().push(Token::Not);
                    }
                    ts.space().push(Token::In).space().lparen();
                    for (i, val) in values.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&val.to_tokens_for_dialect(dialect));
                    }
                    ts.rparen();
                }
            }

            Expr::InSubquery {
                expr,
                subquery,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::In).space().lparen();
                ts.append(&subquery.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Exists { subquery, negated } => {
                if *negated {
                    ts.push(Token::Not).space();
                }
                ts.push(Token::Exists).space().lparen();
                ts.append(&subquery.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space().push(Token::Between).space();
                ts.append(&low.to_tokens_for_dialect(dialect));
                ts.space().push(Token::And).space();
                ts.append(&high.to_tokens_for_dialect(dialect));
            }

            Expr::IsNull { expr, negated } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space();
                ts.push(if *negated {
                    Token::IsNotNull
                } else {
                    Token::IsNull
                });
            }

            Expr::LikeEscape {
                expr,
                pattern,
                escape_char,
                negated,
            } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                if *negated {
                    ts.space().push(Token::Not);
                }
                ts.space()
                    .push(Token::Like)
                    .space()
                    .append(&pattern.to_tokens_for_dialect(dialect))
                    .space()
                    .push(Token::Raw("ESCAPE".into()))
                    .space()
                    .push(Token::LitString(escape_char.to_string()));
            }

            Expr::Star { table } => {
                if let Some(t) = table {
                    ts.push(Token::Ident(t.clone()));
                    ts.push(Token::Dot);
                }
                ts.push(Token::Star);
            }

            Expr::Paren(inner) => {
                ts.lparen();
                ts.append(&inner.to_tokens_for_dialect(dialect));
                ts.rparen();
            }

            Expr::WindowFunction {
                function,
                partition_by,
                order_by,
                frame,
            } => {
                ts.append(&function.to_tokens_for_dialect(dialect));

                ts.space().push(Token::Over).space().lparen();

                let mut need_space = false;

                if !partition_by.is_empty() {
                    ts.push(Token::PartitionBy).space();
                    for (i, expr) in partition_by.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&expr.to_tokens_for_dialect(dialect));
                    }
                    need_space = true;
                }

                if !order_by.is_empty() {
                    if need_space {
                        ts.space();
                    }
                    ts.push(Token::OrderBy).space();
                    for (i, ob) in order_by.iter().enumerate() {
                        if i > 0 {
                            ts.comma().space();
                        }
                        ts.append(&ob.expr.to_tokens_for_dialect(dialect));
                        if let Some(dir) = &ob.dir {
                            ts.space().push(match dir {
                                SortDir::Asc => Token::Asc,
                                SortDir::Desc => Token::Desc,
                            });
                        }
                        if let Some(nulls) = &ob.nulls {
                            if dialect.supports_nulls_ordering() {
                                ts.space().push(match nulls {
                                    NullsOrder::First => Token::NullsFirst,
                                    NullsOrder::Last => Token::NullsLast,
                                });
                            }
                        }
                    }
                    need_space = true;
                }

                if let Some(f) = frame {
                    if need_space {
                        ts.space();
                    }
                    ts.push(match f.kind {
                        WindowFrameKind::Rows => Token::Rows,
                        WindowFrameKind::Range => Token::Range,
                        WindowFrameKind::Groups => Token::Groups,
                    });
                    ts.space();

                    if f.end.is_some() {
                        ts.push(Token::Between).space();
                    }

                    emit_frame_bound(&mut ts, &f.start);

                    if let Some(ref end) = f.end {
                        ts.space().push(Token::And).space();
                        emit_frame_bound(&mut ts, end);
                    }
                }

                ts.rparen();
            }

            Expr::Raw(sql) => {
                ts.push(Token::Raw(sql.clone()));
            }
        }

        ts
    }

    /// Visit every column reference in this expression.
    pub fn for_each_column(&self, f: &mut impl FnMut(Option<&str>, &str)) {
        match self {
            Expr::Column { table, column } => f(table.as_deref(), column),
            Expr::Literal(_) | Expr::Placeholder { .. } | Expr::Raw(_) | Expr::Star { .. } => {}
            Expr::BinaryOp { left, right, .. } => {
                left.for_each_column(f);
                right.for_each_column(f);
            }
            Expr::UnaryOp { expr, .. } | Expr::Paren(expr) => expr.for_each_column(f),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.for_each_column(f);
                }
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(op) = operand {
                    op.for_each_column(f);
                }
                for (when, then) in when_clauses {
                    when.for_each_column(f);
                    then.for_each_column(f);
                }
                if let Some(e) = else_clause {
                    e.for_each_column(f);
                }
            }
            Expr::Subquery(_) | Expr::Exists { .. } => {}
            Expr::In { expr, values, .. } => {
                expr.for_each_column(f);
                for v in values {
                    v.for_each_column(f);
                }
            }
            Expr::InSubquery { expr, .. } => expr.for_each_column(f),
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.for_each_column(f);
                low.for_each_column(f);
                high.for_each_column(f);
            }
            Expr::IsNull { expr, .. } => expr.for_each_column(f),
            Expr::LikeEscape { expr, pattern, .. } => {
                expr.for_each_column(f);
                pattern.for_each_column(f);
            }
            Expr::WindowFunction {
                function,
                partition_by,
                order_by,
                ..
            } => {
                function.for_each_column(f);
                for e in partition_by {
                    e.for_each_column(f);
                }
                for ob in order_by {
                    ob.expr.for_each_column(f);
                }
            }
        }
    }

    /// Whether this expression contains a subquery anywhere.
    pub fn contains_subquery(&self) -> bool {
        match self {
            Expr::Subquery(_) | Expr::InSubquery { .. } | Expr::Exists { .. } => true,
            Expr::Column { .. }
            | Expr::Literal(_)
            | Expr::Placeholder { .. }
            | Expr::Raw(_)
            | Expr::Star { .. } => false,
            Expr::BinaryOp { left, right, .. } => {
                left.contains_subquery() || right.contains_subquery()
            }
            Expr::UnaryOp { expr, .. } | Expr::Paren(expr) => expr.contains_subquery(),
            Expr::Function { args, .. } => args.iter().any(Expr::contains_subquery),
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                operand.as_deref().is_some_and(Expr::contains_subquery)
                    || when_clauses
                        .iter()
                        .any(|(w, t)| w.contains_subquery() || t.contains_subquery())
                    || else_clause.as_deref().is_some_and(Expr::contains_subquery)
            }
            Expr::In { expr, values, .. } => {
                expr.contains_subquery() || values.iter().any(Expr::contains_subquery)
            }
            Expr::Between {
                expr, low, high, ..
            } => expr.contains_subquery() || low.contains_subquery() || high.contains_subquery(),
            Expr::IsNull { expr, .. } => expr.contains_subquery(),
            Expr::LikeEscape { expr, pattern, .. } => {
                expr.contains_subquery() || pattern.contains_subquery()
            }
            Expr::WindowFunction {
                function,
                partition_by,
                order_by,
                ..
            } => {
                function.contains_subquery()
                    || partition_by.iter().any(Expr::contains_subquery)
                    || order_by.iter().any(|ob| ob.expr.contains_subquery())
            }
        }
    }

    /// Rename every placeholder in this expression, including those in
    /// nested subqueries. Used when one builder's AST is imported into
    /// another and parameter names must stay unique.
    pub fn map_placeholders(&mut self, f: &mut impl FnMut(&mut String)) {
        match self {
            Expr::Placeholder { name } => f(name),
            Expr::Column { .. } | Expr::Literal(_) | Expr::Raw(_) | Expr::Star { .. } => {}
            Expr::BinaryOp { left, right, .. } => {
                left.map_placeholders(f);
                right.map_placeholders(f);
            }
            Expr::UnaryOp { expr, .. } | Expr::Paren(expr) => expr.map_placeholders(f),
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.map_placeholders(f);
                }
            }
            Expr::Case {
                operand,
                when_clauses,
                else_clause,
            } => {
                if let Some(op) = operand {
                    op.map_placeholders(f);
                }
                for (when, then) in when_clauses {
                    when.map_placeholders(f);
                    then.map_placeholders(f);
                }
                if let Some(e) = else_clause {
                    e.map_placeholders(f);
                }
            }
            Expr::Subquery(q) => q.map_placeholders(f),
            Expr::In { expr, values, .. } => {
                expr.map_placeholders(f);
                for v in values {
                    v.map_placeholders(f);
                }
            }
            Expr::InSubquery { expr, subquery, .. } => {
                expr.map_placeholders(f);
                subquery.map_placeholders(f);
            }
            Expr::Exists { subquery, .. } => subquery.map_placeholders(f),
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.map_placeholders(f);
                low.map_placeholders(f);
                high.map_placeholders(f);
            }
            Expr::IsNull { expr, .. } => expr.map_placeholders(f),
            Expr::LikeEscape { expr, pattern, .. } => {
                expr.map_placeholders(f);
                pattern.map_placeholders(f);
            }
            Expr::WindowFunction {
                function,
                partition_by,
                order_by,
                ..
            } => {
                function.map_placeholders(f);
                for e in partition_by {
                    e.map_placeholders(f);
                }
                for ob in order_by {
                    ob.expr.map_placeholders(f);
                }
            }
        }
    }

    /// Split a conjunction into its AND-ed parts.
    pub fn conjuncts(self) -> Vec<Expr> {
        match self {
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                let mut parts = left.conjuncts();
                parts.extend(right.conjuncts());
                parts
            }
            other => vec![other],
        }
    }
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Ne => Token::Ne,
        BinaryOperator::Lt => Token::Lt,
        BinaryOperator::Gt => Token::Gt,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::Or => Token::Or,
        BinaryOperator::Plus => Token::Plus,
        BinaryOperator::Minus => Token::Minus,
        BinaryOperator::Mul => Token::Mul,
        BinaryOperator::Div => Token::Div,
        BinaryOperator::Mod => Token::Mod,
        BinaryOperator::Concat => Token::Concat,
        BinaryOperator::Like => Token::Like,
    }
}

/// Emit a window frame bound to a token stream.
fn emit_frame_bound(ts: &mut TokenStream, bound: &WindowFrameBound) {
    match bound {
        WindowFrameBound::UnboundedPreceding => {
            ts.push(Token::Unbounded).space().push(Token::Preceding);
        }
        WindowFrameBound::Preceding(n) => {
            ts.push(Token::LitInt(*n as i64))
                .space()
                .push(Token::Preceding);
        }
        WindowFrameBound::CurrentRow => {
            ts.push(Token::CurrentRow);
        }
        WindowFrameBound::Following(n) => {
            ts.push(Token::LitInt(*n as i64))
                .space()
                .push(Token::Following);
        }
        WindowFrameBound::UnboundedFollowing => {
            ts.push(Token::Unbounded).space().push(Token::Following);
        }
    }
}

// =============================================================================
// Expression Constructors
// =============================================================================

/// Create a column reference.
pub fn col(name: &str) -> Expr {
    Expr::Column {
        table: None,
        column: name.into(),
    }
}

/// Create a qualified column reference (table.column).
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

/// Create a named parameter marker.
pub fn param(name: &str) -> Expr {
    Expr::Placeholder { name: name.into() }
}

/// Create an integer literal.
pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

/// Create a float literal.
pub fn lit_float(f: f64) -> Expr {
    Expr::Literal(Literal::Float(f))
}

/// Create a string literal.
pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

/// Create a boolean literal.
pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

/// Create a NULL literal.
pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

/// Create a star (*) expression.
pub fn star() -> Expr {
    Expr::Star { table: None }
}

/// Create a qualified star (table.*) expression.
pub fn table_star(table: &str) -> Expr {
    Expr::Star {
        table: Some(table.into()),
    }
}

// =============================================================================
// Aggregate Functions
// =============================================================================

/// COUNT(expr)
pub fn count(expr: Expr) -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![expr],
        distinct: false,
    }
}

/// COUNT(*)
pub fn count_star() -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![star()],
        distinct: false,
    }
}

/// COUNT(DISTINCT expr)
pub fn count_distinct(expr: Expr) -> Expr {
    Expr::Function {
        name: "COUNT".into(),
        args: vec![expr],
        distinct: true,
    }
}

/// SUM(expr)
pub fn sum(expr: Expr) -> Expr {
    Expr::Function {
        name: "SUM".into(),
        args: vec![expr],
        distinct: false,
    }
}

/// AVG(expr)
pub fn avg(expr: Expr) -> Expr {
    Expr::Function {
        name: "AVG".into(),
        args: vec![expr],
        distinct: false,
    }
}

/// MIN(expr)
pub fn min(expr: Expr) -> Expr {
    Expr::Function {
        name: "MIN".into(),
        args: vec![expr],
        distinct: false,
    }
}

/// MAX(expr)
pub fn max(expr: Expr) -> Expr {
    Expr::Function {
        name: "MAX".into(),
        args: vec![expr],
        distinct: false,
    }
}

/// COALESCE(args...)
pub fn coalesce(args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: "COALESCE".into(),
        args,
        distinct: false,
    }
}

/// Generic function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
        distinct: false,
    }
}

// =============================================================================
// Window Functions
// =============================================================================

/// ROW_NUMBER()
pub fn row_number() -> Expr {
    func("ROW_NUMBER", vec![])
}

/// RANK()
pub fn rank() -> Expr {
    func("RANK", vec![])
}

/// DENSE_RANK()
pub fn dense_rank() -> Expr {
    func("DENSE_RANK", vec![])
}

/// LAG(expr)
pub fn lag(expr: Expr) -> Expr {
    func("LAG", vec![expr])
}

/// LEAD(expr)
pub fn lead(expr: Expr) -> Expr {
    func("LEAD", vec![expr])
}

/// FIRST_VALUE(expr)
pub fn first_value(expr: Expr) -> Expr {
    func("FIRST_VALUE", vec![expr])
}

/// LAST_VALUE(expr)
pub fn last_value(expr: Expr) -> Expr {
    func("LAST_VALUE", vec![expr])
}

/// Raw SQL expression (pass-through, no parsing).
///
/// Never feed user input here; the SQL is not sanitized. Reserved for
/// dialect-specific syntax the builder does not cover.
pub fn raw_sql(sql: &str) -> Expr {
    Expr::Raw(sql.into())
}

// =============================================================================
// Window Builder
// =============================================================================

/// Error from assembling a window expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    /// A frame without ORDER BY is invalid or undefined in most SQL
    /// dialects.
    #[error("window frame requires an ORDER BY clause")]
    FrameWithoutOrderBy,
}

/// Builder for window function expressions.
#[derive(Debug, Clone)]
#[must_use = "WindowBuilder has no effect until build() is called"]
pub struct WindowBuilder {
    function: Expr,
    partition_by: Vec<Expr>,
    order_by: Vec<WindowOrderBy>,
    frame: Option<WindowFrame>,
}

impl WindowBuilder {
    /// Create a new window builder for the given function.
    pub fn new(function: Expr) -> Self {
        Self {
            function,
            partition_by: vec![],
            order_by: vec![],
            frame: None,
        }
    }

    /// Add PARTITION BY expressions.
    pub fn partition_by(mut self, exprs: Vec<Expr>) -> Self {
        self.partition_by = exprs;
        self
    }

    /// Add ORDER BY expressions.
    pub fn order_by(mut self, exprs: Vec<WindowOrderBy>) -> Self {
        self.order_by = exprs;
        self
    }

    /// Set the window frame.
    pub fn frame(mut self, frame: WindowFrame) -> Self {
        self.frame = Some(frame);
        self
    }

    /// Shorthand: ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW.
    pub fn rows_to_current(mut self) -> Self {
        self.frame = Some(WindowFrame::rows_to_current());
        self
    }

    /// Build the window function expression.
    ///
    /// Fails when a frame is specified without ORDER BY.
    pub fn build(self) -> Result<Expr, WindowError> {
        if self.frame.is_some() && self.order_by.is_empty() {
            return Err(WindowError::FrameWithoutOrderBy);
        }
        Ok(Expr::WindowFunction {
            function: Box::new(self.function),
            partition_by: self.partition_by,
            order_by: self.order_by,
            frame: self.frame,
        })
    }
}

/// Extension trait adding an OVER clause to expressions.
pub trait WindowExt: Sized {
    /// Start building a window function with an OVER clause.
    fn over(self) -> WindowBuilder;
}

impl WindowExt for Expr {
    fn over(self) -> WindowBuilder {
        WindowBuilder::new(self)
    }
}

// =============================================================================
// Expression Builder Trait
// =============================================================================

/// Extension trait for building expressions fluently.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    // Comparison operators
    fn eq(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Eq, other.into())
    }

    fn ne(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Ne, other.into())
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Gt, other.into())
    }

    fn gte(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Gte, other.into())
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Lt, other.into())
    }

    fn lte(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Lte, other.into())
    }

    // Logical operators
    fn and(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::And, other.into())
    }

    fn or(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Or, other.into())
    }

    fn not(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            expr: Box::new(self.into_expr()),
        }
    }

    // Arithmetic operators
    fn add(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Plus, other.into())
    }

    fn sub(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Minus, other.into())
    }

    fn mul(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Mul, other.into())
    }

    fn div(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Div, other.into())
    }

    // String operators
    fn like(self, pattern: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Like, pattern.into())
    }

    /// LIKE with ESCAPE for matching literal `%` and `_`.
    fn like_escape(self, pattern: impl Into<Expr>, escape_char: char) -> Expr {
        Expr::LikeEscape {
            expr: Box::new(self.into_expr()),
            pattern: Box::new(pattern.into()),
            escape_char,
            negated: false,
        }
    }

    fn concat(self, other: impl Into<Expr>) -> Expr {
        binary(self.into_expr(), BinaryOperator::Concat, other.into())
    }

    // Predicates
    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }

    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        }
    }

    fn in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated: false,
        }
    }

    fn not_in_list(self, values: Vec<Expr>) -> Expr {
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
            negated: true,
        }
    }

    fn between(self, low: impl Into<Expr>, high: impl Into<Expr>) -> Expr {
        Expr::Between {
            expr: Box::new(self.into_expr()),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
            negated: false,
        }
    }

    /// Alias the expression in a SELECT list.
    fn alias(self, alias: &str) -> crate::sql::query::SelectExpr {
        crate::sql::query::SelectExpr::new(self.into_expr()).with_alias(alias)
    }
}

fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        lit_bool(b)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        lit_int(n as i64)
    }
}

impl From<f64> for Expr {
    fn from(f: f64) -> Self {
        lit_float(f)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Literal::String(s))
    }
}
