//! AST transform passes.
//!
//! Pure `Query -> Query` rewrites applied by builders before rendering:
//! boolean simplification, predicate pushdown into derived tables, join
//! reordering, derived-table elimination, and IN-subquery unnesting.
//!
//! Every pass is conservative: a query shape the pass does not
//! understand passes through unchanged, and a pass error leaves the
//! input untouched at the call site.

use thiserror::Error;
use tracing::warn;

use super::expr::{BinaryOperator, Expr, Literal};
use super::query::{FromItem, JoinType, Query, TableRef};

/// Error from a transform pass.
///
/// Pass failures are recovery-local: callers fall back to the
/// untransformed AST and log a warning.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("transform pass produced an inconsistent query shape")]
    InconsistentShape,
}

/// The transform passes a builder may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerPass {
    Simplify,
    PushdownPredicates,
    OptimizeJoins,
    EliminateSubqueries,
    UnnestSubqueries,
}

/// Which passes a builder applies at build time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeFlags {
    pub simplify: bool,
    pub pushdown_predicates: bool,
    pub optimize_joins: bool,
    pub eliminate_subqueries: bool,
    pub unnest_subqueries: bool,
}

impl OptimizeFlags {
    /// Enable every pass.
    pub fn all() -> Self {
        Self {
            simplify: true,
            pushdown_predicates: true,
            optimize_joins: true,
            eliminate_subqueries: true,
            unnest_subqueries: true,
        }
    }

    fn passes(&self) -> Vec<OptimizerPass> {
        let mut out = Vec::new();
        if self.simplify {
            out.push(OptimizerPass::Simplify);
        }
        if self.pushdown_predicates {
            out.push(OptimizerPass::PushdownPredicates);
        }
        if self.optimize_joins {
            out.push(OptimizerPass::OptimizeJoins);
        }
        if self.eliminate_subqueries {
            out.push(OptimizerPass::EliminateSubqueries);
        }
        if self.unnest_subqueries {
            out.push(OptimizerPass::UnnestSubqueries);
        }
        out
    }
}

/// Apply a single pass.
pub fn apply_pass(query: Query, pass: OptimizerPass) -> Result<Query, OptimizeError> {
    Ok(match pass {
        OptimizerPass::Simplify => simplify(query),
        OptimizerPass::PushdownPredicates => pushdown_predicates(query),
        OptimizerPass::OptimizeJoins => optimize_joins(query),
        OptimizerPass::EliminateSubqueries => eliminate_subqueries(query),
        OptimizerPass::UnnestSubqueries => unnest_subqueries(query),
    })
}

/// Apply the requested passes in order; a failing pass is skipped with
/// a warning and the query carries on untransformed.
pub fn apply_all(query: Query, flags: &OptimizeFlags) -> Query {
    let mut current = query;
    for pass in flags.passes() {
        let snapshot = current.clone();
        match apply_pass(current, pass) {
            Ok(next) => current = next,
            Err(err) => {
                warn!(pass = ?pass, error = %err, "transform pass failed, keeping input");
                current = snapshot;
            }
        }
    }
    current
}

// ============================================================================
// Simplify
// ============================================================================

/// Boolean and structural simplification of predicate expressions.
pub fn simplify(mut query: Query) -> Query {
    query.where_clause = query.where_clause.map(simplify_expr);
    query.having = query.having.map(simplify_expr);
    for join in &mut query.joins {
        if let Some(on) = join.on.take() {
            join.on = Some(simplify_expr(on));
        }
    }
    for cte in &mut query.with {
        if let crate::sql::query::CteBody::Query(body) = &mut cte.body {
            let inner = std::mem::take(&mut **body);
            **body = simplify(inner);
        }
    }
    query
}

/// Simplify a lone predicate expression (UPDATE/DELETE filters).
pub fn simplify_predicate(expr: Expr) -> Expr {
    simplify_expr(expr)
}

fn is_true(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(Literal::Bool(true)))
}

fn is_false(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(Literal::Bool(false)))
}

fn simplify_expr(expr: Expr) -> Expr {
    match expr {
        Expr::BinaryOp { left, op, right } => {
            let left = simplify_expr(*left);
            let right = simplify_expr(*right);
            match op {
                BinaryOperator::And => {
                    if is_true(&left) {
                        return right;
                    }
                    if is_true(&right) {
                        return left;
                    }
                    if is_false(&left) || is_false(&right) {
                        return Expr::Literal(Literal::Bool(false));
                    }
                    Expr::BinaryOp {
                        left: Box::new(left),
                        op,
                        right: Box::new(right),
                    }
                }
                BinaryOperator::Or => {
                    if is_false(&left) {
                        return right;
                    }
                    if is_false(&right) {
                        return left;
                    }
                    if is_true(&left) || is_true(&right) {
                        return Expr::Literal(Literal::Bool(true));
                    }
                    Expr::BinaryOp {
                        left: Box::new(left),
                        op,
                        right: Box::new(right),
                    }
                }
                _ => Expr::BinaryOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
            }
        }
        Expr::UnaryOp {
            op: super::expr::UnaryOperator::Not,
            expr,
        } => {
            let inner = simplify_expr(*expr);
            match inner {
                // NOT NOT x => x
                Expr::UnaryOp {
                    op: super::expr::UnaryOperator::Not,
                    expr,
                } => *expr,
                Expr::Literal(Literal::Bool(b)) => Expr::Literal(Literal::Bool(!b)),
                other => Expr::UnaryOp {
                    op: super::expr::UnaryOperator::Not,
                    expr: Box::new(other),
                },
            }
        }
        Expr::Paren(inner) => {
            let inner = simplify_expr(*inner);
            match inner {
                // Parens around atoms carry no meaning
                lit @ Expr::Literal(_) => lit,
                col @ Expr::Column { .. } => col,
                ph @ Expr::Placeholder { .. } => ph,
                other => Expr::Paren(Box::new(other)),
            }
        }
        other => other,
    }
}

// ============================================================================
// Predicate Pushdown
// ============================================================================

/// Push WHERE conjuncts into a derived table in FROM when they only
/// reference that table's output columns.
///
/// Applies when the derived table has no grouping, distinct, limit, or
/// set operation, and exposes plain columns (or `*`).
pub fn pushdown_predicates(mut query: Query) -> Query {
    let (inner, alias) = match query.from.take() {
        Some(FromItem::Subquery { query, alias }) => (query, alias),
        other => {
            query.from = other;
            return query;
        }
    };
    let mut inner = *inner;

    let pushable_target = inner.group_by.is_empty()
        && !inner.distinct
        && inner.limit_offset.is_none()
        && inner.set_op.is_none()
        && inner.with.is_empty();

    let exposed = exposed_columns(&inner);

    let Some(where_clause) = query.where_clause.take() else {
        query.from = Some(FromItem::Subquery {
            query: Box::new(inner),
            alias,
        });
        return query;
    };

    let mut kept = Vec::new();
    let mut pushed = Vec::new();

    for conjunct in where_clause.conjuncts() {
        if pushable_target && can_push(&conjunct, &alias, exposed.as_deref()) {
            pushed.push(strip_qualifier(conjunct, &alias));
        } else {
            kept.push(conjunct);
        }
    }

    for predicate in pushed {
        inner = inner.filter(predicate);
    }

    query.where_clause = rebuild_conjunction(kept);
    query.from = Some(FromItem::Subquery {
        query: Box::new(inner),
        alias,
    });
    query
}

/// Column names a derived table exposes, or `None` when it exposes `*`
/// (every inner column is available).
fn exposed_columns(inner: &Query) -> Option<Vec<String>> {
    let mut names = Vec::new();
    for item in &inner.select {
        match (&item.expr, &item.alias) {
            (_, Some(alias)) => names.push(alias.clone()),
            (Expr::Column { column, .. }, None) => names.push(column.clone()),
            (Expr::Star { .. }, None) => return None,
            // Unaliased computed columns cannot be matched by name
            _ => {}
        }
    }
    Some(names)
}

fn can_push(conjunct: &Expr, alias: &str, exposed: Option<&[String]>) -> bool {
    if conjunct.contains_subquery() {
        return false;
    }
    let mut pushable = true;
    conjunct.for_each_column(&mut |table, column| {
        let table_ok = match table {
            Some(t) => t == alias,
            None => true,
        };
        let column_ok = match exposed {
            Some(names) => names.iter().any(|n| n == column),
            None => true,
        };
        if !table_ok || !column_ok {
            pushable = false;
        }
    });
    pushable
}

/// Remove the derived-table qualifier so the predicate binds inside it.
fn strip_qualifier(expr: Expr, alias: &str) -> Expr {
    match expr {
        Expr::Column { table, column } => Expr::Column {
            table: table.filter(|t| t != alias),
            column,
        },
        Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
            left: Box::new(strip_qualifier(*left, alias)),
            op,
            right: Box::new(strip_qualifier(*right, alias)),
        },
        Expr::UnaryOp { op, expr } => Expr::UnaryOp {
            op,
            expr: Box::new(strip_qualifier(*expr, alias)),
        },
        Expr::Paren(inner) => Expr::Paren(Box::new(strip_qualifier(*inner, alias))),
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr: Box::new(strip_qualifier(*expr, alias)),
            negated,
        },
        Expr::In {
            expr,
            values,
            negated,
        } => Expr::In {
            expr: Box::new(strip_qualifier(*expr, alias)),
            values: values
                .into_iter()
                .map(|v| strip_qualifier(v, alias))
                .collect(),
            negated,
        },
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => Expr::Between {
            expr: Box::new(strip_qualifier(*expr, alias)),
            low: Box::new(strip_qualifier(*low, alias)),
            high: Box::new(strip_qualifier(*high, alias)),
            negated,
        },
        Expr::LikeEscape {
            expr,
            pattern,
            escape_char,
            negated,
        } => Expr::LikeEscape {
            expr: Box::new(strip_qualifier(*expr, alias)),
            pattern: Box::new(strip_qualifier(*pattern, alias)),
            escape_char,
            negated,
        },
        Expr::Function {
            name,
            args,
            distinct,
        } => Expr::Function {
            name,
            args: args
                .into_iter()
                .map(|a| strip_qualifier(a, alias))
                .collect(),
            distinct,
        },
        other => other,
    }
}

fn rebuild_conjunction(parts: Vec<Expr>) -> Option<Expr> {
    parts.into_iter().reduce(|acc, next| Expr::BinaryOp {
        left: Box::new(acc),
        op: BinaryOperator::And,
        right: Box::new(next),
    })
}

// ============================================================================
// Join Reordering
// ============================================================================

/// Move CROSS joins after condition-bearing joins.
///
/// Only applies when every join is INNER or CROSS; reordering outer
/// joins changes results.
pub fn optimize_joins(mut query: Query) -> Query {
    let reorderable = query
        .joins
        .iter()
        .all(|j| matches!(j.join_type, JoinType::Inner | JoinType::Cross));
    if !reorderable {
        return query;
    }

    let (with_on, without_on): (Vec<_>, Vec<_>) = query
        .joins
        .drain(..)
        .partition(|j| j.on.is_some());
    query.joins = with_on;
    query.joins.extend(without_on);
    query
}

// ============================================================================
// Derived-table Elimination
// ============================================================================

/// Collapse `FROM (SELECT * FROM t) AS a` into `FROM t AS a`.
pub fn eliminate_subqueries(mut query: Query) -> Query {
    let (inner, alias) = match query.from.take() {
        Some(FromItem::Subquery { query, alias }) => (query, alias),
        other => {
            query.from = other;
            return query;
        }
    };

    let bare_projection = inner.select.len() == 1
        && matches!(inner.select[0].expr, Expr::Star { table: None })
        && inner.joins.is_empty()
        && inner.where_clause.is_none()
        && inner.group_by.is_empty()
        && inner.having.is_none()
        && inner.order_by.is_empty()
        && inner.limit_offset.is_none()
        && !inner.distinct
        && inner.set_op.is_none()
        && inner.with.is_empty();

    match (bare_projection, inner.from.clone()) {
        (true, Some(FromItem::Table(table))) => {
            query.from = Some(FromItem::Table(TableRef {
                schema: table.schema,
                table: table.table,
                alias: Some(alias),
            }));
        }
        _ => {
            query.from = Some(FromItem::Subquery { query: inner, alias });
        }
    }
    query
}

// ============================================================================
// Subquery Unnesting
// ============================================================================

/// Rewrite `x IN (SELECT c FROM t WHERE w)` into a correlated EXISTS.
///
/// Only non-negated IN is rewritten (NOT IN has different NULL
/// semantics), and only when the subquery is a single-table,
/// single-column select without grouping, distinct, or limits.
pub fn unnest_subqueries(mut query: Query) -> Query {
    query.where_clause = query.where_clause.map(unnest_expr);
    query
}

fn unnest_expr(expr: Expr) -> Expr {
    match expr {
        Expr::BinaryOp { left, op, right } => Expr::BinaryOp {
            left: Box::new(unnest_expr(*left)),
            op,
            right: Box::new(unnest_expr(*right)),
        },
        Expr::Paren(inner) => Expr::Paren(Box::new(unnest_expr(*inner))),
        Expr::InSubquery {
            expr,
            subquery,
            negated: false,
        } => {
            let simple = subquery.select.len() == 1
                && subquery.joins.is_empty()
                && subquery.group_by.is_empty()
                && subquery.having.is_none()
                && subquery.limit_offset.is_none()
                && !subquery.distinct
                && subquery.set_op.is_none()
                && subquery.with.is_empty()
                && matches!(subquery.from, Some(FromItem::Table(_)));

            let selected = match subquery.select.first().map(|s| &s.expr) {
                Some(Expr::Column { table, column }) => {
                    Some((table.clone(), column.clone()))
                }
                _ => None,
            };

            match (simple, selected) {
                (true, Some((table, column))) => {
                    let correlated = Expr::BinaryOp {
                        left: Box::new(Expr::Column { table, column }),
                        op: BinaryOperator::Eq,
                        right: expr,
                    };
                    let mut inner = *subquery;
                    inner.select = vec![Expr::Literal(Literal::Int(1)).into()];
                    inner = inner.filter(correlated);
                    Expr::Exists {
                        subquery: Box::new(inner),
                        negated: false,
                    }
                }
                _ => Expr::InSubquery {
                    expr,
                    subquery,
                    negated: false,
                },
            }
        }
        other => other,
    }
}
