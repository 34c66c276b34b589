//! Statement filters.
//!
//! A filter contributes parameters to a statement's bag and rewrites
//! its AST (or, for raw SQL inputs, appends rendered clauses to the
//! text). Filters apply left to right; their parameter contributions
//! adopt builder-style unique names.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::builder::ParamBag;
use crate::error::ErrorKind;
use crate::pipeline::scanner::has_top_level_word;
use crate::sql::dialect::{Dialect, ParamStyle, SqlDialect};
use crate::sql::expr::{col, Expr, ExprExt, SortDir};
use crate::sql::query::OrderByExpr;
use crate::sql::SqlAst;
use crate::value::Value;

/// What a filter rewrites: a typed AST (builder inputs) or rendered
/// text (raw SQL inputs).
///
/// Text targets carry the statement's placeholder style and the next
/// free ordinal so appended markers continue the numbering.
#[derive(Debug)]
pub enum FilterTarget {
    Ast(SqlAst),
    Text {
        sql: String,
        dialect: Dialect,
        style: ParamStyle,
        next_ordinal: usize,
    },
}

/// Error applying a filter.
#[derive(Debug, Clone, Error)]
pub enum FilterError {
    #[error("filter {filter} cannot apply to this statement kind")]
    Unsupported { filter: &'static str },

    #[error("filter returned a mismatched target kind")]
    TargetMismatch,
}

impl FilterError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ImproperConfiguration
    }
}

/// The filter capability: parameter contribution plus AST (or text)
/// rewriting.
pub trait StatementFilter: std::fmt::Debug + Send + Sync {
    /// Allocate this filter's parameters on the statement's bag,
    /// returning the names chosen, in the order the filter will
    /// reference them.
    fn contribute_parameters(&self, params: &mut ParamBag) -> Vec<String>;

    /// Rewrite the statement using the allocated names.
    fn contribute_ast(
        &self,
        target: FilterTarget,
        names: &[String],
    ) -> Result<FilterTarget, FilterError>;
}

// ============================================================================
// Shared helpers
// ============================================================================

/// AND a predicate onto whatever WHERE-capable statement the target
/// holds.
fn apply_predicate(
    target: FilterTarget,
    filter_name: &'static str,
    predicate: impl Fn(&[String]) -> Expr,
    text_clause: impl Fn(&TextContext) -> String,
    names: &[String],
) -> Result<FilterTarget, FilterError> {
    match target {
        FilterTarget::Ast(ast) => {
            let expr = predicate(names);
            let ast = match ast {
                SqlAst::Select(q) => SqlAst::Select(q.filter(expr)),
                SqlAst::Update(u) => SqlAst::Update(u.filter(expr)),
                SqlAst::Delete(d) => SqlAst::Delete(d.filter(expr)),
                _ => return Err(FilterError::Unsupported {
                    filter: filter_name,
                }),
            };
            Ok(FilterTarget::Ast(ast))
        }
        FilterTarget::Text {
            sql,
            dialect,
            style,
            next_ordinal,
        } => {
            let ctx = TextContext {
                dialect,
                style,
                next_ordinal,
                names: names.to_vec(),
            };
            let clause = text_clause(&ctx);
            let sql = append_where(&sql, &clause);
            Ok(FilterTarget::Text {
                sql,
                dialect,
                style,
                next_ordinal: next_ordinal + names.len(),
            })
        }
    }
}

/// Context for rendering a text-mode clause.
struct TextContext {
    dialect: Dialect,
    style: ParamStyle,
    next_ordinal: usize,
    names: Vec<String>,
}

impl TextContext {
    fn ident(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    /// Render the i-th allocated placeholder in the statement's style.
    fn placeholder(&self, i: usize) -> String {
        self.style.format(&self.names[i], self.next_ordinal + i)
    }
}

fn append_where(sql: &str, clause: &str) -> String {
    if has_top_level_word(sql, "WHERE") {
        format!("{sql} AND {clause}")
    } else {
        format!("{sql} WHERE {clause}")
    }
}

// ============================================================================
// LimitOffset
// ============================================================================

/// Pagination filter: LIMIT/OFFSET (or the dialect's equivalent).
///
/// Bounds are integers under the caller's control, emitted as
/// literals.
#[derive(Debug, Clone, Copy)]
pub struct LimitOffset {
    pub limit: u64,
    pub offset: u64,
}

impl LimitOffset {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }
}

impl StatementFilter for LimitOffset {
    fn contribute_parameters(&self, _params: &mut ParamBag) -> Vec<String> {
        Vec::new()
    }

    fn contribute_ast(
        &self,
        target: FilterTarget,
        _names: &[String],
    ) -> Result<FilterTarget, FilterError> {
        match target {
            FilterTarget::Ast(SqlAst::Select(q)) => Ok(FilterTarget::Ast(SqlAst::Select(
                q.limit(self.limit).offset(self.offset),
            ))),
            FilterTarget::Ast(_) => Err(FilterError::Unsupported {
                filter: "LimitOffset",
            }),
            FilterTarget::Text {
                sql,
                dialect,
                style,
                next_ordinal,
            } => {
                let clause = dialect
                    .emit_limit_offset(Some(self.limit), Some(self.offset))
                    .serialize(dialect);
                Ok(FilterTarget::Text {
                    sql: format!("{sql} {clause}"),
                    dialect,
                    style,
                    next_ordinal,
                })
            }
        }
    }
}

// ============================================================================
// OrderBy
// ============================================================================

/// Ordering filter on a single column.
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field_name: String,
    pub sort_order: SortDir,
}

impl OrderBy {
    pub fn asc(field_name: &str) -> Self {
        Self {
            field_name: field_name.into(),
            sort_order: SortDir::Asc,
        }
    }

    pub fn desc(field_name: &str) -> Self {
        Self {
            field_name: field_name.into(),
            sort_order: SortDir::Desc,
        }
    }
}

impl StatementFilter for OrderBy {
    fn contribute_parameters(&self, _params: &mut ParamBag) -> Vec<String> {
        Vec::new()
    }

    fn contribute_ast(
        &self,
        target: FilterTarget,
        _names: &[String],
    ) -> Result<FilterTarget, FilterError> {
        match target {
            FilterTarget::Ast(SqlAst::Select(mut q)) => {
                let item = match self.sort_order {
                    SortDir::Asc => OrderByExpr::asc(col(&self.field_name)),
                    SortDir::Desc => OrderByExpr::desc(col(&self.field_name)),
                };
                q.order_by.push(item);
                Ok(FilterTarget::Ast(SqlAst::Select(q)))
            }
            FilterTarget::Ast(_) => Err(FilterError::Unsupported { filter: "OrderBy" }),
            FilterTarget::Text {
                sql,
                dialect,
                style,
                next_ordinal,
            } => {
                let ident = dialect.quote_identifier(&self.field_name);
                let dir = match self.sort_order {
                    SortDir::Asc => "ASC",
                    SortDir::Desc => "DESC",
                };
                let sql = if has_top_level_word(&sql, "ORDER") {
                    format!("{sql}, {ident} {dir}")
                } else {
                    format!("{sql} ORDER BY {ident} {dir}")
                };
                Ok(FilterTarget::Text {
                    sql,
                    dialect,
                    style,
                    next_ordinal,
                })
            }
        }
    }
}

// ============================================================================
// Collection filters (IN / NOT IN)
// ============================================================================

/// `WHERE field IN (...)`.
///
/// `values: None` leaves the statement untouched; an empty collection
/// yields an empty result set.
#[derive(Debug, Clone)]
pub struct CollectionFilter {
    pub field_name: String,
    pub values: Option<Vec<Value>>,
}

impl CollectionFilter {
    pub fn new(field_name: &str, values: Option<Vec<Value>>) -> Self {
        Self {
            field_name: field_name.into(),
            values,
        }
    }
}

impl StatementFilter for CollectionFilter {
    fn contribute_parameters(&self, params: &mut ParamBag) -> Vec<String> {
        match &self.values {
            Some(values) => values
                .iter()
                .map(|v| params.add(v.clone(), Some("filter")))
                .collect(),
            None => Vec::new(),
        }
    }

    fn contribute_ast(
        &self,
        target: FilterTarget,
        names: &[String],
    ) -> Result<FilterTarget, FilterError> {
        match &self.values {
            None => Ok(target),
            Some(values) if values.is_empty() => {
                // IN () matches nothing
                apply_predicate(
                    target,
                    "CollectionFilter",
                    |_| crate::sql::expr::lit_bool(false),
                    |ctx| ctx.dialect.format_bool(false).to_string(),
                    names,
                )
            }
            Some(_) => {
                let field = self.field_name.clone();
                apply_predicate(
                    target,
                    "CollectionFilter",
                    move |names| {
                        col(&field).in_list(
                            names
                                .iter()
                                .map(|n| Expr::Placeholder { name: n.clone() })
                                .collect(),
                        )
                    },
                    |ctx| {
                        let markers: Vec<String> =
                            (0..ctx.names.len()).map(|i| ctx.placeholder(i)).collect();
                        format!(
                            "{} IN ({})",
                            ctx.ident(&self.field_name),
                            markers.join(", ")
                        )
                    },
                    names,
                )
            }
        }
    }
}

/// `WHERE field NOT IN (...)`.
///
/// `None` or an empty collection leaves the statement untouched (all
/// rows match).
#[derive(Debug, Clone)]
pub struct NotInCollectionFilter {
    pub field_name: String,
    pub values: Option<Vec<Value>>,
}

impl NotInCollectionFilter {
    pub fn new(field_name: &str, values: Option<Vec<Value>>) -> Self {
        Self {
            field_name: field_name.into(),
            values,
        }
    }
}

impl StatementFilter for NotInCollectionFilter {
    fn contribute_parameters(&self, params: &mut ParamBag) -> Vec<String> {
        match &self.values {
            Some(values) if !values.is_empty() => values
                .iter()
                .map(|v| params.add(v.clone(), Some("filter")))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn contribute_ast(
        &self,
        target: FilterTarget,
        names: &[String],
    ) -> Result<FilterTarget, FilterError> {
        match &self.values {
            Some(values) if !values.is_empty() => {
                let field = self.field_name.clone();
                apply_predicate(
                    target,
                    "NotInCollectionFilter",
                    move |names| {
                        col(&field).not_in_list(
                            names
                                .iter()
                                .map(|n| Expr::Placeholder { name: n.clone() })
                                .collect(),
                        )
                    },
                    |ctx| {
                        let markers: Vec<String> =
                            (0..ctx.names.len()).map(|i| ctx.placeholder(i)).collect();
                        format!(
                            "{} NOT IN ({})",
                            ctx.ident(&self.field_name),
                            markers.join(", ")
                        )
                    },
                    names,
                )
            }
            _ => Ok(target),
        }
    }
}

// ============================================================================
// Search filters (LIKE / NOT LIKE)
// ============================================================================

/// `WHERE field LIKE '%value%'`, optionally across several fields
/// (OR-joined) and case-insensitive.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub field_names: Vec<String>,
    pub value: String,
    pub ignore_case: bool,
}

impl SearchFilter {
    pub fn new(field_name: &str, value: &str) -> Self {
        Self {
            field_names: vec![field_name.into()],
            value: value.into(),
            ignore_case: false,
        }
    }

    pub fn across(field_names: Vec<&str>, value: &str) -> Self {
        Self {
            field_names: field_names.into_iter().map(String::from).collect(),
            value: value.into(),
            ignore_case: false,
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    fn pattern(&self) -> Value {
        Value::String(format!("%{}%", self.value))
    }
}

fn like_predicate(field: &str, name: &str, ignore_case: bool, negated: bool) -> Expr {
    let (lhs, rhs) = if ignore_case {
        (
            crate::sql::expr::func("LOWER", vec![col(field)]),
            crate::sql::expr::func("LOWER", vec![Expr::Placeholder { name: name.into() }]),
        )
    } else {
        (col(field), Expr::Placeholder { name: name.into() })
    };
    let like = lhs.like(rhs);
    if negated {
        like.not()
    } else {
        like
    }
}

fn like_clause(ctx: &TextContext, field: &str, i: usize, ignore_case: bool, negated: bool) -> String {
    let ident = ctx.ident(field);
    let marker = ctx.placeholder(i);
    let not = if negated { "NOT " } else { "" };
    if ignore_case {
        format!("LOWER({ident}) {not}LIKE LOWER({marker})")
    } else {
        format!("{ident} {not}LIKE {marker}")
    }
}

/// OR- or AND-join one LIKE predicate per field. `None` when there are
/// no fields to search.
fn join_like_predicates(
    fields: &[String],
    names: &[String],
    ignore_case: bool,
    negated: bool,
) -> Option<Expr> {
    let mut parts = fields
        .iter()
        .zip(names)
        .map(|(f, n)| like_predicate(f, n, ignore_case, negated));
    let first = parts.next()?;
    let combined = if negated {
        parts.fold(first, |acc, next| acc.and(next))
    } else {
        parts.fold(first, |acc, next| acc.or(next))
    };
    Some(Expr::Paren(Box::new(combined)))
}

impl StatementFilter for SearchFilter {
    fn contribute_parameters(&self, params: &mut ParamBag) -> Vec<String> {
        self.field_names
            .iter()
            .map(|_| params.add(self.pattern(), Some("search")))
            .collect()
    }

    fn contribute_ast(
        &self,
        target: FilterTarget,
        names: &[String],
    ) -> Result<FilterTarget, FilterError> {
        // No fields to search: nothing to contribute
        if self.field_names.is_empty() {
            return Ok(target);
        }
        let fields = self.field_names.clone();
        let ignore_case = self.ignore_case;
        apply_predicate(
            target,
            "SearchFilter",
            move |names| {
                join_like_predicates(&fields, names, ignore_case, false)
                    .unwrap_or_else(|| crate::sql::expr::lit_bool(true))
            },
            |ctx| {
                let parts: Vec<String> = self
                    .field_names
                    .iter()
                    .enumerate()
                    .map(|(i, f)| like_clause(ctx, f, i, self.ignore_case, false))
                    .collect();
                format!("({})", parts.join(" OR "))
            },
            names,
        )
    }
}

/// `WHERE field NOT LIKE '%value%'` across the given fields
/// (AND-joined).
#[derive(Debug, Clone)]
pub struct NotInSearchFilter {
    pub inner: SearchFilter,
}

impl NotInSearchFilter {
    pub fn new(field_name: &str, value: &str) -> Self {
        Self {
            inner: SearchFilter::new(field_name, value),
        }
    }
}

impl StatementFilter for NotInSearchFilter {
    fn contribute_parameters(&self, params: &mut ParamBag) -> Vec<String> {
        self.inner.contribute_parameters(params)
    }

    fn contribute_ast(
        &self,
        target: FilterTarget,
        names: &[String],
    ) -> Result<FilterTarget, FilterError> {
        // No fields to search: nothing to contribute
        if self.inner.field_names.is_empty() {
            return Ok(target);
        }
        let fields = self.inner.field_names.clone();
        let ignore_case = self.inner.ignore_case;
        apply_predicate(
            target,
            "NotInSearchFilter",
            move |names| {
                join_like_predicates(&fields, names, ignore_case, true)
                    .unwrap_or_else(|| crate::sql::expr::lit_bool(true))
            },
            |ctx| {
                let parts: Vec<String> = self
                    .inner
                    .field_names
                    .iter()
                    .enumerate()
                    .map(|(i, f)| like_clause(ctx, f, i, self.inner.ignore_case, true))
                    .collect();
                format!("({})", parts.join(" AND "))
            },
            names,
        )
    }
}

// ============================================================================
// Datetime range filters
// ============================================================================

/// Strict range on a datetime column: `field > after AND field <
/// before`.
#[derive(Debug, Clone)]
pub struct BeforeAfter {
    pub field_name: String,
    pub before: Option<DateTime<Utc>>,
    pub after: Option<DateTime<Utc>>,
}

impl BeforeAfter {
    pub fn new(
        field_name: &str,
        before: Option<DateTime<Utc>>,
        after: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            before,
            after,
        }
    }
}

/// Inclusive range on a datetime column: `field >= on_or_after AND
/// field <= on_or_before`.
#[derive(Debug, Clone)]
pub struct OnBeforeAfter {
    pub field_name: String,
    pub on_or_before: Option<DateTime<Utc>>,
    pub on_or_after: Option<DateTime<Utc>>,
}

impl OnBeforeAfter {
    pub fn new(
        field_name: &str,
        on_or_before: Option<DateTime<Utc>>,
        on_or_after: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            on_or_before,
            on_or_after,
        }
    }
}

fn range_params(
    params: &mut ParamBag,
    before: &Option<DateTime<Utc>>,
    after: &Option<DateTime<Utc>>,
) -> Vec<String> {
    let mut names = Vec::new();
    if let Some(before) = before {
        names.push(params.add(*before, Some("before")));
    }
    if let Some(after) = after {
        names.push(params.add(*after, Some("after")));
    }
    names
}

fn range_filter(
    target: FilterTarget,
    filter_name: &'static str,
    field: &str,
    has_before: bool,
    has_after: bool,
    inclusive: bool,
    names: &[String],
) -> Result<FilterTarget, FilterError> {
    if !has_before && !has_after {
        return Ok(target);
    }
    let field_owned = field.to_string();
    let (before_op, after_op) = if inclusive { ("<=", ">=") } else { ("<", ">") };
    apply_predicate(
        target,
        filter_name,
        move |names| {
            let mut iter = names.iter();
            let mut parts = Vec::new();
            if has_before {
                let name = iter.next().expect("before bound name");
                let ph = Expr::Placeholder { name: name.clone() };
                parts.push(if inclusive {
                    col(&field_owned).lte(ph)
                } else {
                    col(&field_owned).lt(ph)
                });
            }
            if has_after {
                let name = iter.next().expect("after bound name");
                let ph = Expr::Placeholder { name: name.clone() };
                parts.push(if inclusive {
                    col(&field_owned).gte(ph)
                } else {
                    col(&field_owned).gt(ph)
                });
            }
            let mut iter = parts.into_iter();
            let first = iter.next().expect("at least one bound");
            iter.fold(first, |acc, next| acc.and(next))
        },
        |ctx| {
            let ident = ctx.ident(field);
            let mut parts = Vec::new();
            let mut i = 0;
            if has_before {
                parts.push(format!("{ident} {before_op} {}", ctx.placeholder(i)));
                i += 1;
            }
            if has_after {
                parts.push(format!("{ident} {after_op} {}", ctx.placeholder(i)));
            }
            parts.join(" AND ")
        },
        names,
    )
}

impl StatementFilter for BeforeAfter {
    fn contribute_parameters(&self, params: &mut ParamBag) -> Vec<String> {
        range_params(params, &self.before, &self.after)
    }

    fn contribute_ast(
        &self,
        target: FilterTarget,
        names: &[String],
    ) -> Result<FilterTarget, FilterError> {
        range_filter(
            target,
            "BeforeAfter",
            &self.field_name,
            self.before.is_some(),
            self.after.is_some(),
            false,
            names,
        )
    }
}

impl StatementFilter for OnBeforeAfter {
    fn contribute_parameters(&self, params: &mut ParamBag) -> Vec<String> {
        range_params(params, &self.on_or_before, &self.on_or_after)
    }

    fn contribute_ast(
        &self,
        target: FilterTarget,
        names: &[String],
    ) -> Result<FilterTarget, FilterError> {
        range_filter(
            target,
            "OnBeforeAfter",
            &self.field_name,
            self.on_or_before.is_some(),
            self.on_or_after.is_some(),
            true,
            names,
        )
    }
}
