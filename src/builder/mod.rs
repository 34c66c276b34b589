//! Fluent statement builders with implicit parameter capture.
//!
//! Every builder owns a [`ParamBag`] (monotonic `param_{n}` naming), a
//! CTE table, optimization flags, and a dialect tag. Fluent methods
//! move the builder, amending its AST; `build()` is pure and
//! repeatable, producing `{sql, parameters, dialect}` with the
//! parameter container shaped by the dialect's preferred placeholder
//! style.
//!
//! Fallible fluent operations (bad operator symbol, duplicate CTE,
//! shape mismatches) defer their error to `build()` so chains stay
//! ergonomic.

pub mod case;
pub mod ddl;
pub mod delete;
pub mod insert;
pub mod merge;
pub mod select;
pub mod update;

pub use self::case::CaseBuilder;
pub use self::ddl::DdlBuilder;
pub use self::delete::DeleteBuilder;
pub use self::insert::InsertBuilder;
pub use self::merge::MergeBuilder;
pub use self::select::SelectBuilder;
pub use self::update::UpdateBuilder;

use std::collections::HashSet;

use thiserror::Error;
use tracing::warn;

use crate::error::ErrorKind;
use crate::pipeline::statement::{Parameters, Statement, StatementKind};
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::expr::{col, param, Expr, ExprExt};
use crate::sql::query::{Cte, CteBody, Query};
use crate::sql::SqlAst;
use crate::value::Value;

/// Result type for builder operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors raised while assembling or building a statement.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    #[error("duplicate CTE alias: {0}")]
    DuplicateCte(String),

    #[error("CTE body for {0} references its own alias")]
    CircularCte(String),

    #[error("unknown operator in predicate: {0}")]
    UnknownOperator(String),

    #[error("INSERT column/value shape mismatch: {columns} columns, {values} values in row {row}")]
    InsertShape {
        columns: usize,
        values: usize,
        row: usize,
    },

    #[error("MERGE insert values supplied without columns")]
    MergeValuesWithoutColumns,

    #[error("MERGE insert column/value shape mismatch: {columns} columns, {values} values")]
    MergeShape { columns: usize, values: usize },

    #[error("no value captured for placeholder {0}")]
    MissingParameter(String),

    #[error("cannot import statement as CTE body: {0}")]
    CteImport(String),

    #[error(transparent)]
    Window(#[from] crate::sql::expr::WindowError),
}

impl BuildError {
    /// Map into the crate-wide error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuildError::DuplicateCte(_) | BuildError::CircularCte(_) => ErrorKind::DuplicateCte,
            BuildError::MissingParameter(_) => ErrorKind::MissingParameter,
            _ => ErrorKind::BuildFailure,
        }
    }
}

// ============================================================================
// Parameter Bag
// ============================================================================

/// A builder's in-progress parameter collection.
///
/// Insertion produces `param_{n}` or `{context}_param_{n}` names from a
/// monotonic counter starting at 0. Names are unique within a bag;
/// collisions resolve with `_1`, `_2`, ... suffixes.
#[derive(Debug, Clone, Default)]
pub struct ParamBag {
    counter: usize,
    entries: Vec<(String, Value)>,
    reserved: HashSet<String>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture a value, returning the generated placeholder name.
    pub fn add(&mut self, value: impl Into<Value>, context: Option<&str>) -> String {
        let base = match context {
            Some(c) => format!("{c}_param_{}", self.counter),
            None => format!("param_{}", self.counter),
        };
        self.counter += 1;
        let name = self.unique_name(base);
        self.entries.push((name.clone(), value.into()));
        name
    }

    /// Capture a value under an explicit name; a reserved name gets a
    /// `_{n}` suffix. Returns the name actually used.
    pub fn insert_named(&mut self, name: &str, value: impl Into<Value>) -> String {
        let name = self.unique_name(name.to_string());
        self.entries.push((name.clone(), value.into()));
        name
    }

    fn unique_name(&self, base: String) -> String {
        if !self.contains(&base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Mark a name as taken without storing a value, so later
    /// captures never collide with it.
    pub fn reserve(&mut self, name: &str) {
        self.reserved.insert(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.reserved.contains(name) || self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Absorb another bag, renaming colliding entries. Returns the
    /// `(old, new)` renames to apply to the imported AST.
    pub fn merge(&mut self, other: ParamBag) -> Vec<(String, String)> {
        let mut renames = Vec::new();
        for (name, value) in other.entries {
            let actual = self.insert_named(&name, value);
            if actual != name {
                renames.push((name, actual));
            }
        }
        renames
    }
}

/// Apply bag-merge renames to an imported query.
pub(crate) fn apply_renames(query: &mut Query, renames: &[(String, String)]) {
    if renames.is_empty() {
        return;
    }
    query.map_placeholders(&mut |name| {
        if let Some((_, new)) = renames.iter().find(|(old, _)| old == name) {
            *name = new.clone();
        }
    });
}

// ============================================================================
// CTE Table
// ============================================================================

/// Named CTEs accumulated by a builder, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct CteTable {
    entries: Vec<Cte>,
}

impl CteTable {
    pub fn insert(&mut self, cte: Cte) -> BuildResult<()> {
        if self.entries.iter().any(|c| c.name == cte.name) {
            return Err(BuildError::DuplicateCte(cte.name));
        }
        if let CteBody::Query(query) = &cte.body {
            let mut tables = Vec::new();
            query.referenced_tables(&mut tables);
            if tables.iter().any(|t| *t == cte.name) {
                return Err(BuildError::CircularCte(cte.name));
            }
        }
        self.entries.push(cte);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Cte] {
        &self.entries
    }

    /// Prepend this table's CTEs to a query's WITH list.
    pub fn apply_to(&self, mut query: Query) -> Query {
        if self.entries.is_empty() {
            return query;
        }
        let mut with = self.entries.clone();
        with.append(&mut query.with);
        query.with = with;
        query
    }
}

// ============================================================================
// CTE Sources
// ============================================================================

/// Sources accepted by a builder's `with_cte`.
pub enum CteSource {
    Query(Query),
    Builder(SelectBuilder),
    Statement(Statement),
    Raw(String),
}

impl From<Query> for CteSource {
    fn from(q: Query) -> Self {
        CteSource::Query(q)
    }
}

impl From<SelectBuilder> for CteSource {
    fn from(b: SelectBuilder) -> Self {
        CteSource::Builder(b)
    }
}

impl From<Statement> for CteSource {
    fn from(stmt: Statement) -> Self {
        CteSource::Statement(stmt)
    }
}

impl From<&str> for CteSource {
    fn from(sql: &str) -> Self {
        CteSource::Raw(sql.into())
    }
}

impl From<String> for CteSource {
    fn from(sql: String) -> Self {
        CteSource::Raw(sql)
    }
}

/// Absorb a sub-builder: its deferred error propagates, its CTEs fold
/// into its query, and its parameters merge into `params` with
/// collision renames applied to the imported AST.
pub(crate) fn absorb(params: &mut ParamBag, sub: SelectBuilder) -> BuildResult<Query> {
    let (mut query, sub_params) = sub.into_import()?;
    let renames = params.merge(sub_params);
    apply_renames(&mut query, &renames);
    Ok(query)
}

/// Resolve a CTE source into a [`Cte`], absorbing builder parameters.
pub(crate) fn cte_from_source(
    params: &mut ParamBag,
    alias: &str,
    source: CteSource,
) -> BuildResult<Cte> {
    Ok(match source {
        CteSource::Query(query) => Cte::new(alias, query),
        CteSource::Raw(sql) => Cte::raw(alias, sql),
        CteSource::Builder(sub) => Cte::new(alias, absorb(params, sub)?),
        CteSource::Statement(stmt) => {
            // A built statement splices in as rendered text; bound
            // parameters cannot be renumbered inside it.
            if !stmt.parameters.is_empty() {
                return Err(BuildError::CteImport(
                    "statement with bound parameters".into(),
                ));
            }
            Cte::raw(alias, stmt.text)
        }
    })
}

// ============================================================================
// Predicate Capture
// ============================================================================

/// Accepted predicate forms for WHERE/HAVING/ON helpers:
///
/// - a trusted raw SQL string,
/// - a `(column, value)` pair (null-aware equality),
/// - a `(column, operator, value)` triple,
/// - an [`Expr`].
///
/// Values are captured through the bag and substituted as placeholders.
pub trait IntoPredicate {
    fn into_predicate(self, params: &mut ParamBag, context: &str) -> BuildResult<Expr>;
}

impl IntoPredicate for Expr {
    fn into_predicate(self, _params: &mut ParamBag, _context: &str) -> BuildResult<Expr> {
        Ok(self)
    }
}

impl IntoPredicate for &str {
    fn into_predicate(self, _params: &mut ParamBag, _context: &str) -> BuildResult<Expr> {
        Ok(Expr::Raw(self.into()))
    }
}

impl<V: Into<Value>> IntoPredicate for (&str, V) {
    fn into_predicate(self, params: &mut ParamBag, context: &str) -> BuildResult<Expr> {
        let (column, value) = self;
        let value = value.into();
        if value.is_null() {
            return Ok(col(column).is_null());
        }
        let name = params.add(value, Some(context));
        Ok(col(column).eq(param(&name)))
    }
}

impl<V: Into<Value>> IntoPredicate for (&str, &str, V) {
    fn into_predicate(self, params: &mut ParamBag, context: &str) -> BuildResult<Expr> {
        let (column, op_symbol, value) = self;
        let op = crate::sql::expr::BinaryOperator::from_symbol(op_symbol)
            .ok_or_else(|| BuildError::UnknownOperator(op_symbol.to_string()))?;
        let name = params.add(value, Some(context));
        Ok(Expr::BinaryOp {
            left: Box::new(col(column)),
            op,
            right: Box::new(param(&name)),
        })
    }
}

// ============================================================================
// Built Statement
// ============================================================================

/// Output of a builder's `build()`: rendered SQL, parameter snapshot,
/// and the dialect it was rendered for.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltStatement {
    pub sql: String,
    pub parameters: Parameters,
    pub dialect: Dialect,
    pub kind: StatementKind,
    pub returning: bool,
}

impl BuiltStatement {
    /// Promote into a pipeline [`Statement`].
    pub fn into_statement(self) -> Statement {
        Statement::new(self.sql, self.parameters, self.dialect, self.kind)
            .with_returning(self.returning)
    }
}

/// Render an AST against a bag, producing SQL plus a parameter
/// container shaped for the dialect's preferred placeholder style.
///
/// Captured-but-unreferenced parameters are logged, not rejected; a
/// referenced placeholder without a captured value is an error.
pub(crate) fn render_ast(
    ast: &SqlAst,
    params: &ParamBag,
    dialect: Dialect,
) -> BuildResult<(String, Parameters)> {
    let tokens = ast.to_tokens_for_dialect(dialect);
    let names = tokens.placeholder_names();
    let sql = tokens.serialize(dialect);

    let name_set: HashSet<&String> = names.iter().collect();
    for (name, _) in params.entries() {
        if !name_set.contains(name) {
            warn!(parameter = %name, "captured parameter is not referenced by the statement");
        }
    }

    let parameters = if names.is_empty() {
        Parameters::None
    } else if dialect.placeholder_style().is_named() {
        for name in &names {
            if params.get(name).is_none() {
                return Err(BuildError::MissingParameter(name.clone()));
            }
        }
        let entries = params
            .entries()
            .iter()
            .filter(|(name, _)| name_set.contains(name))
            .cloned()
            .collect();
        Parameters::Named(entries)
    } else {
        let mut values = Vec::with_capacity(names.len());
        for name in &names {
            match params.get(name) {
                Some(value) => values.push(value.clone()),
                None => return Err(BuildError::MissingParameter(name.clone())),
            }
        }
        Parameters::Positional(values)
    };

    Ok((sql, parameters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::lit_int;

    #[test]
    fn test_param_bag_monotonic_names() {
        let mut bag = ParamBag::new();
        assert_eq!(bag.add(1_i64, None), "param_0");
        assert_eq!(bag.add(2_i64, Some("where")), "where_param_1");
        assert_eq!(bag.add(3_i64, None), "param_2");
        assert_eq!(bag.len(), 3);
    }

    #[test]
    fn test_param_bag_collision_suffix() {
        let mut bag = ParamBag::new();
        assert_eq!(bag.insert_named("name", "a"), "name");
        assert_eq!(bag.insert_named("name", "b"), "name_1");
        assert_eq!(bag.insert_named("name", "c"), "name_2");
    }

    #[test]
    fn test_param_bag_names_stay_unique() {
        let mut bag = ParamBag::new();
        bag.insert_named("param_1", "reserved");
        bag.add(1_i64, None); // param_0
        let second = bag.add(2_i64, None); // would be param_1, suffixed
        assert_eq!(second, "param_1_1");

        let names: Vec<_> = bag.entries().iter().map(|(n, _)| n.clone()).collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
    }

    #[test]
    fn test_param_bag_merge_renames() {
        let mut left = ParamBag::new();
        left.add("a", None); // param_0

        let mut right = ParamBag::new();
        right.add("b", None); // param_0 in its own bag

        let renames = left.merge(right);
        assert_eq!(renames.len(), 1);
        assert_eq!(renames[0].0, "param_0");
        assert_eq!(renames[0].1, "param_0_1");
        assert_eq!(left.len(), 2);
    }

    #[test]
    fn test_cte_table_rejects_duplicates() {
        let mut table = CteTable::default();
        let q = Query::new().select(vec![lit_int(1)]);
        table.insert(Cte::new("a", q.clone())).unwrap();
        let err = table.insert(Cte::new("a", q)).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateCte(_)));
    }

    #[test]
    fn test_cte_table_rejects_self_reference() {
        let mut table = CteTable::default();
        let q = Query::new().select_star().from("walk");
        let err = table.insert(Cte::new("walk", q)).unwrap_err();
        assert!(matches!(err, BuildError::CircularCte(_)));
    }

    #[test]
    fn test_cte_table_preserves_insertion_order() {
        let mut table = CteTable::default();
        table
            .insert(Cte::new("a1", Query::new().select(vec![lit_int(1)])))
            .unwrap();
        table
            .insert(Cte::new("a2", Query::new().select(vec![lit_int(2)])))
            .unwrap();

        let query = table.apply_to(Query::new().select_star().from("a2"));
        assert_eq!(query.with[0].name, "a1");
        assert_eq!(query.with[1].name, "a2");
    }

    #[test]
    fn test_null_aware_equality_predicate() {
        let mut bag = ParamBag::new();
        let pred = ("deleted_at", Value::Null)
            .into_predicate(&mut bag, "where")
            .unwrap();
        assert_eq!(
            pred.to_tokens_for_dialect(Dialect::Postgres)
                .serialize(Dialect::Postgres),
            "\"deleted_at\" IS NULL"
        );
        assert!(bag.is_empty());
    }

    #[test]
    fn test_operator_triple_predicate() {
        let mut bag = ParamBag::new();
        let pred = ("age", ">", 30_i64)
            .into_predicate(&mut bag, "where")
            .unwrap();
        let sql = pred
            .to_tokens_for_dialect(Dialect::Postgres)
            .serialize(Dialect::Postgres);
        assert_eq!(sql, "\"age\" > $1");
        assert_eq!(bag.get("where_param_0"), Some(&Value::Int(30)));
    }

    #[test]
    fn test_unknown_operator_is_an_error() {
        let mut bag = ParamBag::new();
        let err = ("age", "~~~", 30_i64)
            .into_predicate(&mut bag, "where")
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownOperator(_)));
    }
}
