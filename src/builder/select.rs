//! Fluent SELECT builder.

use crate::pipeline::statement::StatementKind;
use crate::sql::dialect::Dialect;
use crate::sql::expr::{
    self, col, lit_str, Expr, ExprExt, WindowFrame, WindowOrderBy,
};
use crate::sql::optimize::{self, OptimizeFlags};
use crate::sql::query::{Cte, FromItem, JoinType, OrderByExpr, Query, SelectExpr, TableRef};
use crate::sql::SqlAst;
use crate::value::Value;

use super::case::CaseBuilder;
use super::{
    absorb, cte_from_source, render_ast, BuildError, BuildResult, BuiltStatement, CteSource,
    CteTable, IntoPredicate, ParamBag,
};

/// Fluent SELECT builder.
///
/// Moves through each fluent call; terminal [`build`](Self::build) is
/// pure and repeatable. Fallible operations defer their error to
/// `build()`.
#[derive(Debug, Clone, Default)]
#[must_use = "builders have no effect until built"]
pub struct SelectBuilder {
    query: Query,
    params: ParamBag,
    ctes: CteTable,
    flags: OptimizeFlags,
    dialect: Dialect,
    error: Option<BuildError>,
}

impl SelectBuilder {
    /// Create an empty SELECT builder for the default dialect.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target dialect.
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Enable transform passes applied at build time.
    pub fn optimize(mut self, flags: OptimizeFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Capture a value, returning its placeholder name.
    pub fn add_parameter(&mut self, value: impl Into<Value>, context: Option<&str>) -> String {
        self.params.add(value, context)
    }

    fn set_error(&mut self, err: BuildError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    // =========================================================================
    // Projection
    // =========================================================================

    /// Set the SELECT list.
    pub fn select(mut self, cols: Vec<impl Into<SelectExpr>>) -> Self {
        self.query = self.query.select(cols);
        self
    }

    /// Append one item to the SELECT list.
    pub fn select_also(mut self, expr: impl Into<SelectExpr>) -> Self {
        self.query = self.query.select_also(expr);
        self
    }

    /// SELECT *
    pub fn select_star(mut self) -> Self {
        self.query = self.query.select_star();
        self
    }

    /// Add DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.query = self.query.distinct();
        self
    }

    // =========================================================================
    // FROM / JOIN
    // =========================================================================

    /// Set the FROM item (table name, table ref, or CTE name).
    pub fn from_(mut self, item: impl Into<FromItem>) -> Self {
        self.query = self.query.from(item);
        self
    }

    /// FROM a derived table built by another builder; its parameters
    /// and CTEs are absorbed.
    pub fn from_subquery(mut self, sub: SelectBuilder, alias: &str) -> Self {
        match self.import_builder(sub) {
            Ok(query) => {
                self.query = self.query.clone().from(FromItem::subquery(query, alias));
            }
            Err(err) => self.set_error(err),
        }
        self
    }

    /// Add a JOIN of the given kind.
    pub fn join(
        mut self,
        table: impl Into<TableRef>,
        on: impl IntoPredicate,
        kind: JoinType,
    ) -> Self {
        let table = table.into();
        if kind == JoinType::Cross {
            self.query = self.query.cross_join(table);
            return self;
        }
        match on.into_predicate(&mut self.params, "join") {
            Ok(predicate) => {
                self.query = self.query.join(kind, table, predicate);
            }
            Err(err) => self.set_error(err),
        }
        self
    }

    pub fn inner_join(self, table: impl Into<TableRef>, on: impl IntoPredicate) -> Self {
        self.join(table, on, JoinType::Inner)
    }

    pub fn left_join(self, table: impl Into<TableRef>, on: impl IntoPredicate) -> Self {
        self.join(table, on, JoinType::Left)
    }

    pub fn right_join(self, table: impl Into<TableRef>, on: impl IntoPredicate) -> Self {
        self.join(table, on, JoinType::Right)
    }

    pub fn full_join(self, table: impl Into<TableRef>, on: impl IntoPredicate) -> Self {
        self.join(table, on, JoinType::Full)
    }

    pub fn cross_join(mut self, table: impl Into<TableRef>) -> Self {
        self.query = self.query.cross_join(table.into());
        self
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn where_(mut self, predicate: impl IntoPredicate) -> Self {
        match predicate.into_predicate(&mut self.params, "where") {
            Ok(expr) => self.query = self.query.filter(expr),
            Err(err) => self.set_error(err),
        }
        self
    }

    /// WHERE column IN (values), capturing each value.
    pub fn where_in(mut self, column: &str, values: Vec<impl Into<Value>>) -> Self {
        let exprs = values
            .into_iter()
            .map(|v| {
                let name = self.params.add(v, Some("where"));
                expr::param(&name)
            })
            .collect();
        self.query = self.query.filter(col(column).in_list(exprs));
        self
    }

    /// Set the GROUP BY clause.
    pub fn group_by(mut self, cols: Vec<Expr>) -> Self {
        self.query = self.query.group_by(cols);
        self
    }

    /// Wrap GROUP BY in ROLLUP.
    pub fn rollup(mut self) -> Self {
        self.query = self.query.rollup();
        self
    }

    /// Set the HAVING clause.
    pub fn having(mut self, predicate: impl IntoPredicate) -> Self {
        match predicate.into_predicate(&mut self.params, "having") {
            Ok(expr) => self.query = self.query.having(expr),
            Err(err) => self.set_error(err),
        }
        self
    }

    // =========================================================================
    // Ordering and pagination
    // =========================================================================

    pub fn order_by(mut self, items: Vec<OrderByExpr>) -> Self {
        self.query = self.query.order_by(items);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.query = self.query.limit(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.query = self.query.offset(n);
        self
    }

    /// FOR UPDATE row locking.
    pub fn for_update(mut self) -> Self {
        self.query = self.query.for_update();
        self
    }

    /// FOR UPDATE SKIP LOCKED.
    pub fn skip_locked(mut self) -> Self {
        self.query = self.query.skip_locked();
        self
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    pub fn count(mut self, column: &str, alias: &str) -> Self {
        self.query = self.query.select_also(expr::count(col(column)).alias(alias));
        self
    }

    pub fn count_star(mut self, alias: &str) -> Self {
        self.query = self.query.select_also(expr::count_star().alias(alias));
        self
    }

    pub fn count_distinct(mut self, column: &str, alias: &str) -> Self {
        self.query = self
            .query
            .select_also(expr::count_distinct(col(column)).alias(alias));
        self
    }

    pub fn sum(mut self, column: &str, alias: &str) -> Self {
        self.query = self.query.select_also(expr::sum(col(column)).alias(alias));
        self
    }

    pub fn avg(mut self, column: &str, alias: &str) -> Self {
        self.query = self.query.select_also(expr::avg(col(column)).alias(alias));
        self
    }

    pub fn min(mut self, column: &str, alias: &str) -> Self {
        self.query = self.query.select_also(expr::min(col(column)).alias(alias));
        self
    }

    pub fn max(mut self, column: &str, alias: &str) -> Self {
        self.query = self.query.select_also(expr::max(col(column)).alias(alias));
        self
    }

    // =========================================================================
    // Windows, CASE, pivot
    // =========================================================================

    /// Append a window function to the SELECT list.
    pub fn window(
        mut self,
        function: Expr,
        partition_by: Vec<Expr>,
        order_by: Vec<WindowOrderBy>,
        frame: Option<WindowFrame>,
        alias: Option<&str>,
    ) -> Self {
        let mut builder = expr::WindowBuilder::new(function)
            .partition_by(partition_by)
            .order_by(order_by);
        if let Some(frame) = frame {
            builder = builder.frame(frame);
        }
        match builder.build() {
            Ok(windowed) => {
                let item = match alias {
                    Some(a) => windowed.alias(a),
                    None => SelectExpr::new(windowed),
                };
                self.query = self.query.select_also(item);
            }
            Err(err) => self.set_error(err.into()),
        }
        self
    }

    /// Start a CASE expression whose values are captured on this
    /// builder's parameter bag.
    pub fn case(&mut self) -> CaseBuilder<'_> {
        CaseBuilder::new(&mut self.params)
    }

    /// Pivot: one aggregated column per pivot value, emulated with
    /// CASE so it renders on every dialect.
    pub fn pivot(
        mut self,
        aggregate: &str,
        value_column: &str,
        pivot_column: &str,
        pivot_values: Vec<&str>,
    ) -> Self {
        for value in pivot_values {
            let case = Expr::Case {
                operand: None,
                when_clauses: vec![(col(pivot_column).eq(lit_str(value)), col(value_column))],
                else_clause: None,
            };
            self.query = self
                .query
                .select_also(expr::func(aggregate, vec![case]).alias(value));
        }
        self
    }

    /// Unpivot: fold the named columns into `(name, value)` rows via
    /// UNION ALL branches over the current FROM item.
    pub fn unpivot(mut self, name_alias: &str, value_alias: &str, columns: Vec<&str>) -> Self {
        let Some(from) = self.query.from.clone() else {
            self.set_error(BuildError::CteImport(
                "unpivot requires a FROM item".into(),
            ));
            return self;
        };

        let mut branches = columns.into_iter().map(|c| {
            Query::new()
                .select(vec![
                    lit_str(c).alias(name_alias),
                    col(c).alias(value_alias),
                ])
                .from(from.clone())
        });

        let Some(first) = branches.next() else {
            return self;
        };
        let combined = branches.fold(first, |acc, next| acc.union_all(next).into_query());
        self.query = combined;
        self
    }

    // =========================================================================
    // Set operations
    // =========================================================================

    pub fn union(self, other: SelectBuilder) -> Self {
        self.combine(other, |left, right| left.union(right).into_query())
    }

    pub fn union_all(self, other: SelectBuilder) -> Self {
        self.combine(other, |left, right| left.union_all(right).into_query())
    }

    pub fn intersect(self, other: SelectBuilder) -> Self {
        self.combine(other, |left, right| left.intersect(right).into_query())
    }

    pub fn except_(self, other: SelectBuilder) -> Self {
        self.combine(other, |left, right| left.except(right).into_query())
    }

    fn combine(mut self, other: SelectBuilder, op: impl FnOnce(Query, Query) -> Query) -> Self {
        match self.import_builder(other) {
            Ok(right) => {
                let left = std::mem::take(&mut self.query);
                self.query = op(left, right);
            }
            Err(err) => self.set_error(err),
        }
        self
    }

    // =========================================================================
    // CTEs
    // =========================================================================

    /// Bind a named CTE. The source may be another builder (parameters
    /// absorbed), a structured query, a built statement, or SQL text.
    pub fn with_cte(mut self, alias: &str, source: impl Into<CteSource>) -> Self {
        match cte_from_source(&mut self.params, alias, source.into()) {
            Ok(cte) => {
                if let Err(err) = self.ctes.insert(cte) {
                    self.set_error(err);
                }
            }
            Err(err) => self.set_error(err),
        }
        self
    }

    /// Bind a named recursive CTE.
    pub fn with_recursive_cte(mut self, alias: &str, query: Query) -> Self {
        if let Err(err) = self.ctes.insert(Cte::recursive(alias, query)) {
            self.set_error(err);
        }
        self
    }

    fn import_builder(&mut self, other: SelectBuilder) -> BuildResult<Query> {
        absorb(&mut self.params, other)
    }

    /// Decompose into the CTE-folded query and parameter bag, for
    /// absorption into another builder.
    pub(crate) fn into_import(self) -> BuildResult<(Query, ParamBag)> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok((self.ctes.apply_to(self.query), self.params))
    }

    // =========================================================================
    // Terminal operations
    // =========================================================================

    /// Render to `{sql, parameters, dialect}`. Pure; may be called
    /// repeatedly.
    pub fn build(&self) -> BuildResult<BuiltStatement> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let query = self.ctes.apply_to(self.query.clone());
        let query = optimize::apply_all(query, &self.flags);
        let ast = SqlAst::Select(query);
        let (sql, parameters) = render_ast(&ast, &self.params, self.dialect)?;
        Ok(BuiltStatement {
            sql,
            parameters,
            dialect: self.dialect,
            kind: StatementKind::Select,
            returning: false,
        })
    }

    /// Build and promote into a pipeline statement.
    pub fn to_statement(&self) -> BuildResult<crate::pipeline::statement::Statement> {
        self.build().map(BuiltStatement::into_statement)
    }

    /// Decompose into the optimized AST and parameter bag (pipeline
    /// entry point; filters still apply on this form).
    pub fn into_parts(self) -> BuildResult<(SqlAst, ParamBag, Dialect)> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let query = self.ctes.apply_to(self.query);
        let query = optimize::apply_all(query, &self.flags);
        Ok((SqlAst::Select(query), self.params, self.dialect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::statement::Parameters;
    use crate::sql::expr::lit_int;

    #[test]
    fn test_basic_select_with_captured_params() {
        let built = SelectBuilder::new()
            .select(vec![col("id"), col("name")])
            .from_("users")
            .where_(("name", "Ada"))
            .where_(("age", ">", 30_i64))
            .build()
            .unwrap();

        assert!(built.sql.contains("WHERE \"name\" = $1 AND \"age\" > $2"));
        assert_eq!(
            built.parameters,
            Parameters::Positional(vec![Value::String("Ada".into()), Value::Int(30)])
        );
        assert_eq!(built.kind, StatementKind::Select);
    }

    #[test]
    fn test_named_container_for_named_styles() {
        let built = SelectBuilder::new()
            .dialect(Dialect::Oracle)
            .select(vec![col("id")])
            .from_("users")
            .where_(("name", "Ada"))
            .build()
            .unwrap();

        assert!(built.sql.contains(":where_param_0"));
        assert_eq!(
            built.parameters,
            Parameters::Named(vec![("where_param_0".into(), Value::String("Ada".into()))])
        );
    }

    #[test]
    fn test_build_is_repeatable() {
        let builder = SelectBuilder::new()
            .select(vec![col("id")])
            .from_("t")
            .where_(("x", 1_i64));

        let a = builder.build().unwrap();
        let b = builder.build().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_cte_is_deferred_to_build() {
        let q = Query::new().select(vec![lit_int(1)]);
        let err = SelectBuilder::new()
            .select_star()
            .from_("a")
            .with_cte("a", q.clone())
            .with_cte("a", q)
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateCte(_)));
    }

    #[test]
    fn test_cte_insertion_order_in_sql() {
        let built = SelectBuilder::new()
            .with_cte("one", Query::new().select(vec![lit_int(1)]))
            .with_cte("two", Query::new().select(vec![lit_int(2)]))
            .select_star()
            .from_("two")
            .build()
            .unwrap();

        let one = built.sql.find("\"one\"").unwrap();
        let two = built.sql.find("\"two\"").unwrap();
        assert!(one < two);
    }

    #[test]
    fn test_subquery_import_renames_collisions() {
        let mut outer = SelectBuilder::new()
            .select_star()
            .from_("users")
            .where_(("status", "active"));

        let inner = SelectBuilder::new()
            .select(vec![col("user_id")])
            .from_("orders")
            .where_(("total", ">", 100_i64));

        outer = outer.where_in("id", vec![0_i64]);
        let built = outer.from_subquery(inner, "o").build().unwrap();

        // status + id-in + imported total, all placeholders distinct
        if let Parameters::Positional(values) = &built.parameters {
            assert_eq!(values.len(), 3);
        } else {
            panic!("expected positional parameters");
        }
        assert!(built.sql.matches('$').count() >= 3);
    }

    #[test]
    fn test_union_merges_params() {
        let left = SelectBuilder::new()
            .select(vec![col("id")])
            .from_("a")
            .where_(("x", 1_i64));
        let right = SelectBuilder::new()
            .select(vec![col("id")])
            .from_("b")
            .where_(("y", 2_i64));

        let built = left.union_all(right).build().unwrap();
        assert!(built.sql.contains("UNION ALL"));
        assert_eq!(
            built.parameters,
            Parameters::Positional(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_case_captures_on_parent() {
        let mut builder = SelectBuilder::new();
        let case_expr = builder
            .case()
            .when(col("score").gte(lit_int(90)), "A")
            .when(col("score").gte(lit_int(80)), "B")
            .else_("F")
            .end();

        let built = builder
            .select(vec![SelectExpr::new(case_expr).with_alias("grade")])
            .from_("tests")
            .build()
            .unwrap();

        assert!(built.sql.contains("CASE WHEN"));
        if let Parameters::Positional(values) = &built.parameters {
            assert_eq!(values.len(), 3);
        } else {
            panic!("expected positional parameters");
        }
    }

    #[test]
    fn test_pivot_emulation() {
        let built = SelectBuilder::new()
            .select(vec![col("region")])
            .from_("sales")
            .pivot("SUM", "amount", "quarter", vec!["q1", "q2"])
            .group_by(vec![col("region")])
            .build()
            .unwrap();

        assert!(built.sql.contains("SUM(CASE WHEN \"quarter\" = 'q1' THEN \"amount\" END)"));
        assert!(built.sql.contains("AS \"q2\""));
    }

    #[test]
    fn test_unpivot_builds_union_branches() {
        let built = SelectBuilder::new()
            .from_("metrics")
            .unpivot("metric", "value", vec!["clicks", "views"])
            .build()
            .unwrap();

        assert!(built.sql.contains("UNION ALL"));
        assert!(built.sql.contains("'clicks'"));
        assert!(built.sql.contains("'views'"));
    }

    #[test]
    fn test_window_helper() {
        let built = SelectBuilder::new()
            .select(vec![col("region"), col("amount")])
            .from_("sales")
            .window(
                expr::sum(col("amount")),
                vec![col("region")],
                vec![WindowOrderBy::asc(col("month"))],
                None,
                Some("running_total"),
            )
            .build()
            .unwrap();

        assert!(built.sql.contains("OVER (PARTITION BY \"region\" ORDER BY \"month\" ASC)"));
        assert!(built.sql.contains("AS \"running_total\""));
    }

    #[test]
    fn test_window_frame_without_order_by_defers_to_build() {
        let err = SelectBuilder::new()
            .select(vec![col("region")])
            .from_("sales")
            .window(
                expr::sum(col("amount")),
                vec![col("region")],
                vec![],
                Some(crate::sql::expr::WindowFrame::rows_to_current()),
                None,
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::Window(_)));
    }

    #[test]
    fn test_optimize_flag_applies() {
        let built = SelectBuilder::new()
            .select_star()
            .from_("t")
            .where_(crate::sql::expr::lit_bool(true).and(col("x").eq(lit_int(1))))
            .optimize(OptimizeFlags {
                simplify: true,
                ..Default::default()
            })
            .build()
            .unwrap();

        assert!(!built.sql.contains("TRUE AND"));
    }

    #[test]
    fn test_skip_locked_builder_surface() {
        let built = SelectBuilder::new()
            .select(vec![col("event_id")])
            .from_("event_queue")
            .where_(("channel", "orders"))
            .order_by(vec![OrderByExpr::asc(col("available_at"))])
            .limit(1)
            .skip_locked()
            .build()
            .unwrap();

        assert!(built.sql.ends_with("FOR UPDATE SKIP LOCKED"));
    }
}
