//! Fluent DELETE builder.

use crate::pipeline::statement::StatementKind;
use crate::sql::dialect::Dialect;
use crate::sql::dml::Delete;
use crate::sql::expr::Expr;
use crate::sql::optimize::{self, OptimizeFlags};
use crate::sql::SqlAst;
use crate::value::Value;

use super::{
    cte_from_source, render_ast, BuildError, BuildResult, BuiltStatement, CteSource, CteTable,
    IntoPredicate, ParamBag,
};

/// Fluent DELETE builder with implicit parameter capture.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until built"]
pub struct DeleteBuilder {
    ast: Delete,
    params: ParamBag,
    ctes: CteTable,
    flags: OptimizeFlags,
    dialect: Dialect,
    error: Option<BuildError>,
}

impl DeleteBuilder {
    /// Start a DELETE from the given table.
    pub fn from_(table: &str) -> Self {
        Self {
            ast: Delete::from(table),
            params: ParamBag::new(),
            ctes: CteTable::default(),
            flags: OptimizeFlags::default(),
            dialect: Dialect::default(),
            error: None,
        }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.ast = self.ast.schema(schema);
        self
    }

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

    /// Add a USING table.
    pub fn using(mut self, table: &str) -> Self {
        self.ast = self.ast.using(table);
        self
    }

    /// Add a WHERE condition (ANDed with existing conditions).
    pub fn where_(mut self, predicate: impl IntoPredicate) -> Self {
        match predicate.into_predicate(&mut self.params, "where") {
            Ok(expr) => self.ast = self.ast.filter(expr),
            Err(err) => self.set_error(err),
        }
        self
    }

    /// Add a RETURNING projection.
    pub fn returning(mut self, exprs: impl IntoIterator<Item = impl Into<Expr>>) -> Self {
        self.ast = self.ast.returning(exprs);
        self
    }

    /// Bind a named CTE.
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

    fn finished_ast(&self) -> Delete {
        let mut ast = self.ast.clone();
        ast.with = self.ctes.entries().to_vec();
        if self.flags.simplify {
            if let Some(filter) = ast.filter.take() {
                ast.filter = Some(optimize::simplify_predicate(filter));
            }
        }
        ast
    }

    /// Render to `{sql, parameters, dialect}`. Pure and repeatable.
    pub fn build(&self) -> BuildResult<BuiltStatement> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let ast = SqlAst::Delete(self.finished_ast());
        let returning = ast.has_returning();
        let (sql, parameters) = render_ast(&ast, &self.params, self.dialect)?;
        Ok(BuiltStatement {
            sql,
            parameters,
            dialect: self.dialect,
            kind: StatementKind::Delete,
            returning,
        })
    }

    /// Build and promote into a pipeline statement.
    pub fn to_statement(&self) -> BuildResult<crate::pipeline::statement::Statement> {
        self.build().map(BuiltStatement::into_statement)
    }

    /// Decompose into the AST and parameter bag (pipeline entry point).
    pub fn into_parts(self) -> BuildResult<(SqlAst, ParamBag, Dialect)> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let ast = self.finished_ast();
        Ok((SqlAst::Delete(ast), self.params, self.dialect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{col, Expr};
    use crate::sql::query::Query;

    #[test]
    fn test_delete_where() {
        let built = DeleteBuilder::from_("users")
            .where_(("status", "inactive"))
            .build()
            .unwrap();

        assert_eq!(built.sql, "DELETE FROM \"users\" WHERE \"status\" = $1");
        assert_eq!(built.kind, StatementKind::Delete);
    }

    #[test]
    fn test_delete_with_cte_and_returning() {
        let inactive = Query::new().select(vec![col("id")]).from("inactive");
        let built = DeleteBuilder::from_("users")
            .with_cte("inactive_ids", inactive)
            .where_(Expr::InSubquery {
                expr: Box::new(col("id")),
                subquery: Box::new(Query::new().select(vec![col("id")]).from("inactive_ids")),
                negated: false,
            })
            .returning([col("id"), col("email")])
            .build()
            .unwrap();

        assert!(built.sql.starts_with("WITH \"inactive_ids\" AS ("));
        assert!(built.sql.contains("DELETE FROM \"users\""));
        assert!(built.sql.contains("RETURNING \"id\", \"email\""));
        assert!(built.returning);
    }
}
