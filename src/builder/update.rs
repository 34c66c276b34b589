//! Fluent UPDATE builder.

use crate::pipeline::statement::StatementKind;
use crate::sql::dialect::Dialect;
use crate::sql::dml::Update;
use crate::sql::expr::{param, Expr};
use crate::sql::optimize::{self, OptimizeFlags};
use crate::sql::SqlAst;
use crate::value::Value;

use super::{
    cte_from_source, render_ast, BuildError, BuildResult, BuiltStatement, CteSource, CteTable,
    IntoPredicate, ParamBag,
};

/// Fluent UPDATE builder with implicit parameter capture.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until built"]
pub struct UpdateBuilder {
    ast: Update,
    params: ParamBag,
    ctes: CteTable,
    flags: OptimizeFlags,
    dialect: Dialect,
    error: Option<BuildError>,
}

impl UpdateBuilder {
    /// Start an UPDATE of the given table.
    pub fn table(table: &str) -> Self {
        Self {
            ast: Update::table(table),
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

    /// SET column = value, capturing the value.
    pub fn set(mut self, column: &str, value: impl Into<Value>) -> Self {
        let name = self.params.add(value, Some("set"));
        self.ast.set.push((column.into(), param(&name)));
        self
    }

    /// SET column = expression (no capture).
    pub fn set_expr(mut self, column: &str, expr: Expr) -> Self {
        self.ast.set.push((column.into(), expr));
        self
    }

    /// SET many columns from pairs, capturing each value.
    pub fn set_many(mut self, assignments: Vec<(&str, Value)>) -> Self {
        for (column, value) in assignments {
            self = self.set(column, value);
        }
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

    fn finished_ast(&self) -> Update {
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
        let ast = SqlAst::Update(self.finished_ast());
        let returning = ast.has_returning();
        let (sql, parameters) = render_ast(&ast, &self.params, self.dialect)?;
        Ok(BuiltStatement {
            sql,
            parameters,
            dialect: self.dialect,
            kind: StatementKind::Update,
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
        Ok((SqlAst::Update(ast), self.params, self.dialect))
    }
}
