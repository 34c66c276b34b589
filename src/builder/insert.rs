//! Fluent INSERT builder.

use crate::pipeline::statement::StatementKind;
use crate::sql::dialect::Dialect;
use crate::sql::dml::{Insert, OnConflict};
use crate::sql::expr::{param, Expr};
use crate::sql::SqlAst;
use crate::value::Value;

use super::select::SelectBuilder;
use super::{
    absorb, cte_from_source, render_ast, BuildError, BuildResult, BuiltStatement, CteSource,
    CteTable, ParamBag,
};

/// Fluent INSERT builder with implicit parameter capture.
///
/// Row shape is validated against `columns` as rows are added; a
/// mismatch defers to `build()`.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until built"]
pub struct InsertBuilder {
    ast: Insert,
    params: ParamBag,
    ctes: CteTable,
    dialect: Dialect,
    error: Option<BuildError>,
}

impl InsertBuilder {
    /// Start an INSERT into the given table.
    pub fn into(table: &str) -> Self {
        Self {
            ast: Insert::into(table),
            params: ParamBag::new(),
            ctes: CteTable::default(),
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

    /// Capture a value, returning its placeholder name.
    pub fn add_parameter(&mut self, value: impl Into<Value>, context: Option<&str>) -> String {
        self.params.add(value, context)
    }

    fn set_error(&mut self, err: BuildError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Set the column list.
    pub fn columns(mut self, cols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.ast.columns = cols.into_iter().map(|c| c.into()).collect();
        self
    }

    /// Add one row of values, each captured as a parameter.
    pub fn values(mut self, row: Vec<impl Into<Value>>) -> Self {
        let row: Vec<Value> = row.into_iter().map(|v| v.into()).collect();
        if !self.ast.columns.is_empty() && row.len() != self.ast.columns.len() {
            self.set_error(BuildError::InsertShape {
                columns: self.ast.columns.len(),
                values: row.len(),
                row: self.ast.values.len(),
            });
            return self;
        }
        let exprs: Vec<Expr> = row
            .into_iter()
            .map(|v| {
                let name = self.params.add(v, None);
                param(&name)
            })
            .collect();
        self.ast.values.push(exprs);
        self
    }

    /// Add one row from column/value pairs; sets the column list on
    /// first use and validates it afterwards.
    pub fn values_map(mut self, row: Vec<(&str, Value)>) -> Self {
        let keys: Vec<String> = row.iter().map(|(k, _)| k.to_string()).collect();
        if self.ast.columns.is_empty() {
            self.ast.columns = keys.clone();
        } else if self.ast.columns != keys {
            self.set_error(BuildError::InsertShape {
                columns: self.ast.columns.len(),
                values: keys.len(),
                row: self.ast.values.len(),
            });
            return self;
        }
        let exprs: Vec<Expr> = row
            .into_iter()
            .map(|(_, v)| {
                let name = self.params.add(v, None);
                param(&name)
            })
            .collect();
        self.ast.values.push(exprs);
        self
    }

    /// Add many rows of values.
    pub fn values_many(mut self, rows: Vec<Vec<Value>>) -> Self {
        for row in rows {
            self = self.values(row);
        }
        self
    }

    /// INSERT ... SELECT from another builder; its parameters and CTEs
    /// are absorbed.
    pub fn from_select(mut self, source: SelectBuilder) -> Self {
        match absorb(&mut self.params, source) {
            Ok(query) => self.ast.from_query = Some(Box::new(query)),
            Err(err) => self.set_error(err),
        }
        self
    }

    /// ON CONFLICT DO NOTHING.
    pub fn on_conflict_do_nothing(mut self) -> Self {
        self.ast.on_conflict = Some(OnConflict::do_nothing());
        self
    }

    /// ON CONFLICT (columns) DO UPDATE SET assignments, with values
    /// captured as parameters.
    pub fn on_conflict_do_update(
        mut self,
        conflict_columns: Vec<&str>,
        set: Vec<(&str, Value)>,
    ) -> Self {
        let set = set
            .into_iter()
            .map(|(c, v)| {
                let name = self.params.add(v, Some("conflict"));
                (c.to_string(), param(&name))
            })
            .collect::<Vec<_>>();
        self.ast.on_conflict = Some(OnConflict::DoUpdate {
            conflict_columns: conflict_columns.into_iter().map(String::from).collect(),
            set,
        });
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

    fn finished_ast(&self) -> Insert {
        let mut ast = self.ast.clone();
        ast.with = self.ctes.entries().to_vec();
        ast
    }

    /// Render to `{sql, parameters, dialect}`. Pure and repeatable.
    pub fn build(&self) -> BuildResult<BuiltStatement> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let ast = SqlAst::Insert(self.finished_ast());
        let returning = ast.has_returning();
        let (sql, parameters) = render_ast(&ast, &self.params, self.dialect)?;
        Ok(BuiltStatement {
            sql,
            parameters,
            dialect: self.dialect,
            kind: StatementKind::Insert,
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
        Ok((SqlAst::Insert(ast), self.params, self.dialect))
    }
}
