//! DDL builder surface.
//!
//! Thin wrapper over the [`crate::sql::ddl`] roots adding the common
//! builder lifecycle (dialect tag, parameter bag for CTAS source
//! queries, pure `build()`).

use crate::pipeline::statement::StatementKind;
use crate::sql::ddl::{
    CreateIndex, CreateSchema, CreateTableAs, DdlStatement, DropObject, Truncate,
};
use crate::sql::dialect::Dialect;
use crate::sql::SqlAst;

use super::select::SelectBuilder;
use super::{render_ast, BuildError, BuildResult, BuiltStatement, ParamBag};

/// Builder for DDL statements.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until built"]
pub struct DdlBuilder {
    stmt: DdlStatement,
    params: ParamBag,
    dialect: Dialect,
    error: Option<BuildError>,
}

impl DdlBuilder {
    /// CREATE TABLE ... AS SELECT from another builder; its parameters
    /// are absorbed.
    pub fn create_table_as(name: &str, source: SelectBuilder) -> Self {
        let mut params = ParamBag::new();
        match super::absorb(&mut params, source) {
            Ok(query) => Self {
                stmt: DdlStatement::CreateTableAs(CreateTableAs::new(name, query)),
                params,
                dialect: Dialect::default(),
                error: None,
            },
            Err(err) => Self {
                stmt: DdlStatement::CreateTableAs(CreateTableAs::new(
                    name,
                    crate::sql::query::Query::new(),
                )),
                params,
                dialect: Dialect::default(),
                error: Some(err),
            },
        }
    }

    /// Wrap a prepared DDL statement.
    pub fn from_statement(stmt: impl Into<DdlStatement>) -> Self {
        Self {
            stmt: stmt.into(),
            params: ParamBag::new(),
            dialect: Dialect::default(),
            error: None,
        }
    }

    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Render to `{sql, parameters, dialect}`. Pure and repeatable.
    pub fn build(&self) -> BuildResult<BuiltStatement> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let ast = SqlAst::Ddl(self.stmt.clone());
        let (sql, parameters) = render_ast(&ast, &self.params, self.dialect)?;
        Ok(BuiltStatement {
            sql,
            parameters,
            dialect: self.dialect,
            kind: StatementKind::Ddl,
            returning: false,
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
        Ok((SqlAst::Ddl(self.stmt), self.params, self.dialect))
    }
}

impl From<CreateTableAs> for DdlStatement {
    fn from(s: CreateTableAs) -> Self {
        DdlStatement::CreateTableAs(s)
    }
}

impl From<CreateIndex> for DdlStatement {
    fn from(s: CreateIndex) -> Self {
        DdlStatement::CreateIndex(s)
    }
}

impl From<CreateSchema> for DdlStatement {
    fn from(s: CreateSchema) -> Self {
        DdlStatement::CreateSchema(s)
    }
}

impl From<DropObject> for DdlStatement {
    fn from(s: DropObject) -> Self {
        DdlStatement::Drop(s)
    }
}

impl From<Truncate> for DdlStatement {
    fn from(s: Truncate) -> Self {
        DdlStatement::Truncate(s)
    }
}
