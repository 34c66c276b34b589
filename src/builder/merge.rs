//! Fluent MERGE builder.

use crate::pipeline::statement::StatementKind;
use crate::sql::dialect::Dialect;
use crate::sql::dml::{Merge, MergeAction, WhenClause};
use crate::sql::expr::{param, Expr};
use crate::sql::SqlAst;
use crate::value::Value;

use super::select::SelectBuilder;
use super::{
    absorb, cte_from_source, render_ast, BuildError, BuildResult, BuiltStatement, CteSource,
    CteTable, IntoPredicate, ParamBag,
};

/// Fluent MERGE builder with implicit parameter capture.
///
/// WHEN clauses are repeatable and emitted in call order. Insert
/// column/value shape is validated as clauses are added; a mismatch
/// defers to `build()`.
#[derive(Debug, Clone)]
#[must_use = "builders have no effect until built"]
pub struct MergeBuilder {
    ast: Merge,
    params: ParamBag,
    ctes: CteTable,
    dialect: Dialect,
    error: Option<BuildError>,
}

impl MergeBuilder {
    /// Start a MERGE into the given target table.
    pub fn into(target: &str) -> Self {
        Self {
            ast: Merge::into(target),
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

    pub fn target_alias(mut self, alias: &str) -> Self {
        self.ast = self.ast.target_alias(alias);
        self
    }

    /// USING a source table.
    pub fn using(mut self, table: &str, alias: Option<&str>) -> Self {
        self.ast = self.ast.using_table(table);
        if let Some(alias) = alias {
            self.ast = self.ast.source_alias(alias);
        }
        self
    }

    /// USING a source subquery; its parameters and CTEs are absorbed.
    pub fn using_query(mut self, source: SelectBuilder, alias: Option<&str>) -> Self {
        match absorb(&mut self.params, source) {
            Ok(query) => {
                self.ast = self.ast.using_query(query);
                if let Some(alias) = alias {
                    self.ast = self.ast.source_alias(alias);
                }
            }
            Err(err) => self.set_error(err),
        }
        self
    }

    /// Set the ON condition.
    pub fn on(mut self, predicate: impl IntoPredicate) -> Self {
        match predicate.into_predicate(&mut self.params, "on") {
            Ok(expr) => self.ast = self.ast.on(expr),
            Err(err) => self.set_error(err),
        }
        self
    }

    fn set_error(&mut self, err: BuildError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// WHEN MATCHED [AND cond] THEN UPDATE SET assignments; values are
    /// captured as parameters.
    pub fn when_matched_then_update(
        mut self,
        set: Vec<(&str, Value)>,
        condition: Option<Expr>,
    ) -> Self {
        let assignments = set
            .into_iter()
            .map(|(c, v)| {
                let name = self.params.add(v, Some("merge"));
                (c.to_string(), param(&name))
            })
            .collect();
        self.ast = self.ast.when(WhenClause {
            matched: true,
            condition,
            action: MergeAction::Update { assignments },
        });
        self
    }

    /// WHEN MATCHED [AND cond] THEN DELETE.
    pub fn when_matched_then_delete(mut self, condition: Option<Expr>) -> Self {
        self.ast = self.ast.when(WhenClause {
            matched: true,
            condition,
            action: MergeAction::Delete,
        });
        self
    }

    /// WHEN NOT MATCHED [AND cond] THEN INSERT (columns) VALUES
    /// (values); values are captured as parameters.
    ///
    /// Columns and values must both be absent or of equal length;
    /// values without columns are rejected.
    pub fn when_not_matched_then_insert(
        mut self,
        columns: Option<Vec<&str>>,
        values: Option<Vec<Value>>,
        condition: Option<Expr>,
    ) -> Self {
        let (columns, values) = match (columns, values) {
            (None, Some(_)) => {
                self.set_error(BuildError::MergeValuesWithoutColumns);
                return self;
            }
            (Some(cols), Some(vals)) if cols.len() != vals.len() => {
                self.set_error(BuildError::MergeShape {
                    columns: cols.len(),
                    values: vals.len(),
                });
                return self;
            }
            (Some(cols), Some(vals)) => (cols, vals),
            (Some(cols), None) => {
                // Columns without values: insert the source columns of
                // the same names.
                let values = cols
                    .iter()
                    .map(|&c| crate::sql::expr::col(c))
                    .collect::<Vec<_>>();
                self.ast = self.ast.when(WhenClause {
                    matched: false,
                    condition,
                    action: MergeAction::Insert {
                        columns: cols.into_iter().map(String::from).collect(),
                        values,
                    },
                });
                return self;
            }
            (None, None) => {
                self.ast = self.ast.when(WhenClause {
                    matched: false,
                    condition,
                    action: MergeAction::Insert {
                        columns: Vec::new(),
                        values: Vec::new(),
                    },
                });
                return self;
            }
        };

        let captured = values
            .into_iter()
            .map(|v| {
                let name = self.params.add(v, Some("merge"));
                param(&name)
            })
            .collect();
        self.ast = self.ast.when(WhenClause {
            matched: false,
            condition,
            action: MergeAction::Insert {
                columns: columns.into_iter().map(String::from).collect(),
                values: captured,
            },
        });
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

    fn finished_ast(&self) -> Merge {
        let mut ast = self.ast.clone();
        ast.with = self.ctes.entries().to_vec();
        ast
    }

    /// Render to `{sql, parameters, dialect}`. Pure and repeatable.
    pub fn build(&self) -> BuildResult<BuiltStatement> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let ast = SqlAst::Merge(self.finished_ast());
        let (sql, parameters) = render_ast(&ast, &self.params, self.dialect)?;
        Ok(BuiltStatement {
            sql,
            parameters,
            dialect: self.dialect,
            kind: StatementKind::Merge,
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
        let ast = self.finished_ast();
        Ok((SqlAst::Merge(ast), self.params, self.dialect))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::expr::{col, ExprExt};

    #[test]
    fn test_merge_full_shape() {
        let built = MergeBuilder::into("dim_customers")
            .dialect(Dialect::Oracle)
            .target_alias("tgt")
            .using("staging_customers", Some("src"))
            .on(col("tgt.id").eq(col("src.id")))
            .when_matched_then_update(vec![("name", Value::String("x".into()))], None)
            .when_not_matched_then_insert(
                Some(vec!["id", "name"]),
                Some(vec![Value::Int(1), Value::String("x".into())]),
                None,
            )
            .build()
            .unwrap();

        assert!(built.sql.starts_with("MERGE INTO"));
        assert!(built.sql.contains("WHEN MATCHED THEN UPDATE SET"));
        assert!(built.sql.contains("WHEN NOT MATCHED THEN INSERT"));
        assert_eq!(built.kind, StatementKind::Merge);
        assert_eq!(built.parameters.len(), 3);
    }

    #[test]
    fn test_merge_values_without_columns_rejected() {
        let err = MergeBuilder::into("t")
            .using("s", None)
            .on(col("t.id").eq(col("s.id")))
            .when_not_matched_then_insert(None, Some(vec![Value::Int(1)]), None)
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::MergeValuesWithoutColumns));
    }

    #[test]
    fn test_merge_shape_mismatch_rejected() {
        let err = MergeBuilder::into("t")
            .using("s", None)
            .on(col("t.id").eq(col("s.id")))
            .when_not_matched_then_insert(
                Some(vec!["a", "b"]),
                Some(vec![Value::Int(1)]),
                None,
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::MergeShape { .. }));
    }

    #[test]
    fn test_merge_columns_without_values_uses_source_columns() {
        let built = MergeBuilder::into("t")
            .using("s", Some("src"))
            .on(col("t.id").eq(col("src.id")))
            .when_not_matched_then_insert(Some(vec!["id"]), None, None)
            .build()
            .unwrap();
        assert!(built.sql.contains("INSERT (\"id\") VALUES (\"id\")"));
    }
}
