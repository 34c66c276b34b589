//! Test utilities for SQL emission validation.
//!
//! Round-trips emitted SQL through the pipeline's parse validation to
//! catch syntax the renderer should never produce.

use super::dialect::Dialect;
use crate::pipeline::{parse, scanner};

/// Validates that a SQL string parses under the given dialect.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let placeholders = scanner::scan_placeholders(sql);
    parse::validate(sql, &placeholders, dialect)
        .map_err(|e| format!("Invalid SQL for {dialect:?}: {e}\nSQL: {sql}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        validate_sql("SELECT * FROM users", Dialect::Postgres).unwrap();
        validate_sql("SELECT * FROM users", Dialect::MySql).unwrap();
        validate_sql("SELECT * FROM users", Dialect::DuckDb).unwrap();
    }

    #[test]
    fn test_validate_invalid_sql() {
        let result = validate_sql("SELEC * FORM users", Dialect::Postgres);
        assert!(result.is_err());
    }

    #[test]
    fn test_renderer_output_round_trips() {
        use crate::sql::expr::{col, ExprExt};
        use crate::sql::query::Query;

        let query = Query::new()
            .select(vec![col("id")])
            .from("users")
            .filter(col("age").gt(crate::sql::expr::lit_int(18)))
            .limit(10);

        for dialect in [Dialect::Postgres, Dialect::MySql, Dialect::Sqlite, Dialect::DuckDb] {
            validate_sql(&query.to_sql(dialect), dialect).unwrap();
        }
    }
}
