//! DuckDB dialect.

use super::{ParamStyle, SqlDialect};

/// DuckDB dialect.
///
/// Postgres-flavored syntax: double-quoted identifiers, `$1`
/// placeholders, RETURNING, ON CONFLICT. No row locking clauses.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn placeholder_style(&self) -> ParamStyle {
        ParamStyle::Numeric
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        match name.to_uppercase().as_str() {
            "NVL" | "IFNULL" => Some("COALESCE"),
            "TO_CHAR" => Some("STRFTIME"),
            _ => None,
        }
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn supports_on_conflict(&self) -> bool {
        true
    }

    fn supports_partial_indexes(&self) -> bool {
        true
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }
}
