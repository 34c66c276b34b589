//! Dialect-tagged parse validation for raw SQL text.
//!
//! Placeholders are normalized to `?` before parsing (the scanner owns
//! placeholder syntax; the parser owns everything else), so styles the
//! parser's dialects do not tokenize still validate.

use sqlparser::dialect::{
    AnsiDialect, BigQueryDialect, DuckDbDialect, GenericDialect, MySqlDialect, PostgreSqlDialect,
    SQLiteDialect,
};
use sqlparser::parser::Parser;

use crate::sql::dialect::Dialect;

use super::scanner::{self, PlaceholderToken};

/// Map a rendering dialect to a parser dialect.
pub(crate) fn parser_dialect(dialect: Dialect) -> Box<dyn sqlparser::dialect::Dialect> {
    match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
        Dialect::BigQuery => Box::new(BigQueryDialect {}),
        // No Oracle or Spanner dialect upstream; closest grammars
        Dialect::Oracle => Box::new(GenericDialect {}),
        Dialect::Spanner => Box::new(BigQueryDialect {}),
        Dialect::Ansi => Box::new(AnsiDialect {}),
    }
}

/// Validate that `sql` (with the given placeholder inventory) parses
/// under `dialect`. The error message carries the parser's location
/// hint; it never includes parameter values.
pub(crate) fn validate(
    sql: &str,
    placeholders: &[PlaceholderToken],
    dialect: Dialect,
) -> Result<(), String> {
    let normalized = scanner::rewrite_placeholders(sql, placeholders, |_, _| "?".into());
    Parser::parse_sql(&*parser_dialect(dialect), &normalized)
        .map(|_| ())
        .map_err(|e| e.to_string())
}
