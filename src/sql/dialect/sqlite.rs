//! SQLite dialect.

use super::{ParamStyle, SqlDialect};

/// SQLite dialect.
///
/// Double-quoted identifiers, `?` placeholders, 1/0 booleans.
/// RETURNING and ON CONFLICT are available on modern versions; row
/// locking clauses are not (the whole database locks instead).
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "1"
        } else {
            "0"
        }
    }

    fn placeholder_style(&self) -> ParamStyle {
        ParamStyle::QMark
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        match name.to_uppercase().as_str() {
            "NVL" => Some("IFNULL"),
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
