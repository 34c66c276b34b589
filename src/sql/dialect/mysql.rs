//! MySQL dialect.

use super::{ParamStyle, SqlDialect};

/// MySQL dialect.
///
/// Backtick identifiers, `?` placeholders, 1/0 booleans, CONCAT()
/// instead of `||`, no RETURNING.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
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

    // `||` is logical OR unless PIPES_AS_CONCAT is set.
    fn supports_concat_operator(&self) -> bool {
        false
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        match name.to_uppercase().as_str() {
            "NVL" | "COALESCE" => Some("IFNULL"),
            "STRFTIME" | "TO_CHAR" => Some("DATE_FORMAT"),
            _ => None,
        }
    }

    fn supports_nulls_ordering(&self) -> bool {
        false
    }

    fn supports_select_for_update(&self) -> bool {
        true
    }

    // MySQL 8.0+
    fn supports_skip_locked(&self) -> bool {
        true
    }
}
