//! BigQuery dialect (GoogleSQL flavor).

use super::{ParamStyle, SqlDialect};

/// BigQuery dialect.
///
/// Backtick identifiers, `@name` placeholders, native MERGE,
/// no RETURNING.
#[derive(Debug, Clone, Copy)]
pub struct BigQuery;

impl SqlDialect for BigQuery {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn placeholder_style(&self) -> ParamStyle {
        ParamStyle::NamedAt
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        match name.to_uppercase().as_str() {
            "NVL" => Some("IFNULL"),
            "STRFTIME" | "TO_CHAR" => Some("FORMAT_TIMESTAMP"),
            "LENGTH" => Some("CHAR_LENGTH"),
            _ => None,
        }
    }

    fn supports_merge(&self) -> bool {
        true
    }
}
