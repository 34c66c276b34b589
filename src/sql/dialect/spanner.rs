//! Cloud Spanner dialect (GoogleSQL flavor).

use super::{ParamStyle, SqlDialect};

/// Cloud Spanner dialect.
///
/// Backtick identifiers, `@name` placeholders, true/false booleans.
/// No RETURNING, no ON CONFLICT, no row locking clauses.
#[derive(Debug, Clone, Copy)]
pub struct Spanner;

impl SqlDialect for Spanner {
    fn name(&self) -> &'static str {
        "spanner"
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
            _ => None,
        }
    }
}
