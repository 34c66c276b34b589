//! ANSI SQL reference dialect.

use super::{ParamStyle, SqlDialect};

/// ANSI SQL dialect.
///
/// The reference implementation: double-quoted identifiers, `?`
/// placeholders, standard MERGE. Real engines rarely speak pure ANSI;
/// this dialect exists as a conservative default and for tests.
#[derive(Debug, Clone, Copy)]
pub struct Ansi;

impl SqlDialect for Ansi {
    fn name(&self) -> &'static str {
        "ansi"
    }

    fn placeholder_style(&self) -> ParamStyle {
        ParamStyle::QMark
    }

    fn supports_merge(&self) -> bool {
        true
    }

    fn supports_create_schema_authorization(&self) -> bool {
        true
    }
}
