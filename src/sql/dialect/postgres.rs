//! PostgreSQL dialect.

use super::{ParamStyle, SqlDialect};

/// PostgreSQL dialect.
///
/// Double-quoted identifiers, `$1` placeholders, RETURNING, ON CONFLICT,
/// FOR UPDATE SKIP LOCKED, LISTEN/NOTIFY, transactional DDL.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder_style(&self) -> ParamStyle {
        ParamStyle::Numeric
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        match name.to_uppercase().as_str() {
            "NVL" | "IFNULL" => Some("COALESCE"),
            "STRFTIME" => Some("TO_CHAR"),
            _ => None,
        }
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn supports_on_conflict(&self) -> bool {
        true
    }

    fn supports_merge(&self) -> bool {
        true
    }

    fn supports_select_for_update(&self) -> bool {
        true
    }

    fn supports_skip_locked(&self) -> bool {
        true
    }

    fn supports_listen_notify(&self) -> bool {
        true
    }

    fn supports_truncate_cascade(&self) -> bool {
        true
    }

    fn supports_restart_identity(&self) -> bool {
        true
    }

    fn supports_create_schema_authorization(&self) -> bool {
        true
    }

    fn supports_index_method(&self) -> bool {
        true
    }

    fn supports_partial_indexes(&self) -> bool {
        true
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }
}
