//! Oracle dialect.

use super::{ParamStyle, SqlDialect};
use crate::sql::token::{Token, TokenStream};

/// Oracle dialect.
///
/// Double-quoted identifiers, `:name` placeholders, 1/0 booleans,
/// OFFSET ... FETCH pagination, native MERGE, FOR UPDATE SKIP LOCKED.
#[derive(Debug, Clone, Copy)]
pub struct Oracle;

impl SqlDialect for Oracle {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "1"
        } else {
            "0"
        }
    }

    fn placeholder_style(&self) -> ParamStyle {
        ParamStyle::NamedColon
    }

    /// Oracle 12c+ pagination: `OFFSET n ROWS FETCH NEXT m ROWS ONLY`.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        let mut ts = TokenStream::new();

        if let Some(off) = offset {
            ts.push(Token::Offset)
                .space()
                .push(Token::LitInt(off as i64))
                .space()
                .push(Token::Rows);
        }

        if let Some(lim) = limit {
            if offset.is_some() {
                ts.space();
            }
            ts.push(Token::Fetch)
                .space()
                .push(Token::Next)
                .space()
                .push(Token::LitInt(lim as i64))
                .space()
                .push(Token::Rows)
                .space()
                .push(Token::Only);
        }

        ts
    }

    // Oracle spells recursive CTEs as plain WITH.
    fn emit_recursive_keyword(&self) -> bool {
        false
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        match name.to_uppercase().as_str() {
            "IFNULL" | "COALESCE" => Some("NVL"),
            "STRFTIME" => Some("TO_CHAR"),
            _ => None,
        }
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
}
