//! SQL dialect definitions and formatting rules.
//!
//! Each dialect implements [`SqlDialect`] to handle its syntax:
//!
//! - Identifier quoting: `"` (ANSI/Postgres/SQLite/DuckDB/Oracle),
//!   `` ` `` (MySQL/BigQuery/Spanner)
//! - Preferred placeholder style: `$1`, `?`, `:name`, `@name`
//! - Pagination: LIMIT/OFFSET vs OFFSET ... FETCH
//! - Boolean literals: true/false vs 1/0
//! - Feature flags consumed by the renderer and the durable queue
//!   (RETURNING, ON CONFLICT, FOR UPDATE SKIP LOCKED, LISTEN/NOTIFY)

mod ansi;
mod bigquery;
mod duckdb;
mod mysql;
mod oracle;
mod postgres;
mod spanner;
mod sqlite;

pub use ansi::Ansi;
pub use bigquery::BigQuery;
pub use duckdb::DuckDb;
pub use mysql::MySql;
pub use oracle::Oracle;
pub use postgres::Postgres;
pub use spanner::Spanner;
pub use sqlite::Sqlite;

use super::token::TokenStream;

// =============================================================================
// Parameter Styles
// =============================================================================

/// The syntactic family of placeholders a driver accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamStyle {
    /// `?`
    QMark,
    /// `$1`, `$2`, ...
    Numeric,
    /// `:name`
    NamedColon,
    /// `@name`
    NamedAt,
    /// `$name`
    NamedDollar,
    /// `%s` / `%(name)s`
    Format,
}

impl ParamStyle {
    /// Whether parameters for this style are carried in a name-keyed map.
    ///
    /// Positional styles carry an ordered list instead.
    pub fn is_named(&self) -> bool {
        matches!(
            self,
            ParamStyle::NamedColon | ParamStyle::NamedAt | ParamStyle::NamedDollar
        )
    }

    /// Render a placeholder in this style.
    ///
    /// `ordinal` is 1-based and only meaningful for positional styles.
    pub fn format(&self, name: &str, ordinal: usize) -> String {
        match self {
            ParamStyle::QMark => "?".into(),
            ParamStyle::Numeric => format!("${ordinal}"),
            ParamStyle::NamedColon => format!(":{name}"),
            ParamStyle::NamedAt => format!("@{name}"),
            ParamStyle::NamedDollar => format!("${name}"),
            ParamStyle::Format => "%s".into(),
        }
    }
}

impl std::fmt::Display for ParamStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParamStyle::QMark => "qmark",
            ParamStyle::Numeric => "numeric",
            ParamStyle::NamedColon => "named_colon",
            ParamStyle::NamedAt => "named_at",
            ParamStyle::NamedDollar => "named_dollar",
            ParamStyle::Format => "format",
        };
        write!(f, "{name}")
    }
}

// =============================================================================
// Dialect Trait
// =============================================================================

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// Default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Quote a string literal.
    ///
    /// All dialects in this set use single quotes with `''` escaping.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    /// The placeholder style this dialect's drivers expect.
    fn placeholder_style(&self) -> ParamStyle;

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit LIMIT/OFFSET or the dialect's equivalent.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        use super::token::Token;

        let mut ts = TokenStream::new();

        if let Some(lim) = limit {
            ts.push(Token::Limit)
                .space()
                .push(Token::LitInt(lim as i64));
        }

        if let Some(off) = offset {
            if limit.is_some() {
                ts.space();
            }
            ts.push(Token::Offset)
                .space()
                .push(Token::LitInt(off as i64));
        }

        ts
    }

    // =========================================================================
    // Operators and Functions
    // =========================================================================

    /// String concatenation operator.
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Whether `||` concatenates strings (MySQL treats it as OR).
    fn supports_concat_operator(&self) -> bool {
        true
    }

    /// Remap a function name for this dialect.
    ///
    /// Returns `Some(new_name)` to remap, `None` to keep the original.
    /// Matching is case-insensitive.
    fn remap_function(&self, name: &str) -> Option<&'static str> {
        let _ = name;
        None
    }

    // =========================================================================
    // Clause Support
    // =========================================================================

    /// Whether recursive CTEs take the RECURSIVE keyword.
    fn emit_recursive_keyword(&self) -> bool {
        true
    }

    /// Whether ORDER BY accepts NULLS FIRST/LAST.
    fn supports_nulls_ordering(&self) -> bool {
        true
    }

    /// Whether DML statements accept a RETURNING projection.
    fn supports_returning(&self) -> bool {
        false
    }

    /// Whether INSERT accepts ON CONFLICT.
    fn supports_on_conflict(&self) -> bool {
        false
    }

    /// Whether a native MERGE statement exists.
    fn supports_merge(&self) -> bool {
        false
    }

    /// Whether SELECT accepts FOR UPDATE.
    fn supports_select_for_update(&self) -> bool {
        false
    }

    /// Whether FOR UPDATE accepts SKIP LOCKED.
    fn supports_skip_locked(&self) -> bool {
        false
    }

    /// Whether the engine has a native pub/sub primitive
    /// (LISTEN/NOTIFY or equivalent).
    fn supports_listen_notify(&self) -> bool {
        false
    }

    /// Whether TRUNCATE accepts CASCADE/RESTRICT.
    fn supports_truncate_cascade(&self) -> bool {
        false
    }

    /// Whether TRUNCATE accepts RESTART/CONTINUE IDENTITY.
    fn supports_restart_identity(&self) -> bool {
        false
    }

    /// Whether CREATE SCHEMA accepts AUTHORIZATION.
    fn supports_create_schema_authorization(&self) -> bool {
        false
    }

    /// Whether CREATE INDEX accepts a USING method.
    fn supports_index_method(&self) -> bool {
        false
    }

    /// Whether CREATE INDEX accepts a partial WHERE clause.
    fn supports_partial_indexes(&self) -> bool {
        false
    }

    /// Whether DDL participates in transactions.
    fn supports_transactional_ddl(&self) -> bool {
        false
    }
}

// =============================================================================
// Dialect Enum
// =============================================================================

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
    Sqlite,
    Oracle,
    DuckDb,
    Spanner,
    BigQuery,
    Ansi,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::MySql => &MySql,
            Dialect::Sqlite => &Sqlite,
            Dialect::Oracle => &Oracle,
            Dialect::DuckDb => &DuckDb,
            Dialect::Spanner => &Spanner,
            Dialect::BigQuery => &BigQuery,
            Dialect::Ansi => &Ansi,
        }
    }

    /// Parse a dialect from its configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Dialect::Postgres),
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "sqlite" | "sqlite3" => Some(Dialect::Sqlite),
            "oracle" | "oracledb" => Some(Dialect::Oracle),
            "duckdb" | "duck" => Some(Dialect::DuckDb),
            "spanner" => Some(Dialect::Spanner),
            "bigquery" | "bq" => Some(Dialect::BigQuery),
            "ansi" => Some(Dialect::Ansi),
            _ => None,
        }
    }
}

// Delegate SqlDialect to the concrete implementations.
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn placeholder_style(&self) -> ParamStyle {
        self.dialect().placeholder_style()
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn concat_operator(&self) -> &'static str {
        self.dialect().concat_operator()
    }

    fn supports_concat_operator(&self) -> bool {
        self.dialect().supports_concat_operator()
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.dialect().remap_function(name)
    }

    fn emit_recursive_keyword(&self) -> bool {
        self.dialect().emit_recursive_keyword()
    }

    fn supports_nulls_ordering(&self) -> bool {
        self.dialect().supports_nulls_ordering()
    }

    fn supports_returning(&self) -> bool {
        self.dialect().supports_returning()
    }

    fn supports_on_conflict(&self) -> bool {
        self.dialect().supports_on_conflict()
    }

    fn supports_merge(&self) -> bool {
        self.dialect().supports_merge()
    }

    fn supports_select_for_update(&self) -> bool {
        self.dialect().supports_select_for_update()
    }

    fn supports_skip_locked(&self) -> bool {
        self.dialect().supports_skip_locked()
    }

    fn supports_listen_notify(&self) -> bool {
        self.dialect().supports_listen_notify()
    }

    fn supports_truncate_cascade(&self) -> bool {
        self.dialect().supports_truncate_cascade()
    }

    fn supports_restart_identity(&self) -> bool {
        self.dialect().supports_restart_identity()
    }

    fn supports_create_schema_authorization(&self) -> bool {
        self.dialect().supports_create_schema_authorization()
    }

    fn supports_index_method(&self) -> bool {
        self.dialect().supports_index_method()
    }

    fn supports_partial_indexes(&self) -> bool {
        self.dialect().supports_partial_indexes()
    }

    fn supports_transactional_ddl(&self) -> bool {
        self.dialect().supports_transactional_ddl()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_display() {
        assert_eq!(Dialect::Postgres.to_string(), "postgres");
        assert_eq!(Dialect::MySql.to_string(), "mysql");
        assert_eq!(Dialect::Sqlite.to_string(), "sqlite");
        assert_eq!(Dialect::Oracle.to_string(), "oracle");
        assert_eq!(Dialect::Spanner.to_string(), "spanner");
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Dialect::from_name("postgresql"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_name("BQ"), Some(Dialect::BigQuery));
        assert_eq!(Dialect::from_name("mssql"), None);
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::Postgres.quote_identifier("users"), "\"users\"");
        assert_eq!(Dialect::MySql.quote_identifier("users"), "`users`");
        assert_eq!(Dialect::BigQuery.quote_identifier("users"), "`users`");
        assert_eq!(Dialect::Sqlite.quote_identifier("users"), "\"users\"");
    }

    #[test]
    fn test_quote_identifier_escaping() {
        assert_eq!(
            Dialect::Postgres.quote_identifier("weird\"name"),
            "\"weird\"\"name\""
        );
        assert_eq!(
            Dialect::MySql.quote_identifier("weird`name"),
            "`weird``name`"
        );
    }

    #[test]
    fn test_preferred_styles() {
        assert_eq!(Dialect::Postgres.placeholder_style(), ParamStyle::Numeric);
        assert_eq!(Dialect::DuckDb.placeholder_style(), ParamStyle::Numeric);
        assert_eq!(Dialect::MySql.placeholder_style(), ParamStyle::QMark);
        assert_eq!(Dialect::Sqlite.placeholder_style(), ParamStyle::QMark);
        assert_eq!(Dialect::Oracle.placeholder_style(), ParamStyle::NamedColon);
        assert_eq!(Dialect::Spanner.placeholder_style(), ParamStyle::NamedAt);
        assert_eq!(Dialect::BigQuery.placeholder_style(), ParamStyle::NamedAt);
        assert_eq!(Dialect::Ansi.placeholder_style(), ParamStyle::QMark);
    }

    #[test]
    fn test_style_format() {
        assert_eq!(ParamStyle::Numeric.format("x", 3), "$3");
        assert_eq!(ParamStyle::QMark.format("x", 3), "?");
        assert_eq!(ParamStyle::NamedColon.format("x", 3), ":x");
        assert_eq!(ParamStyle::NamedAt.format("x", 3), "@x");
        assert_eq!(ParamStyle::NamedDollar.format("x", 3), "$x");
        assert_eq!(ParamStyle::Format.format("x", 3), "%s");
    }

    #[test]
    fn test_format_bool() {
        assert_eq!(Dialect::Postgres.format_bool(true), "TRUE");
        assert_eq!(Dialect::MySql.format_bool(true), "1");
        assert_eq!(Dialect::Oracle.format_bool(false), "0");
        assert_eq!(Dialect::Sqlite.format_bool(false), "0");
    }

    #[test]
    fn test_queue_capabilities() {
        assert!(Dialect::Postgres.supports_skip_locked());
        assert!(Dialect::MySql.supports_skip_locked());
        assert!(Dialect::Oracle.supports_skip_locked());
        assert!(!Dialect::Sqlite.supports_skip_locked());
        assert!(!Dialect::DuckDb.supports_skip_locked());

        assert!(Dialect::Postgres.supports_listen_notify());
        assert!(!Dialect::MySql.supports_listen_notify());
    }

    #[test]
    fn test_returning_support() {
        assert!(Dialect::Postgres.supports_returning());
        assert!(Dialect::Sqlite.supports_returning());
        assert!(Dialect::DuckDb.supports_returning());
        assert!(!Dialect::MySql.supports_returning());
        assert!(!Dialect::BigQuery.supports_returning());
    }

    #[test]
    fn test_remap_function() {
        assert_eq!(Dialect::Postgres.remap_function("NVL"), Some("COALESCE"));
        assert_eq!(Dialect::MySql.remap_function("NVL"), Some("IFNULL"));
        assert_eq!(Dialect::Oracle.remap_function("IFNULL"), Some("NVL"));
        assert_eq!(Dialect::Postgres.remap_function("CUSTOM_FUNC"), None);
        assert_eq!(Dialect::Postgres.remap_function("nvl"), Some("COALESCE"));
    }
}
