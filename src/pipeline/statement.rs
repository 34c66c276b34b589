//! The immutable statement record the pipeline produces.

use crate::sql::dialect::Dialect;
use crate::value::Value;

/// Statement kind, inferred from the root AST node or the leading
/// keyword of raw SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Ddl,
    Script,
    Execute,
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Merge => "MERGE",
            StatementKind::Ddl => "DDL",
            StatementKind::Script => "SCRIPT",
            StatementKind::Execute => "EXECUTE",
        };
        write!(f, "{name}")
    }
}

/// Driver-ready parameter container.
///
/// Named styles carry a name-keyed collection (insertion-ordered);
/// positional styles carry values in placeholder order. Batch
/// execution carries one positional set per row.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Parameters {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
    Many(Vec<Vec<Value>>),
}

impl Parameters {
    /// Number of entries (sets, for batch parameters).
    pub fn len(&self) -> usize {
        match self {
            Parameters::None => 0,
            Parameters::Positional(v) => v.len(),
            Parameters::Named(v) => v.len(),
            Parameters::Many(sets) => sets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a named entry.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Parameters::Named(entries) => entries
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v),
            _ => None,
        }
    }

    /// Positional values, if this container is positional.
    pub fn as_positional(&self) -> Option<&[Value]> {
        match self {
            Parameters::Positional(v) => Some(v),
            _ => None,
        }
    }
}

/// An immutable, driver-ready statement.
///
/// Sharing a built statement across executors is safe; it is a
/// read-only snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Final SQL text, dialect-rendered.
    pub text: String,
    /// Driver-ready parameter container.
    pub parameters: Parameters,
    /// The rendering dialect.
    pub dialect: Dialect,
    /// Statement kind.
    pub kind: StatementKind,
    /// True when `parameters` holds one set per batch row.
    pub is_many: bool,
    /// True when `text` is a multi-statement script.
    pub is_script: bool,
    /// True when the top-level statement has a RETURNING projection.
    pub returning: bool,
}

impl Statement {
    /// Create a plain single-statement record.
    pub fn new(
        text: impl Into<String>,
        parameters: Parameters,
        dialect: Dialect,
        kind: StatementKind,
    ) -> Self {
        Self {
            text: text.into(),
            parameters,
            dialect,
            kind,
            is_many: false,
            is_script: false,
            returning: false,
        }
    }

    pub fn with_returning(mut self, returning: bool) -> Self {
        self.returning = returning;
        self
    }

    pub fn into_script(mut self) -> Self {
        self.is_script = true;
        self.kind = StatementKind::Script;
        self
    }

    pub fn into_many(mut self, sets: Vec<Vec<Value>>) -> Self {
        self.is_many = true;
        self.parameters = Parameters::Many(sets);
        self
    }
}
