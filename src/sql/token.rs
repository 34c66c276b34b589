//! SQL tokens - the atomic units of SQL output.
//!
//! Tokens are dialect-agnostic; serialization turns them into
//! dialect-specific text. Placeholder tokens are special: their final
//! syntax (`$1`, `?`, `:name`, `@name`) depends on the dialect's
//! preferred parameter style, and positional styles need ordinals
//! assigned in emission order, so [`TokenStream::serialize`] numbers
//! them while walking the stream.

use super::dialect::{Dialect, ParamStyle, SqlDialect};

/// SQL token - every element the renderer can emit.
///
/// Adding a variant forces updates everywhere it must be handled
/// (exhaustive matching).
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // === Keywords ===
    Select,
    From,
    Where,
    And,
    Or,
    Not,
    As,
    On,
    Join,
    Inner,
    Left,
    Right,
    Full,
    Outer,
    Cross,
    GroupBy,
    Rollup,
    Having,
    OrderBy,
    Asc,
    Desc,
    NullsFirst,
    NullsLast,
    Limit,
    Offset,
    Fetch,
    Next,
    Rows,
    Only,
    Case,
    When,
    Then,
    Else,
    End,
    In,
    Between,
    Like,
    IsNull,
    IsNotNull,
    Distinct,
    All,
    Union,
    Intersect,
    Except,
    With,
    Recursive,
    Exists,
    Null,

    // === Window keywords ===
    Over,
    PartitionBy,
    Range,
    Groups,
    Unbounded,
    Preceding,
    Following,
    CurrentRow,

    // === Locking ===
    For,
    Skip,
    Locked,

    // === DDL keywords ===
    Create,
    Drop,
    Table,
    Index,
    View,
    Schema,
    Unique,
    If,
    Cascade,
    Restrict,
    Truncate,
    Restart,
    Continue,
    Identity,
    Authorization,

    // === DML keywords ===
    Insert,
    Into,
    Values,
    Update,
    Set,
    Delete,
    Returning,
    Using,
    Conflict,
    Do,
    Nothing,
    Merge,
    Matched,

    // === Punctuation ===
    Comma,
    Dot,
    Star,
    LParen,
    RParen,

    // === Operators ===
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    Concat,

    // === Whitespace ===
    Space,
    Newline,
    Indent(usize),

    // === Dynamic content ===
    /// Simple identifier (table, column, alias).
    Ident(String),
    /// Qualified identifier: schema.table or just table.
    QualifiedIdent {
        schema: Option<String>,
        name: String,
    },
    LitInt(i64),
    LitFloat(f64),
    LitString(String),
    LitBool(bool),
    LitNull,

    /// Parameter marker. The stream serializer assigns ordinals and
    /// renders the dialect's preferred style.
    Placeholder(String),

    /// Function name, subject to per-dialect remapping.
    FunctionName(String),

    // === Escape hatch ===
    /// Raw SQL passed to output without escaping.
    ///
    /// Never feed user input here; it is not sanitized. Reserved for
    /// trusted fragments covering syntax the token set lacks.
    Raw(String),
}

impl Token {
    /// Serialize this token for the given dialect.
    ///
    /// A lone [`Token::Placeholder`] renders as ordinal 1; real ordinal
    /// assignment happens in [`TokenStream::serialize`].
    pub fn serialize(&self, dialect: Dialect) -> String {
        match self {
            Token::Select => "SELECT".into(),
            Token::From => "FROM".into(),
            Token::Where => "WHERE".into(),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::Not => "NOT".into(),
            Token::As => "AS".into(),
            Token::On => "ON".into(),
            Token::Join => "JOIN".into(),
            Token::Inner => "INNER".into(),
            Token::Left => "LEFT".into(),
            Token::Right => "RIGHT".into(),
            Token::Full => "FULL".into(),
            Token::Outer => "OUTER".into(),
            Token::Cross => "CROSS".into(),
            Token::GroupBy => "GROUP BY".into(),
            Token::Rollup => "ROLLUP".into(),
            Token::Having => "HAVING".into(),
            Token::OrderBy => "ORDER BY".into(),
            Token::Asc => "ASC".into(),
            Token::Desc => "DESC".into(),
            Token::NullsFirst => "NULLS FIRST".into(),
            Token::NullsLast => "NULLS LAST".into(),
            Token::Limit => "LIMIT".into(),
            Token::Offset => "OFFSET".into(),
            Token::Fetch => "FETCH".into(),
            Token::Next => "NEXT".into(),
            Token::Rows => "ROWS".into(),
            Token::Only => "ONLY".into(),
            Token::Case => "CASE".into(),
            Token::When => "WHEN".into(),
            Token::Then => "THEN".into(),
            Token::Else => "ELSE".into(),
            Token::End => "END".into(),
            Token::In => "IN".into(),
            Token::Between => "BETWEEN".into(),
            Token::Like => "LIKE".into(),
            Token::IsNull => "IS NULL".into(),
            Token::IsNotNull => "IS NOT NULL".into(),
            Token::Distinct => "DISTINCT".into(),
            Token::All => "ALL".into(),
            Token::Union => "UNION".into(),
            Token::Intersect => "INTERSECT".into(),
            Token::Except => "EXCEPT".into(),
            Token::With => "WITH".into(),
            Token::Recursive => "RECURSIVE".into(),
            Token::Exists => "EXISTS".into(),
            Token::Null => "NULL".into(),

            Token::Over => "OVER".into(),
            Token::PartitionBy => "PARTITION BY".into(),
            Token::Range => "RANGE".into(),
            Token::Groups => "GROUPS".into(),
            Token::Unbounded => "UNBOUNDED".into(),
            Token::Preceding => "PRECEDING".into(),
            Token::Following => "FOLLOWING".into(),
            Token::CurrentRow => "CURRENT ROW".into(),

            Token::For => "FOR".into(),
            Token::Skip => "SKIP".into(),
            Token::Locked => "LOCKED".into(),

            Token::Create => "CREATE".into(),
            Token::Drop => "DROP".into(),
            Token::Table => "TABLE".into(),
            Token::Index => "INDEX".into(),
            Token::View => "VIEW".into(),
            Token::Schema => "SCHEMA".into(),
            Token::Unique => "UNIQUE".into(),
            Token::If => "IF".into(),
            Token::Cascade => "CASCADE".into(),
            Token::Restrict => "RESTRICT".into(),
            Token::Truncate => "TRUNCATE".into(),
            Token::Restart => "RESTART".into(),
            Token::Continue => "CONTINUE".into(),
            Token::Identity => "IDENTITY".into(),
            Token::Authorization => "AUTHORIZATION".into(),

            Token::Insert => "INSERT".into(),
            Token::Into => "INTO".into(),
            Token::Values => "VALUES".into(),
            Token::Update => "UPDATE".into(),
            Token::Set => "SET".into(),
            Token::Delete => "DELETE".into(),
            Token::Returning => "RETURNING".into(),
            Token::Using => "USING".into(),
            Token::Conflict => "CONFLICT".into(),
            Token::Do => "DO".into(),
            Token::Nothing => "NOTHING".into(),
            Token::Merge => "MERGE".into(),
            Token::Matched => "MATCHED".into(),

            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Star => "*".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),

            Token::Eq => "=".into(),
            Token::Ne => "<>".into(),
            Token::Lt => "<".into(),
            Token::Gt => ">".into(),
            Token::Lte => "<=".into(),
            Token::Gte => ">=".into(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Mul => "*".into(),
            Token::Div => "/".into(),
            Token::Mod => "%".into(),
            Token::Concat => dialect.concat_operator().into(),

            Token::Space => " ".into(),
            Token::Newline => "\n".into(),
            Token::Indent(n) => "  ".repeat(*n),

            Token::Ident(name) => dialect.quote_identifier(name),
            Token::QualifiedIdent { schema, name } => match schema {
                Some(s) => format!(
                    "{}.{}",
                    dialect.quote_identifier(s),
                    dialect.quote_identifier(name)
                ),
                None => dialect.quote_identifier(name),
            },
            Token::LitInt(n) => n.to_string(),
            Token::LitFloat(f) => {
                if f.is_nan() {
                    panic!("Cannot serialize NaN to SQL")
                }
                if f.is_infinite() {
                    panic!("Cannot serialize Infinity to SQL")
                }
                let mut buffer = ryu::Buffer::new();
                buffer.format(*f).to_string()
            }
            Token::LitString(s) => dialect.quote_string(s),
            Token::LitBool(b) => dialect.format_bool(*b).into(),
            Token::LitNull => "NULL".into(),

            Token::Placeholder(name) => dialect.placeholder_style().format(name, 1),

            Token::FunctionName(name) => match dialect.remap_function(name) {
                Some(remapped) => remapped.to_uppercase(),
                None => name.to_uppercase(),
            },

            Token::Raw(s) => s.clone(),
        }
    }
}

/// A stream of tokens serializable to SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    /// Create an empty token stream.
    pub fn new() -> Self {
        Self { tokens: vec![] }
    }

    /// Push a single token.
    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    /// Extend with multiple tokens.
    pub fn extend(&mut self, tokens: impl IntoIterator<Item = Token>) -> &mut Self {
        self.tokens.extend(tokens);
        self
    }

    /// Append another token stream.
    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend(other.tokens.iter().cloned());
        self
    }

    /// Serialize all tokens to SQL, numbering placeholders in emission
    /// order for positional styles.
    pub fn serialize(&self, dialect: Dialect) -> String {
        self.serialize_with_style(dialect, dialect.placeholder_style())
    }

    /// Serialize with an explicit placeholder style, overriding the
    /// dialect's preferred one.
    pub fn serialize_with_style(&self, dialect: Dialect, style: ParamStyle) -> String {
        let mut ordinal = 0usize;
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Placeholder(name) => {
                    ordinal += 1;
                    out.push_str(&style.format(name, ordinal));
                }
                other => out.push_str(&other.serialize(dialect)),
            }
        }
        out
    }

    /// Placeholder names in emission order.
    ///
    /// This is the order positional parameter containers must follow.
    pub fn placeholder_names(&self) -> Vec<String> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Placeholder(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    // Convenience methods for common tokens
    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }
    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }
    pub fn indent(&mut self, n: usize) -> &mut Self {
        self.push(Token::Indent(n))
    }
    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }
    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }
    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}
