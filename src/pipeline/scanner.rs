//! Comment- and quote-aware SQL text scanner.
//!
//! Raw SQL inputs are never regex-scanned: this module walks the text
//! with a small state machine that skips string literals (including
//! dollar-quoted bodies), quoted identifiers, and line/block comments,
//! so a `?` inside `'who?'` or a `:tag` inside a comment is never
//! mistaken for a placeholder. The same machinery yields top-level
//! keyword inventory (statement kind, RETURNING detection) and script
//! splitting at top-level `;` boundaries.

/// A placeholder found in SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// `?`
    QMark,
    /// `$1`
    Numeric(u32),
    /// `:name`
    NamedColon(String),
    /// `:1` - treated as positional (Oracle numeric binds)
    NumericColon(u32),
    /// `@name`
    NamedAt(String),
    /// `$name`
    NamedDollar(String),
    /// `%s`
    Format,
    /// `%(name)s`
    NamedFormat(String),
}

impl PlaceholderKind {
    /// Whether this placeholder addresses a parameter by name.
    pub fn is_named(&self) -> bool {
        matches!(
            self,
            PlaceholderKind::NamedColon(_)
                | PlaceholderKind::NamedAt(_)
                | PlaceholderKind::NamedDollar(_)
                | PlaceholderKind::NamedFormat(_)
        )
    }

    /// The referenced name, for named placeholders.
    pub fn name(&self) -> Option<&str> {
        match self {
            PlaceholderKind::NamedColon(n)
            | PlaceholderKind::NamedAt(n)
            | PlaceholderKind::NamedDollar(n)
            | PlaceholderKind::NamedFormat(n) => Some(n),
            _ => None,
        }
    }
}

/// A placeholder with its byte range in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    pub kind: PlaceholderKind,
    pub start: usize,
    pub end: usize,
}

// ============================================================================
// Code spans
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    SingleQuote,
    DoubleQuote,
    Backtick,
    LineComment,
    BlockComment(u32),
}

/// Byte ranges of `sql` lying outside string literals, quoted
/// identifiers, and comments.
fn code_spans(sql: &str) -> Vec<(usize, usize)> {
    let bytes = sql.as_bytes();
    let mut spans = Vec::new();
    let mut state = State::Code;
    let mut code_start = 0usize;
    let mut i = 0usize;
    // Pending dollar-quote tag; Some(tag) while inside $tag$ ... $tag$
    let mut dollar_tag: Option<String> = None;

    while i < bytes.len() {
        let b = bytes[i];
        match state {
            State::Code => {
                if let Some(tag) = &dollar_tag {
                    // Inside a dollar-quoted body; look for the closing tag
                    let close = format!("${tag}$");
                    if sql[i..].starts_with(&close) {
                        i += close.len();
                        dollar_tag = None;
                        code_start = i;
                        continue;
                    }
                    i += 1;
                    continue;
                }
                match b {
                    b'\'' => {
                        spans.push((code_start, i));
                        state = State::SingleQuote;
                        i += 1;
                    }
                    b'"' => {
                        spans.push((code_start, i));
                        state = State::DoubleQuote;
                        i += 1;
                    }
                    b'`' => {
                        spans.push((code_start, i));
                        state = State::Backtick;
                        i += 1;
                    }
                    b'-' if bytes.get(i + 1) == Some(&b'-') => {
                        spans.push((code_start, i));
                        state = State::LineComment;
                        i += 2;
                    }
                    b'/' if bytes.get(i + 1) == Some(&b'*') => {
                        spans.push((code_start, i));
                        state = State::BlockComment(1);
                        i += 2;
                    }
                    b'$' => {
                        // `$tag$` opens a dollar-quoted string; `$n` and
                        // `$name` stay in code as placeholders.
                        if let Some(tag) = dollar_quote_tag(&sql[i..]) {
                            spans.push((code_start, i));
                            i += tag.len() + 2;
                            dollar_tag = Some(tag);
                            // Body is skipped in the branch above
                        } else {
                            i += 1;
                        }
                    }
                    _ => i += 1,
                }
            }
            State::SingleQuote => {
                if b == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 2; // escaped quote
                    } else {
                        state = State::Code;
                        i += 1;
                        code_start = i;
                    }
                } else {
                    i += 1;
                }
            }
            State::DoubleQuote => {
                if b == b'"' {
                    if bytes.get(i + 1) == Some(&b'"') {
                        i += 2;
                    } else {
                        state = State::Code;
                        i += 1;
                        code_start = i;
                    }
                } else {
                    i += 1;
                }
            }
            State::Backtick => {
                if b == b'`' {
                    if bytes.get(i + 1) == Some(&b'`') {
                        i += 2;
                    } else {
                        state = State::Code;
                        i += 1;
                        code_start = i;
                    }
                } else {
                    i += 1;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Code;
                    i += 1;
                    code_start = i;
                } else {
                    i += 1;
                }
            }
            State::BlockComment(depth) => {
                if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    i += 2;
                    if depth == 1 {
                        state = State::Code;
                        code_start = i;
                    } else {
                        state = State::BlockComment(depth - 1);
                    }
                } else if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    i += 2;
                } else {
                    i += 1;
                }
            }
        }
    }

    if state == State::Code && dollar_tag.is_none() && code_start < bytes.len() {
        spans.push((code_start, bytes.len()));
    }
    spans.retain(|(s, e)| e > s);
    spans
}

/// If `rest` starts a dollar-quoted string (`$$` or `$tag$`), return
/// the tag (possibly empty).
fn dollar_quote_tag(rest: &str) -> Option<String> {
    let bytes = rest.as_bytes();
    debug_assert_eq!(bytes[0], b'$');
    let mut j = 1;
    while j < bytes.len() && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_') {
        // A tag starting with a digit would be a `$1` placeholder
        if j == 1 && bytes[j].is_ascii_digit() {
            return None;
        }
        j += 1;
    }
    if j < bytes.len() && bytes[j] == b'$' {
        Some(rest[1..j].to_string())
    } else {
        None
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn read_ident(bytes: &[u8], mut i: usize, end: usize) -> usize {
    while i < end && is_ident_continue(bytes[i]) {
        i += 1;
    }
    i
}

// ============================================================================
// Placeholder scanning
// ============================================================================

/// Enumerate the placeholders in `sql`, skipping quoted and commented
/// regions.
pub fn scan_placeholders(sql: &str) -> Vec<PlaceholderToken> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();

    for (start, end) in code_spans(sql) {
        let mut i = start;
        while i < end {
            match bytes[i] {
                b'?' => {
                    // `??` is the escaped operator form, not a marker
                    if i + 1 < end && bytes[i + 1] == b'?' {
                        i += 2;
                        continue;
                    }
                    tokens.push(PlaceholderToken {
                        kind: PlaceholderKind::QMark,
                        start: i,
                        end: i + 1,
                    });
                    i += 1;
                }
                b':' => {
                    // `::` is a cast, not a marker
                    if i + 1 < end && bytes[i + 1] == b':' {
                        i += 2;
                        continue;
                    }
                    if i + 1 < end && bytes[i + 1].is_ascii_digit() {
                        let num_end = read_digits(bytes, i + 1, end);
                        let ordinal: u32 = sql[i + 1..num_end].parse().unwrap_or(0);
                        tokens.push(PlaceholderToken {
                            kind: PlaceholderKind::NumericColon(ordinal),
                            start: i,
                            end: num_end,
                        });
                        i = num_end;
                    } else if i + 1 < end && is_ident_start(bytes[i + 1]) {
                        let name_end = read_ident(bytes, i + 1, end);
                        tokens.push(PlaceholderToken {
                            kind: PlaceholderKind::NamedColon(sql[i + 1..name_end].into()),
                            start: i,
                            end: name_end,
                        });
                        i = name_end;
                    } else {
                        i += 1;
                    }
                }
                b'@' => {
                    // `@@` is a system variable
                    if i + 1 < end && bytes[i + 1] == b'@' {
                        i += 2;
                        if i < end {
                            i = read_ident(bytes, i, end);
                        }
                        continue;
                    }
                    if i + 1 < end && is_ident_start(bytes[i + 1]) {
                        let name_end = read_ident(bytes, i + 1, end);
                        tokens.push(PlaceholderToken {
                            kind: PlaceholderKind::NamedAt(sql[i + 1..name_end].into()),
                            start: i,
                            end: name_end,
                        });
                        i = name_end;
                    } else {
                        i += 1;
                    }
                }
                b'$' => {
                    if i + 1 < end && bytes[i + 1].is_ascii_digit() {
                        let num_end = read_digits(bytes, i + 1, end);
                        let ordinal: u32 = sql[i + 1..num_end].parse().unwrap_or(0);
                        tokens.push(PlaceholderToken {
                            kind: PlaceholderKind::Numeric(ordinal),
                            start: i,
                            end: num_end,
                        });
                        i = num_end;
                    } else if i + 1 < end && is_ident_start(bytes[i + 1]) {
                        let name_end = read_ident(bytes, i + 1, end);
                        tokens.push(PlaceholderToken {
                            kind: PlaceholderKind::NamedDollar(sql[i + 1..name_end].into()),
                            start: i,
                            end: name_end,
                        });
                        i = name_end;
                    } else {
                        i += 1;
                    }
                }
                b'%' => {
                    if i + 1 < end && bytes[i + 1] == b'%' {
                        i += 2;
                        continue;
                    }
                    if i + 1 < end && bytes[i + 1] == b's' {
                        tokens.push(PlaceholderToken {
                            kind: PlaceholderKind::Format,
                            start: i,
                            end: i + 2,
                        });
                        i += 2;
                    } else if i + 1 < end && bytes[i + 1] == b'(' {
                        // %(name)s
                        let name_start = i + 2;
                        let name_end = read_ident(bytes, name_start, end);
                        if name_end > name_start
                            && name_end + 1 < end
                            && bytes[name_end] == b')'
                            && bytes[name_end + 1] == b's'
                        {
                            tokens.push(PlaceholderToken {
                                kind: PlaceholderKind::NamedFormat(
                                    sql[name_start..name_end].into(),
                                ),
                                start: i,
                                end: name_end + 2,
                            });
                            i = name_end + 2;
                        } else {
                            i += 1;
                        }
                    } else {
                        i += 1;
                    }
                }
                _ => i += 1,
            }
        }
    }

    tokens
}

fn read_digits(bytes: &[u8], mut i: usize, end: usize) -> usize {
    while i < end && bytes[i].is_ascii_digit() {
        i += 1;
    }
    i
}

/// Rewrite each scanned placeholder, left to right. The callback
/// receives the occurrence index and the token.
pub fn rewrite_placeholders(
    sql: &str,
    tokens: &[PlaceholderToken],
    mut replacement: impl FnMut(usize, &PlaceholderToken) -> String,
) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut last = 0usize;
    for (idx, token) in tokens.iter().enumerate() {
        out.push_str(&sql[last..token.start]);
        out.push_str(&replacement(idx, token));
        last = token.end;
    }
    out.push_str(&sql[last..]);
    out
}

// ============================================================================
// Keywords and statement kind
// ============================================================================

/// Uppercased identifiers appearing outside quotes, comments, and
/// parentheses.
pub fn top_level_words(sql: &str) -> Vec<String> {
    let bytes = sql.as_bytes();
    let mut words = Vec::new();
    let mut depth = 0i32;

    for (start, end) in code_spans(sql) {
        let mut i = start;
        while i < end {
            let b = bytes[i];
            if b == b'(' {
                depth += 1;
                i += 1;
            } else if b == b')' {
                depth -= 1;
                i += 1;
            } else if is_ident_start(b) && depth == 0 {
                let word_end = read_ident(bytes, i, end);
                words.push(sql[i..word_end].to_ascii_uppercase());
                i = word_end;
            } else if is_ident_start(b) || b.is_ascii_digit() {
                i = read_ident(bytes, i, end);
            } else {
                i += 1;
            }
        }
    }

    words
}

/// Whether a keyword appears at the statement's top level.
pub fn has_top_level_word(sql: &str, keyword: &str) -> bool {
    let keyword = keyword.to_ascii_uppercase();
    top_level_words(sql).iter().any(|w| *w == keyword)
}

/// Infer the statement kind from the leading top-level keywords.
pub fn statement_kind(sql: &str) -> crate::pipeline::statement::StatementKind {
    use crate::pipeline::statement::StatementKind;

    let words = top_level_words(sql);
    let mut iter = words.iter();
    let Some(first) = iter.next() else {
        return StatementKind::Execute;
    };

    match first.as_str() {
        "SELECT" | "VALUES" | "TABLE" => StatementKind::Select,
        "INSERT" => StatementKind::Insert,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        "MERGE" => StatementKind::Merge,
        "CREATE" | "DROP" | "TRUNCATE" | "ALTER" => StatementKind::Ddl,
        "WITH" => {
            // The kind is decided by the statement after the CTE list
            for word in iter {
                match word.as_str() {
                    "SELECT" => return StatementKind::Select,
                    "INSERT" => return StatementKind::Insert,
                    "UPDATE" => return StatementKind::Update,
                    "DELETE" => return StatementKind::Delete,
                    "MERGE" => return StatementKind::Merge,
                    _ => {}
                }
            }
            StatementKind::Execute
        }
        _ => StatementKind::Execute,
    }
}

// ============================================================================
// Script splitting
// ============================================================================

/// Split a script at top-level `;` boundaries, ignoring semicolons in
/// quotes and comments. Empty parts are dropped.
pub fn split_script(sql: &str) -> Vec<String> {
    let mut boundaries = Vec::new();
    for (start, end) in code_spans(sql) {
        for (offset, b) in sql[start..end].bytes().enumerate() {
            if b == b';' {
                boundaries.push(start + offset);
            }
        }
    }

    let mut parts = Vec::new();
    let mut last = 0usize;
    for boundary in boundaries {
        let part = sql[last..boundary].trim();
        if !part.is_empty() {
            parts.push(part.to_string());
        }
        last = boundary + 1;
    }
    let tail = sql[last..].trim();
    if !tail.is_empty() {
        parts.push(tail.to_string());
    }
    parts
}
