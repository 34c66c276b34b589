//! The statement pipeline.
//!
//! One driver-agnostic transformation from any accepted input (raw
//! SQL text, a fluent builder, or an already-built statement) plus
//! optional parameters and filters into a dialect-rendered
//! [`Statement`] with a driver-ready parameter container.
//!
//! Raw text flows through: parse validation (cached) -> placeholder
//! inventory -> style classification -> parameter validation ->
//! placeholder rewrite into the dialect's preferred style -> filter
//! application. Builder inputs skip the text machinery entirely and
//! render their typed AST.

pub mod cache;
pub(crate) mod parse;
pub mod scanner;
pub mod statement;

use thiserror::Error;
use tracing::warn;

use crate::builder::{
    self, BuildError, DdlBuilder, DeleteBuilder, InsertBuilder, MergeBuilder, ParamBag,
    SelectBuilder, UpdateBuilder,
};
use crate::error::ErrorKind;
use crate::filters::{FilterError, FilterTarget, StatementFilter};
use crate::sql::dialect::{Dialect, ParamStyle, SqlDialect};
use crate::sql::SqlAst;
use crate::value::Value;

use self::cache::{ParseCache, ParsedEntry};
use self::scanner::{PlaceholderKind, PlaceholderToken};
pub use self::statement::{Parameters, Statement, StatementKind};

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors surfaced by `prepare` and friends.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("statement does not parse under {dialect}: {message}")]
    Parse { dialect: Dialect, message: String },

    #[error("empty statement")]
    EmptyStatement,

    #[error("{0}")]
    StyleMismatch(String),

    #[error("expected {expected} positional parameters, got {supplied}")]
    CountMismatch { expected: usize, supplied: usize },

    #[error("no parameter supplied for placeholder {0}")]
    MissingParameter(String),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("batch prepare requires raw SQL text")]
    BatchInput,
}

impl PipelineError {
    /// Map into the crate-wide error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Parse { .. } | PipelineError::EmptyStatement => ErrorKind::Parse,
            PipelineError::StyleMismatch(_) => ErrorKind::ParameterStyleMismatch,
            PipelineError::CountMismatch { .. } => ErrorKind::ParameterCountMismatch,
            PipelineError::MissingParameter(_) => ErrorKind::MissingParameter,
            PipelineError::Build(e) => e.kind(),
            PipelineError::Filter(e) => e.kind(),
            PipelineError::BatchInput => ErrorKind::ImproperConfiguration,
        }
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Caller-supplied data parameters, in any accepted shape.
#[derive(Debug, Clone)]
pub enum ParamsArg {
    /// Explicit "no parameters".
    None,
    /// A single scalar, wrapped into a one-element positional set.
    Scalar(Value),
    /// Positional values.
    List(Vec<Value>),
    /// Name-keyed values.
    Map(Vec<(String, Value)>),
}

impl ParamsArg {
    pub fn map(entries: Vec<(&str, Value)>) -> Self {
        ParamsArg::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list(values: Vec<Value>) -> Self {
        ParamsArg::List(values)
    }

    pub fn scalar(value: impl Into<Value>) -> Self {
        ParamsArg::Scalar(value.into())
    }
}

/// One heterogeneous positional argument to `prepare`: either data
/// parameters or a statement filter.
pub enum PrepareArg {
    Params(ParamsArg),
    Filter(Box<dyn StatementFilter>),
}

impl PrepareArg {
    pub fn map(entries: Vec<(&str, Value)>) -> Self {
        PrepareArg::Params(ParamsArg::map(entries))
    }

    pub fn list(values: Vec<Value>) -> Self {
        PrepareArg::Params(ParamsArg::List(values))
    }

    pub fn scalar(value: impl Into<Value>) -> Self {
        PrepareArg::Params(ParamsArg::Scalar(value.into()))
    }

    pub fn filter(filter: impl StatementFilter + 'static) -> Self {
        PrepareArg::Filter(Box::new(filter))
    }
}

/// What `prepare` accepts.
pub enum PipelineInput {
    /// Raw SQL text.
    Text(String),
    /// A builder's decomposed AST and parameter bag.
    Parts {
        ast: SqlAst,
        params: ParamBag,
    },
    /// A previously prepared statement.
    Statement(Statement),
    /// A builder that already failed; surfaced at prepare time.
    Invalid(BuildError),
}

impl From<&str> for PipelineInput {
    fn from(text: &str) -> Self {
        PipelineInput::Text(text.into())
    }
}

impl From<String> for PipelineInput {
    fn from(text: String) -> Self {
        PipelineInput::Text(text)
    }
}

impl From<Statement> for PipelineInput {
    fn from(stmt: Statement) -> Self {
        PipelineInput::Statement(stmt)
    }
}

macro_rules! builder_input {
    ($builder:ty) => {
        impl From<$builder> for PipelineInput {
            fn from(builder: $builder) -> Self {
                match builder.into_parts() {
                    Ok((ast, params, _dialect)) => PipelineInput::Parts { ast, params },
                    Err(err) => PipelineInput::Invalid(err),
                }
            }
        }
    };
}

builder_input!(SelectBuilder);
builder_input!(InsertBuilder);
builder_input!(UpdateBuilder);
builder_input!(DeleteBuilder);
builder_input!(MergeBuilder);
builder_input!(DdlBuilder);

// ============================================================================
// Pipeline
// ============================================================================

const DEFAULT_CACHE_CAPACITY: usize = 256;

/// The statement pipeline. Owns a bounded parse cache; otherwise
/// stateless and safe to share behind a reference.
#[derive(Debug)]
pub struct StatementPipeline {
    cache: ParseCache,
}

impl Default for StatementPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementPipeline {
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            cache: ParseCache::new(capacity),
        }
    }

    /// Turn an input plus parameters and filters into a dialect-ready
    /// [`Statement`].
    pub fn prepare(
        &self,
        input: impl Into<PipelineInput>,
        args: Vec<PrepareArg>,
        dialect: Dialect,
    ) -> PipelineResult<Statement> {
        self.prepare_with_kind(input, args, dialect, None)
    }

    /// `prepare` with an explicit statement-kind hint, for inputs whose
    /// kind the text inference cannot see (stored procedure calls,
    /// vendor syntax).
    pub fn prepare_with_kind(
        &self,
        input: impl Into<PipelineInput>,
        args: Vec<PrepareArg>,
        dialect: Dialect,
        kind_hint: Option<StatementKind>,
    ) -> PipelineResult<Statement> {
        let mut statement = self.prepare_input(input.into(), args, dialect)?;
        if let Some(kind) = kind_hint {
            if !statement.is_script {
                statement.kind = kind;
            }
        }
        Ok(statement)
    }

    fn prepare_input(
        &self,
        input: PipelineInput,
        args: Vec<PrepareArg>,
        dialect: Dialect,
    ) -> PipelineResult<Statement> {
        match input {
            PipelineInput::Invalid(err) => Err(err.into()),
            PipelineInput::Parts { ast, params } => self.prepare_parts(ast, params, args, dialect),
            PipelineInput::Statement(stmt) => {
                if args.is_empty() && stmt.dialect == dialect {
                    return Ok(stmt);
                }
                let mut new_args = Vec::new();
                match stmt.parameters {
                    Parameters::None => {}
                    Parameters::Positional(values) => {
                        new_args.push(PrepareArg::Params(ParamsArg::List(values)))
                    }
                    Parameters::Named(entries) => {
                        new_args.push(PrepareArg::Params(ParamsArg::Map(entries)))
                    }
                    Parameters::Many(_) => return Err(PipelineError::BatchInput),
                }
                new_args.extend(args);
                self.prepare_text(stmt.text, new_args, dialect)
            }
            PipelineInput::Text(text) => self.prepare_text(text, args, dialect),
        }
    }

    /// Batch prepare: one statement, many parameter sets. Validation
    /// runs against the first set; the rest are assumed structurally
    /// uniform.
    pub fn prepare_many(
        &self,
        input: impl Into<PipelineInput>,
        sets: Vec<ParamsArg>,
        dialect: Dialect,
    ) -> PipelineResult<Statement> {
        let text = match input.into() {
            PipelineInput::Text(text) => text,
            PipelineInput::Statement(stmt) if stmt.parameters.is_empty() => stmt.text,
            PipelineInput::Invalid(err) => return Err(err.into()),
            _ => return Err(PipelineError::BatchInput),
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(PipelineError::EmptyStatement);
        }
        let entry = self.parse_validated(&text, dialect)?;

        let mut rewritten: Option<String> = None;
        let mut all_values = Vec::with_capacity(sets.len());
        for set in sets {
            let bound = bind_text(&text, &entry.placeholders, merge_params(vec![set])?, dialect)?;
            let values = match bound.parameters {
                Parameters::Positional(v) => v,
                Parameters::Named(entries) => entries.into_iter().map(|(_, v)| v).collect(),
                Parameters::None => Vec::new(),
                Parameters::Many(_) => unreachable!("bind_text never yields batch parameters"),
            };
            all_values.push(values);
            rewritten.get_or_insert(bound.sql);
        }

        let sql = rewritten.unwrap_or(text);
        Ok(
            Statement::new(sql, Parameters::None, dialect, entry.kind)
                .with_returning(entry.returning)
                .into_many(all_values),
        )
    }

    /// Prepare a multi-statement script: parts are split at top-level
    /// `;` boundaries and each part is validated. Parameters bind only
    /// when every part shares a single placeholder shape.
    pub fn prepare_script(
        &self,
        text: &str,
        args: Vec<PrepareArg>,
        dialect: Dialect,
    ) -> PipelineResult<Statement> {
        let parts = scanner::split_script(text);
        if parts.is_empty() {
            return Err(PipelineError::EmptyStatement);
        }

        let (params_args, filters) = partition_args(args);
        if !filters.is_empty() {
            warn!("filters are ignored for script inputs");
        }
        let merged = merge_params(params_args)?;

        let mut all_tokens = Vec::new();
        for part in &parts {
            let entry = self.parse_validated(part, dialect)?;
            all_tokens.extend(entry.placeholders);
        }

        // Parameters bind only when every part shares one placeholder
        // shape; with nothing supplied there is nothing to bind.
        if matches!(merged, MergedParams::None) {
            return Ok(Statement::new(
                parts.join(";\n"),
                Parameters::None,
                dialect,
                StatementKind::Script,
            )
            .into_script());
        }

        let parameters = match classify(&all_tokens)? {
            StyleClass::NoParams => {
                warn!("supplied parameters are not referenced by the script");
                Parameters::None
            }
            StyleClass::Named => {
                let supplied = match merged {
                    MergedParams::Named(entries) => entries,
                    MergedParams::None => Vec::new(),
                    MergedParams::Positional(_) => {
                        return Err(PipelineError::StyleMismatch(
                            "positional parameters supplied for a script with named placeholders"
                                .into(),
                        ))
                    }
                };
                let referenced = referenced_names(&all_tokens);
                let mut entries = Vec::new();
                for name in &referenced {
                    match supplied.iter().find(|(n, _)| n == name) {
                        Some((n, v)) => entries.push((n.clone(), v.clone())),
                        None => return Err(PipelineError::MissingParameter(name.clone())),
                    }
                }
                for (name, _) in &supplied {
                    if !referenced.contains(name) {
                        warn!(parameter = %name, "supplied parameter is not referenced");
                    }
                }
                Parameters::Named(entries)
            }
            StyleClass::Positional => {
                let expected = expected_positional(&all_tokens);
                let supplied = match merged {
                    MergedParams::Positional(values) => values,
                    MergedParams::None => Vec::new(),
                    MergedParams::Named(_) => {
                        return Err(PipelineError::StyleMismatch(
                            "named parameters supplied for a script with positional placeholders"
                                .into(),
                        ))
                    }
                };
                if supplied.len() != expected {
                    return Err(PipelineError::CountMismatch {
                        expected,
                        supplied: supplied.len(),
                    });
                }
                Parameters::Positional(supplied)
            }
        };

        Ok(
            Statement::new(parts.join(";\n"), parameters, dialect, StatementKind::Script)
                .into_script(),
        )
    }

    // =========================================================================
    // Builder inputs
    // =========================================================================

    fn prepare_parts(
        &self,
        ast: SqlAst,
        mut params: ParamBag,
        args: Vec<PrepareArg>,
        dialect: Dialect,
    ) -> PipelineResult<Statement> {
        let (params_args, filters) = partition_args(args);
        if params_args
            .iter()
            .any(|p| !matches!(p, ParamsArg::None))
        {
            warn!("data parameters are ignored for builder inputs; only filters apply");
        }

        let mut ast = ast;
        for filter in &filters {
            let names = filter.contribute_parameters(&mut params);
            ast = match filter.contribute_ast(FilterTarget::Ast(ast), &names)? {
                FilterTarget::Ast(rewritten) => rewritten,
                FilterTarget::Text { .. } => return Err(FilterError::TargetMismatch.into()),
            };
        }

        let kind = match &ast {
            SqlAst::Select(_) => StatementKind::Select,
            SqlAst::Insert(_) => StatementKind::Insert,
            SqlAst::Update(_) => StatementKind::Update,
            SqlAst::Delete(_) => StatementKind::Delete,
            SqlAst::Merge(_) => StatementKind::Merge,
            SqlAst::Ddl(_) => StatementKind::Ddl,
        };
        let returning = ast.has_returning();
        let (sql, parameters) = builder::render_ast(&ast, &params, dialect)?;

        Ok(Statement::new(sql, parameters, dialect, kind).with_returning(returning))
    }

    // =========================================================================
    // Raw text inputs
    // =========================================================================

    fn prepare_text(
        &self,
        text: String,
        args: Vec<PrepareArg>,
        dialect: Dialect,
    ) -> PipelineResult<Statement> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(PipelineError::EmptyStatement);
        }

        if scanner::split_script(&text).len() > 1 {
            return self.prepare_script(&text, args, dialect);
        }

        let entry = self.parse_validated(&text, dialect)?;
        let (params_args, filters) = partition_args(args);
        let merged = merge_params(params_args)?;

        let bound = bind_text(&text, &entry.placeholders, merged, dialect)?;
        let mut sql = bound.sql;
        let mut parameters = bound.parameters;

        if !filters.is_empty() {
            if bound.numeric_colon_shim {
                return Err(PipelineError::StyleMismatch(
                    "filters cannot apply to numeric-colon placeholder statements".into(),
                ));
            }

            let mut bag = ParamBag::new();
            if let Parameters::Named(entries) = &parameters {
                for (name, _) in entries {
                    bag.reserve(name);
                }
            }

            let mut count = entry.placeholders.len();
            for filter in &filters {
                let names = filter.contribute_parameters(&mut bag);
                let target = FilterTarget::Text {
                    sql,
                    dialect,
                    style: bound.style,
                    next_ordinal: count + 1,
                };
                sql = match filter.contribute_ast(target, &names)? {
                    FilterTarget::Text { sql, .. } => sql,
                    FilterTarget::Ast(_) => return Err(FilterError::TargetMismatch.into()),
                };

                if !names.is_empty() && matches!(parameters, Parameters::None) {
                    parameters = if bound.style.is_named() {
                        Parameters::Named(Vec::new())
                    } else {
                        Parameters::Positional(Vec::new())
                    };
                }
                for name in &names {
                    let value = bag.get(name).cloned().unwrap_or(Value::Null);
                    match &mut parameters {
                        Parameters::Named(entries) => entries.push((name.clone(), value)),
                        Parameters::Positional(values) => values.push(value),
                        Parameters::None | Parameters::Many(_) => {}
                    }
                }
                count += names.len();
            }
        }

        Ok(Statement::new(sql, parameters, dialect, entry.kind).with_returning(entry.returning))
    }

    /// Scan and parse-validate one statement's text, via the cache.
    fn parse_validated(&self, text: &str, dialect: Dialect) -> PipelineResult<ParsedEntry> {
        if let Some(entry) = self.cache.get(dialect, text) {
            return Ok(entry);
        }

        let placeholders = scanner::scan_placeholders(text);
        parse::validate(text, &placeholders, dialect).map_err(|message| PipelineError::Parse {
            dialect,
            message,
        })?;

        let entry = ParsedEntry {
            kind: scanner::statement_kind(text),
            returning: scanner::has_top_level_word(text, "RETURNING"),
            placeholders,
        };
        self.cache.put(dialect, text, entry.clone());
        Ok(entry)
    }
}

// ============================================================================
// Parameter merging
// ============================================================================

#[derive(Debug, Clone)]
enum MergedParams {
    None,
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

fn partition_args(args: Vec<PrepareArg>) -> (Vec<ParamsArg>, Vec<Box<dyn StatementFilter>>) {
    let mut params = Vec::new();
    let mut filters = Vec::new();
    for arg in args {
        match arg {
            PrepareArg::Params(p) => params.push(p),
            PrepareArg::Filter(f) => filters.push(f),
        }
    }
    (params, filters)
}

/// Merge heterogeneous parameter arguments:
///
/// - maps key-merge, later entries overriding earlier ones;
/// - lists concatenate; scalars append as single values;
/// - `None` and empty maps contribute nothing;
/// - mixing keyed and positional data is a style mismatch.
fn merge_params(args: Vec<ParamsArg>) -> PipelineResult<MergedParams> {
    let mut merged = MergedParams::None;
    for arg in args {
        match arg {
            ParamsArg::None => {}
            ParamsArg::Scalar(value) => match &mut merged {
                MergedParams::None => merged = MergedParams::Positional(vec![value]),
                MergedParams::Positional(values) => values.push(value),
                MergedParams::Named(_) => {
                    return Err(PipelineError::StyleMismatch(
                        "cannot mix positional and keyword parameters".into(),
                    ))
                }
            },
            ParamsArg::List(list) => match &mut merged {
                MergedParams::None => merged = MergedParams::Positional(list),
                MergedParams::Positional(values) => values.extend(list),
                MergedParams::Named(_) => {
                    return Err(PipelineError::StyleMismatch(
                        "cannot mix positional and keyword parameters".into(),
                    ))
                }
            },
            ParamsArg::Map(map) => {
                if map.is_empty() {
                    continue;
                }
                match &mut merged {
                    MergedParams::None => merged = MergedParams::Named(map),
                    MergedParams::Named(entries) => {
                        for (key, value) in map {
                            if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
                                slot.1 = value;
                            } else {
                                entries.push((key, value));
                            }
                        }
                    }
                    MergedParams::Positional(_) => {
                        return Err(PipelineError::StyleMismatch(
                            "cannot mix positional and keyword parameters".into(),
                        ))
                    }
                }
            }
        }
    }
    Ok(merged)
}

// ============================================================================
// Placeholder classification and binding
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StyleClass {
    NoParams,
    Named,
    Positional,
}

fn classify(tokens: &[PlaceholderToken]) -> PipelineResult<StyleClass> {
    if tokens.is_empty() {
        return Ok(StyleClass::NoParams);
    }
    let named = tokens.iter().filter(|t| t.kind.is_named()).count();
    if named == tokens.len() {
        return Ok(StyleClass::Named);
    }
    if named > 0 {
        return Err(PipelineError::StyleMismatch(
            "statement mixes named and positional placeholders".into(),
        ));
    }

    let numeric = tokens
        .iter()
        .filter(|t| {
            matches!(
                t.kind,
                PlaceholderKind::Numeric(_) | PlaceholderKind::NumericColon(_)
            )
        })
        .count();
    if numeric > 0 && numeric != tokens.len() {
        return Err(PipelineError::StyleMismatch(
            "statement mixes ordinal and sequential positional placeholders".into(),
        ));
    }
    Ok(StyleClass::Positional)
}

fn referenced_names(tokens: &[PlaceholderToken]) -> Vec<String> {
    let mut names = Vec::new();
    for token in tokens {
        if let Some(name) = token.kind.name() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

fn token_ordinal(token: &PlaceholderToken) -> Option<u32> {
    match token.kind {
        PlaceholderKind::Numeric(n) | PlaceholderKind::NumericColon(n) => Some(n),
        _ => None,
    }
}

/// Expected positional parameter count: occurrence count for
/// sequential markers, the highest ordinal for numbered markers.
fn expected_positional(tokens: &[PlaceholderToken]) -> usize {
    let max_ordinal = tokens.iter().filter_map(token_ordinal).max();
    match max_ordinal {
        Some(max) => max as usize,
        None => tokens.len(),
    }
}

struct BoundText {
    sql: String,
    parameters: Parameters,
    /// The placeholder style the output text actually uses.
    style: ParamStyle,
    /// True when Oracle-style `:n` markers were left untouched.
    numeric_colon_shim: bool,
}

/// Validate supplied parameters against the placeholder inventory and
/// rewrite the text into the dialect's preferred style.
fn bind_text(
    text: &str,
    tokens: &[PlaceholderToken],
    merged: MergedParams,
    dialect: Dialect,
) -> PipelineResult<BoundText> {
    let target = dialect.placeholder_style();

    match classify(tokens)? {
        StyleClass::NoParams => {
            if !matches!(merged, MergedParams::None) {
                warn!("supplied parameters are not referenced by the statement");
            }
            Ok(BoundText {
                sql: text.to_string(),
                parameters: Parameters::None,
                style: target,
                numeric_colon_shim: false,
            })
        }
        StyleClass::Named => bind_named(text, tokens, merged, dialect, target),
        StyleClass::Positional => bind_positional(text, tokens, merged, dialect, target),
    }
}

fn bind_named(
    text: &str,
    tokens: &[PlaceholderToken],
    merged: MergedParams,
    _dialect: Dialect,
    target: ParamStyle,
) -> PipelineResult<BoundText> {
    let supplied = match merged {
        MergedParams::Named(entries) => entries,
        MergedParams::None => Vec::new(),
        MergedParams::Positional(_) => {
            return Err(PipelineError::StyleMismatch(
                "positional parameters supplied for named placeholders".into(),
            ))
        }
    };

    let referenced = referenced_names(tokens);
    let lookup = |name: &str| -> PipelineResult<Value> {
        supplied
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| PipelineError::MissingParameter(name.to_string()))
    };
    // Check coverage up front so errors surface before rewriting
    for name in &referenced {
        lookup(name)?;
    }
    for (name, _) in &supplied {
        if !referenced.iter().any(|r| r == name) {
            warn!(parameter = %name, "supplied parameter is not referenced");
        }
    }

    if target.is_named() {
        let sql = scanner::rewrite_placeholders(text, tokens, |_, token| {
            let name = token.kind.name().expect("named token");
            target.format(name, 0)
        });
        let mut entries = Vec::new();
        for name in &referenced {
            entries.push((name.clone(), lookup(name)?));
        }
        return Ok(BoundText {
            sql,
            parameters: Parameters::Named(entries),
            style: target,
            numeric_colon_shim: false,
        });
    }

    match target {
        ParamStyle::Numeric => {
            // Distinct names numbered by first occurrence; repeats
            // reuse their number.
            let number_of = |name: &str| -> usize {
                referenced.iter().position(|r| r == name).expect("referenced") + 1
            };
            let sql = scanner::rewrite_placeholders(text, tokens, |_, token| {
                let name = token.kind.name().expect("named token");
                format!("${}", number_of(name))
            });
            let mut values = Vec::new();
            for name in &referenced {
                values.push(lookup(name)?);
            }
            Ok(BoundText {
                sql,
                parameters: Parameters::Positional(values),
                style: target,
                numeric_colon_shim: false,
            })
        }
        _ => {
            // Sequential markers: every occurrence gets its own slot,
            // so repeated names repeat their value.
            let sql = scanner::rewrite_placeholders(text, tokens, |_, token| {
                target.format(token.kind.name().expect("named token"), 0)
            });
            let mut values = Vec::new();
            for token in tokens {
                values.push(lookup(token.kind.name().expect("named token"))?);
            }
            Ok(BoundText {
                sql,
                parameters: Parameters::Positional(values),
                style: target,
                numeric_colon_shim: false,
            })
        }
    }
}

fn bind_positional(
    text: &str,
    tokens: &[PlaceholderToken],
    merged: MergedParams,
    _dialect: Dialect,
    target: ParamStyle,
) -> PipelineResult<BoundText> {
    let supplied = match merged {
        MergedParams::Positional(values) => values,
        MergedParams::None => Vec::new(),
        MergedParams::Named(_) => {
            return Err(PipelineError::StyleMismatch(
                "keyword parameters supplied for positional placeholders".into(),
            ))
        }
    };

    let expected = expected_positional(tokens);
    if supplied.len() != expected {
        return Err(PipelineError::CountMismatch {
            expected,
            supplied: supplied.len(),
        });
    }

    let numbered = tokens.iter().any(|t| token_ordinal(t).is_some());
    if numbered {
        let mut seen = std::collections::HashSet::new();
        for token in tokens {
            seen.insert(token_ordinal(token).expect("numbered token"));
        }
        if seen.len() < expected {
            warn!("some supplied positional parameters are not referenced");
        }
    }

    // Oracle numeric binds survive untouched under a named-colon target
    let all_numeric_colon = tokens
        .iter()
        .all(|t| matches!(t.kind, PlaceholderKind::NumericColon(_)));
    if all_numeric_colon && target == ParamStyle::NamedColon {
        return Ok(BoundText {
            sql: text.to_string(),
            parameters: Parameters::Positional(supplied),
            style: target,
            numeric_colon_shim: true,
        });
    }

    if target.is_named() {
        // Generate builder-style names per slot
        let name_for = |slot: usize| format!("param_{slot}");
        let sql = scanner::rewrite_placeholders(text, tokens, |idx, token| {
            let slot = match token_ordinal(token) {
                Some(ordinal) => ordinal as usize - 1,
                None => idx,
            };
            target.format(&name_for(slot), 0)
        });
        let entries = supplied
            .into_iter()
            .enumerate()
            .map(|(i, v)| (name_for(i), v))
            .collect();
        return Ok(BoundText {
            sql,
            parameters: Parameters::Named(entries),
            style: target,
            numeric_colon_shim: false,
        });
    }

    match target {
        ParamStyle::Numeric => {
            let sql = scanner::rewrite_placeholders(text, tokens, |idx, token| {
                match token_ordinal(token) {
                    Some(ordinal) => format!("${ordinal}"),
                    None => format!("${}", idx + 1),
                }
            });
            Ok(BoundText {
                sql,
                parameters: Parameters::Positional(supplied),
                style: target,
                numeric_colon_shim: false,
            })
        }
        _ => {
            // Sequential target: numbered sources expand per
            // occurrence, duplicating repeated ordinals' values.
            if numbered {
                let values: Vec<Value> = tokens
                    .iter()
                    .map(|t| {
                        let ordinal = token_ordinal(t).expect("numbered token") as usize;
                        supplied[ordinal - 1].clone()
                    })
                    .collect();
                let sql =
                    scanner::rewrite_placeholders(text, tokens, |_, token| {
                        target.format("", token_ordinal(token).unwrap_or(0) as usize)
                    });
                Ok(BoundText {
                    sql,
                    parameters: Parameters::Positional(values),
                    style: target,
                    numeric_colon_shim: false,
                })
            } else {
                let sql = scanner::rewrite_placeholders(text, tokens, |idx, _| {
                    target.format("", idx + 1)
                });
                Ok(BoundText {
                    sql,
                    parameters: Parameters::Positional(supplied),
                    style: target,
                    numeric_colon_shim: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{CollectionFilter, LimitOffset};

    fn pipeline() -> StatementPipeline {
        StatementPipeline::new()
    }

    #[test]
    fn test_named_rewrite_to_numeric() {
        let stmt = pipeline()
            .prepare(
                "SELECT id FROM t WHERE name = :name AND age > :age",
                vec![PrepareArg::map(vec![
                    ("name", Value::String("Ada".into())),
                    ("age", Value::Int(30)),
                ])],
                Dialect::Postgres,
            )
            .unwrap();

        assert_eq!(stmt.text, "SELECT id FROM t WHERE name = $1 AND age > $2");
        assert_eq!(
            stmt.parameters,
            Parameters::Positional(vec![Value::String("Ada".into()), Value::Int(30)])
        );
        assert_eq!(stmt.kind, StatementKind::Select);
    }

    #[test]
    fn test_qmark_preserved_and_literal_ignored() {
        let stmt = pipeline()
            .prepare(
                "SELECT * FROM t WHERE x = ? AND note = 'who?'",
                vec![PrepareArg::list(vec![Value::Int(5)])],
                Dialect::Sqlite,
            )
            .unwrap();

        assert_eq!(stmt.text, "SELECT * FROM t WHERE x = ? AND note = 'who?'");
        assert_eq!(stmt.parameters, Parameters::Positional(vec![Value::Int(5)]));
    }

    #[test]
    fn test_scalar_wraps_into_one_tuple() {
        let stmt = pipeline()
            .prepare(
                "SELECT * FROM t WHERE x = ?",
                vec![PrepareArg::scalar(5_i64)],
                Dialect::Sqlite,
            )
            .unwrap();
        assert_eq!(stmt.parameters, Parameters::Positional(vec![Value::Int(5)]));
    }

    #[test]
    fn test_missing_named_parameter() {
        let err = pipeline()
            .prepare(
                "SELECT * FROM t WHERE a = :a AND b = :b",
                vec![PrepareArg::map(vec![("a", Value::Int(1))])],
                Dialect::Postgres,
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::MissingParameter(ref n) if n == "b"));
        assert_eq!(err.kind(), ErrorKind::MissingParameter);
    }

    #[test]
    fn test_positional_count_mismatch() {
        let err = pipeline()
            .prepare(
                "SELECT * FROM t WHERE a = ? AND b = ?",
                vec![PrepareArg::list(vec![Value::Int(1)])],
                Dialect::Sqlite,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::CountMismatch {
                expected: 2,
                supplied: 1
            }
        ));
    }

    #[test]
    fn test_mixed_placeholder_styles_rejected() {
        let err = pipeline()
            .prepare(
                "SELECT * FROM t WHERE a = :a AND b = ?",
                vec![PrepareArg::map(vec![("a", Value::Int(1))])],
                Dialect::Postgres,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterStyleMismatch);
    }

    #[test]
    fn test_dict_for_positional_rejected() {
        let err = pipeline()
            .prepare(
                "SELECT * FROM t WHERE a = ?",
                vec![PrepareArg::map(vec![("a", Value::Int(1))])],
                Dialect::Sqlite,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterStyleMismatch);
    }

    #[test]
    fn test_map_merge_later_overrides() {
        let stmt = pipeline()
            .prepare(
                "SELECT * FROM t WHERE a = :a",
                vec![
                    PrepareArg::map(vec![("a", Value::Int(1))]),
                    PrepareArg::map(vec![("a", Value::Int(2))]),
                ],
                Dialect::Postgres,
            )
            .unwrap();
        assert_eq!(stmt.parameters, Parameters::Positional(vec![Value::Int(2)]));
    }

    #[test]
    fn test_parse_error_carries_location() {
        let err = pipeline()
            .prepare("SELEC * FROM t", vec![], Dialect::Postgres)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_empty_statement_is_parse_error() {
        let err = pipeline().prepare("   ", vec![], Dialect::Postgres).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_repeated_named_placeholder_to_numeric_reuses_number() {
        let stmt = pipeline()
            .prepare(
                "SELECT * FROM t WHERE a = :x OR b = :x",
                vec![PrepareArg::map(vec![("x", Value::Int(9))])],
                Dialect::Postgres,
            )
            .unwrap();
        assert_eq!(stmt.text, "SELECT * FROM t WHERE a = $1 OR b = $1");
        assert_eq!(stmt.parameters, Parameters::Positional(vec![Value::Int(9)]));
    }

    #[test]
    fn test_repeated_named_placeholder_to_qmark_duplicates_value() {
        let stmt = pipeline()
            .prepare(
                "SELECT * FROM t WHERE a = :x OR b = :x",
                vec![PrepareArg::map(vec![("x", Value::Int(9))])],
                Dialect::Sqlite,
            )
            .unwrap();
        assert_eq!(stmt.text, "SELECT * FROM t WHERE a = ? OR b = ?");
        assert_eq!(
            stmt.parameters,
            Parameters::Positional(vec![Value::Int(9), Value::Int(9)])
        );
    }

    #[test]
    fn test_named_kept_for_named_dialect() {
        let stmt = pipeline()
            .prepare(
                "SELECT * FROM t WHERE name = :name",
                vec![PrepareArg::map(vec![("name", Value::String("x".into()))])],
                Dialect::Spanner,
            )
            .unwrap();
        assert_eq!(stmt.text, "SELECT * FROM t WHERE name = @name");
        assert!(matches!(stmt.parameters, Parameters::Named(_)));
    }

    #[test]
    fn test_oracle_numeric_colon_shim() {
        let stmt = pipeline()
            .prepare(
                "SELECT * FROM t WHERE a = :1 AND b = :2",
                vec![PrepareArg::list(vec![Value::Int(1), Value::Int(2)])],
                Dialect::Oracle,
            )
            .unwrap();
        // Text untouched; container stays positional
        assert_eq!(stmt.text, "SELECT * FROM t WHERE a = :1 AND b = :2");
        assert!(matches!(stmt.parameters, Parameters::Positional(_)));
    }

    #[test]
    fn test_builder_input_with_filter() {
        let builder = SelectBuilder::new()
            .select(vec![crate::sql::expr::col("id")])
            .from_("users")
            .where_(("active", true));

        let stmt = pipeline()
            .prepare(
                builder,
                vec![PrepareArg::filter(LimitOffset::new(10, 0))],
                Dialect::Postgres,
            )
            .unwrap();

        assert!(stmt.text.contains("LIMIT 10 OFFSET 0"));
        assert_eq!(stmt.parameters.len(), 1);
    }

    #[test]
    fn test_text_input_with_collection_filter() {
        let stmt = pipeline()
            .prepare(
                "SELECT * FROM users WHERE active = :active",
                vec![
                    PrepareArg::map(vec![("active", Value::Bool(true))]),
                    PrepareArg::filter(CollectionFilter::new(
                        "id",
                        Some(vec![Value::Int(1), Value::Int(2)]),
                    )),
                ],
                Dialect::Postgres,
            )
            .unwrap();

        assert!(stmt.text.contains("AND \"id\" IN ($2, $3)"));
        assert_eq!(stmt.parameters.len(), 3);
    }

    #[test]
    fn test_statement_passthrough() {
        let p = pipeline();
        let stmt = p
            .prepare("SELECT 1", vec![], Dialect::Postgres)
            .unwrap();
        let again = p.prepare(stmt.clone(), vec![], Dialect::Postgres).unwrap();
        assert_eq!(stmt, again);
    }

    #[test]
    fn test_prepare_many() {
        let stmt = pipeline()
            .prepare_many(
                "INSERT INTO t (a, b) VALUES (?, ?)",
                vec![
                    ParamsArg::List(vec![Value::Int(1), Value::Int(2)]),
                    ParamsArg::List(vec![Value::Int(3), Value::Int(4)]),
                ],
                Dialect::Sqlite,
            )
            .unwrap();

        assert!(stmt.is_many);
        assert_eq!(stmt.kind, StatementKind::Insert);
        assert_eq!(
            stmt.parameters,
            Parameters::Many(vec![
                vec![Value::Int(1), Value::Int(2)],
                vec![Value::Int(3), Value::Int(4)],
            ])
        );
    }

    #[test]
    fn test_script_split_and_flags() {
        let stmt = pipeline()
            .prepare_script(
                "CREATE TABLE a (x INT); INSERT INTO a VALUES (1); SELECT * FROM a",
                vec![],
                Dialect::Sqlite,
            )
            .unwrap();

        assert!(stmt.is_script);
        assert_eq!(stmt.kind, StatementKind::Script);
        assert_eq!(stmt.text.matches(';').count(), 2);
    }

    #[test]
    fn test_script_with_uniform_named_placeholders() {
        let stmt = pipeline()
            .prepare_script(
                "UPDATE a SET x = :v; UPDATE b SET x = :v",
                vec![PrepareArg::map(vec![("v", Value::Int(1))])],
                Dialect::Postgres,
            )
            .unwrap();
        assert!(matches!(stmt.parameters, Parameters::Named(_)));
    }

    #[test]
    fn test_script_with_mixed_shapes_rejects_params() {
        let err = pipeline()
            .prepare_script(
                "UPDATE a SET x = :v; UPDATE b SET x = ?",
                vec![PrepareArg::map(vec![("v", Value::Int(1))])],
                Dialect::Postgres,
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParameterStyleMismatch);
    }

    #[test]
    fn test_multi_statement_text_routes_to_script() {
        let stmt = pipeline()
            .prepare(
                "CREATE TABLE a (x INT); SELECT * FROM a",
                vec![],
                Dialect::Sqlite,
            )
            .unwrap();
        assert!(stmt.is_script);
    }

    #[test]
    fn test_returning_detected_on_raw_text() {
        let stmt = pipeline()
            .prepare(
                "DELETE FROM users WHERE id = ? RETURNING id, email",
                vec![PrepareArg::scalar(1_i64)],
                Dialect::Postgres,
            )
            .unwrap();
        assert!(stmt.returning);
        assert_eq!(stmt.kind, StatementKind::Delete);
    }

    #[test]
    fn test_kind_hint_overrides_inference() {
        let stmt = pipeline()
            .prepare_with_kind(
                "CALL refresh_rollups()",
                vec![],
                Dialect::Postgres,
                Some(StatementKind::Execute),
            )
            .unwrap();
        assert_eq!(stmt.kind, StatementKind::Execute);

        let stmt = pipeline()
            .prepare_with_kind(
                "SELECT 1",
                vec![],
                Dialect::Postgres,
                Some(StatementKind::Execute),
            )
            .unwrap();
        assert_eq!(stmt.kind, StatementKind::Execute);
    }

    #[test]
    fn test_unreferenced_supplied_parameter_is_not_rejected() {
        let stmt = pipeline()
            .prepare(
                "SELECT * FROM t WHERE a = :a",
                vec![PrepareArg::map(vec![
                    ("a", Value::Int(1)),
                    ("extra", Value::Int(2)),
                ])],
                Dialect::Postgres,
            )
            .unwrap();
        assert_eq!(stmt.parameters.len(), 1);
    }
}
