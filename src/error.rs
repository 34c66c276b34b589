//! Crate-wide error taxonomy.
//!
//! Each module defines its own `thiserror` enum; every one of them
//! exposes `kind()` mapping into this closed set so callers can branch
//! without matching concrete error types. Error messages never include
//! parameter values.

/// The closed set of error categories this crate surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Input SQL did not parse under the requested dialect.
    Parse,
    /// Positional and named parameters were mixed, or the container
    /// shape does not match the SQL's placeholder style.
    ParameterStyleMismatch,
    /// Positional parameter count differs from placeholder count.
    ParameterCountMismatch,
    /// A named placeholder has no matching parameter entry.
    MissingParameter,
    /// A CTE alias was bound twice (or would close a cycle).
    DuplicateCte,
    /// A builder could not assemble a valid statement.
    BuildFailure,
    /// Event channel operation failed.
    EventChannel,
    /// A native notify envelope exceeded the configured byte bound.
    PayloadTooLarge,
    /// The component was configured in an unusable way.
    ImproperConfiguration,
    /// An underlying dependency (session, driver, serialization) failed.
    Dependency,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Parse => "parse",
            ErrorKind::ParameterStyleMismatch => "parameter_style_mismatch",
            ErrorKind::ParameterCountMismatch => "parameter_count_mismatch",
            ErrorKind::MissingParameter => "missing_parameter",
            ErrorKind::DuplicateCte => "duplicate_cte",
            ErrorKind::BuildFailure => "build_failure",
            ErrorKind::EventChannel => "event_channel",
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::ImproperConfiguration => "improper_configuration",
            ErrorKind::Dependency => "dependency",
        };
        write!(f, "{name}")
    }
}
