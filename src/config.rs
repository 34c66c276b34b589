//! TOML-based configuration for the event channel.
//!
//! Supports a config file with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [events]
//! backend = "hybrid"
//! dialect = "postgres"
//! queue_table = "event_queue"
//! lease_seconds = 30
//! retention_seconds = 0
//! poll_interval_ms = 1000
//! notify_payload_limit = 8000
//!
//! [events.dsn]
//! url = "${DATABASE_URL}"
//! ```

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::events::queue::QueueConfig;
use crate::sql::dialect::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),

    #[error("Unknown event backend: {0}")]
    UnknownBackend(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SettingsError {
    /// Map into the crate-wide error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ImproperConfiguration
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Event channel configuration.
    pub events: EventSettings,
}

/// Event channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EventSettings {
    /// Backend name: "native", "durable", or "hybrid".
    pub backend: String,

    /// Rendering dialect for queue statements.
    pub dialect: String,

    /// Table holding queued events.
    pub queue_table: String,

    /// Claim lease length in seconds.
    pub lease_seconds: u64,

    /// Retention after ack: 0 deletes acked rows.
    pub retention_seconds: u64,

    /// Use SELECT ... FOR UPDATE when claiming.
    pub select_for_update: bool,

    /// Add SKIP LOCKED to the claim's locking clause.
    pub skip_locked: bool,

    /// Store payloads as native JSON values instead of encoded text.
    pub json_passthrough: bool,

    /// Byte bound for native notify envelopes.
    pub notify_payload_limit: usize,

    /// Default subscriber poll interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Driver connection strings (supports `${ENV_VAR}` expansion).
    pub dsn: HashMap<String, String>,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            backend: "durable".into(),
            dialect: "postgres".into(),
            queue_table: "event_queue".into(),
            lease_seconds: 30,
            retention_seconds: 0,
            select_for_update: true,
            skip_locked: true,
            json_passthrough: false,
            notify_payload_limit: crate::events::DEFAULT_NOTIFY_PAYLOAD_LIMIT,
            poll_interval_ms: 1000,
            dsn: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse settings from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        self.events.dialect()?;
        match self.events.backend.as_str() {
            "native" | "listen_notify" | "durable" | "table" | "hybrid"
            | "listen_notify_durable" => {}
            other => return Err(SettingsError::UnknownBackend(other.to_string())),
        }
        if self.events.lease_seconds == 0 {
            return Err(SettingsError::InvalidConfig(
                "lease_seconds must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl EventSettings {
    /// Resolve the configured dialect.
    pub fn dialect(&self) -> Result<Dialect, SettingsError> {
        Dialect::from_name(&self.dialect)
            .ok_or_else(|| SettingsError::UnknownDialect(self.dialect.clone()))
    }

    /// Resolve a DSN by name, expanding environment variables.
    pub fn resolve_dsn(&self, name: &str) -> Result<String, SettingsError> {
        let raw = self
            .dsn
            .get(name)
            .ok_or_else(|| SettingsError::InvalidConfig(format!("no dsn named {name}")))?;
        expand_env_vars(raw)
    }

    /// Derive the durable queue configuration.
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            queue_table: self.queue_table.clone(),
            lease_seconds: self.lease_seconds,
            retention_seconds: self.retention_seconds,
            select_for_update: self.select_for_update,
            skip_locked: self.skip_locked,
            json_passthrough: self.json_passthrough,
        }
    }

    /// Default subscriber poll interval.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            if chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(chars.next().expect("peeked"));
                }
                let value = env::var(&var_name)
                    .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                result.push_str(&value);
            } else {
                // $VAR (ends at non-alphanumeric/underscore)
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        var_name.push(chars.next().expect("peeked"));
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    // A lone $, keep it
                    result.push('$');
                } else {
                    let value = env::var(&var_name)
                        .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                    result.push_str(&value);
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.events.backend, "durable");
        assert_eq!(settings.events.lease_seconds, 30);
        assert_eq!(settings.events.queue_table, "event_queue");
    }

    #[test]
    fn test_from_toml() {
        let settings = Settings::from_toml(
            r#"
            [events]
            backend = "hybrid"
            dialect = "postgres"
            lease_seconds = 5
            skip_locked = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.events.backend, "hybrid");
        assert_eq!(settings.events.lease_seconds, 5);
        assert!(!settings.events.skip_locked);
        // Unspecified fields keep their defaults
        assert_eq!(settings.events.retention_seconds, 0);

        let queue = settings.events.queue_config();
        assert_eq!(queue.lease_seconds, 5);
        assert!(!queue.skip_locked);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = Settings::from_toml("[events]\nbackend = \"carrier_pigeon\"").unwrap_err();
        assert!(matches!(err, SettingsError::UnknownBackend(_)));
        assert_eq!(err.kind(), ErrorKind::ImproperConfiguration);
    }

    #[test]
    fn test_unknown_dialect_rejected() {
        let err = Settings::from_toml("[events]\ndialect = \"clipper\"").unwrap_err();
        assert!(matches!(err, SettingsError::UnknownDialect(_)));
    }

    #[test]
    fn test_zero_lease_rejected() {
        let err = Settings::from_toml("[events]\nlease_seconds = 0").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidConfig(_)));
    }

    #[test]
    fn test_expand_env_vars_braces() {
        env::set_var("SQLBRIDGE_TEST_VAR", "hello");
        assert_eq!(expand_env_vars("${SQLBRIDGE_TEST_VAR}").unwrap(), "hello");
        assert_eq!(
            expand_env_vars("pre_${SQLBRIDGE_TEST_VAR}_post").unwrap(),
            "pre_hello_post"
        );
        env::remove_var("SQLBRIDGE_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let err = expand_env_vars("${SQLBRIDGE_DEFINITELY_MISSING}").unwrap_err();
        assert!(matches!(err, SettingsError::MissingEnvVar(_)));
    }
}
