mod assistant;
mod identity;
mod observability;
mod runs;
mod server;
mod store;

pub use assistant::*;
pub use identity::*;
pub use observability::*;
pub use runs::*;
pub use server::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub runs: RunsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.identity.cookie_name.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "identity.cookie_name".into(),
                message: "cookie_name must not be empty".into(),
            });
        }

        if self.identity.key.is_some() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "identity.key".into(),
                message: "plaintext key in config; prefer identity.key_env".into(),
            });
        }

        if self.assistant.base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "assistant.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        }

        if self.assistant.assistant_id.is_none()
            && std::env::var(&self.assistant.assistant_id_env).is_err()
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "assistant.assistant_id".into(),
                message: format!(
                    "no assistant id configured and ${} is not set",
                    self.assistant.assistant_id_env
                ),
            });
        }

        if !self.store.table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            || self.store.table.is_empty()
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "store.table".into(),
                message: "table name must be a non-empty identifier ([A-Za-z0-9_])".into(),
            });
        }

        if self.store.max_connections == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "store.max_connections".into(),
                message: "max_connections must be greater than 0".into(),
            });
        }

        if self.runs.poll_interval_ms == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "runs.poll_interval_ms".into(),
                message: "poll interval must be greater than 0".into(),
            });
        }

        if !(0.0..=1.0).contains(&self.observability.sample_rate) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "observability.sample_rate".into(),
                message: "sample_rate must be between 0.0 and 1.0".into(),
            });
        }

        if self.observability.otlp_endpoint.as_deref() == Some("") {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "observability.otlp_endpoint".into(),
                message: "empty endpoint; omit the field to disable export".into(),
            });
        }

        if self.server.cors.allowed_origins.len() == 1
            && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)".into(),
            });
        }

        errors
    }
}
