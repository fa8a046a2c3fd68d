//! Configuration data model.
//!
//! Every section deserializes with `#[serde(default)]`, so a partial (or
//! empty) file fills the remaining keys from the built-in defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::auth::Server;

use super::defaults::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LOG_LEVEL, DEFAULT_MIGRATION_CONCURRENCY};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub network: NetworkConfig,
    pub auth: AuthConfig,
    pub migration: MigrationConfig,
    pub logging: LoggingConfig,
    pub display: DisplayConfig,
}

impl Config {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.network.http_timeout_secs.max(1))
    }

    /// `None` waits for the browser redirect indefinitely.
    pub fn callback_timeout(&self) -> Option<Duration> {
        self.auth.callback_timeout_secs.map(Duration::from_secs)
    }

    pub fn migration_concurrency(&self) -> usize {
        self.migration.concurrency.max(1)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Environment used when a command gets no `--server` flag.
    pub server: Server,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            server: Server::Production,
        }
    }
}

/// Network/HTTP timeout policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub http_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub callback_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    pub concurrency: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_MIGRATION_CONCURRENCY,
        }
    }
}

/// Output format for tracing events on stderr.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string, e.g. `warn` or `polar=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Display / rendering preferences.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub color: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

/// Configuration payload plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// Human-readable description of the file that was used.
    pub source: String,
}
