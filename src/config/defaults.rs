//! Default configuration constants.

/// Timeout applied to token, commerce and billing HTTP requests.
pub(super) const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
/// Worker-pool width used when creating migrated records.
pub(super) const DEFAULT_MIGRATION_CONCURRENCY: usize = 10;
/// Tracing filter used when neither config nor `POLAR_LOG` sets one.
pub(super) const DEFAULT_LOG_LEVEL: &str = "warn";

/// Local config file checked in the working directory.
pub(super) const LOCAL_CONFIG_FILE: &str = "polar.toml";
/// Directory under `$HOME` holding the global config and token cache.
pub(super) const GLOBAL_CONFIG_DIR: &str = ".polar";
