//! Top-level config loading pipeline.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConfigError;

use super::env::apply_env_overrides;
use super::sources::read_config_text_with_sources;
use super::{Config, LoadedConfig};

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from --config flag).
pub fn load_config(path_override: Option<&str>) -> Result<LoadedConfig, ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        dirs::home_dir,
    )
}

pub(super) fn load_config_from_sources<FRead, FEnv, FHome>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    home_dir: FHome,
) -> Result<LoadedConfig, ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FHome: Fn() -> Option<PathBuf>,
{
    let (config_text, source) =
        read_config_text_with_sources(path_override, &read_file, &home_dir)?;
    let mut config: Config = toml::from_str(&config_text)?;
    normalize(&mut config);
    apply_env_overrides(&mut config, &env_lookup)?;

    let source = source.describe();
    debug!(%source, "configuration loaded");
    Ok(LoadedConfig { config, source })
}

/// Clamp file values the same way env overrides are clamped.
fn normalize(config: &mut Config) {
    config.network.http_timeout_secs = config.network.http_timeout_secs.max(1);
    config.migration.concurrency = config.migration.concurrency.max(1);
    if let Some(secs) = config.auth.callback_timeout_secs.as_mut() {
        *secs = (*secs).max(1);
    }
    if config.logging.level.trim().is_empty() {
        config.logging.level = super::defaults::DEFAULT_LOG_LEVEL.to_string();
    }
}
