//! Environment variable overrides (`POLAR_*`, `NO_COLOR`).

use crate::auth::Server;
use crate::error::ConfigError;

use super::Config;

pub(super) fn apply_env_overrides<FEnv>(
    config: &mut Config,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(server) = non_empty(env_lookup, "POLAR_SERVER") {
        config.general.server = server.parse::<Server>().map_err(|msg| {
            ConfigError::Invalid(format!("invalid POLAR_SERVER value: {msg}"))
        })?;
    }
    if let Some(secs) = non_empty(env_lookup, "POLAR_HTTP_TIMEOUT_SECS") {
        // Clamp to at least 1 second to avoid accidental "no-timeout" behavior.
        config.network.http_timeout_secs = parse_u64("POLAR_HTTP_TIMEOUT_SECS", &secs)?.max(1);
    }
    if let Some(secs) = non_empty(env_lookup, "POLAR_CALLBACK_TIMEOUT_SECS") {
        config.auth.callback_timeout_secs =
            Some(parse_u64("POLAR_CALLBACK_TIMEOUT_SECS", &secs)?.max(1));
    }
    if let Some(width) = non_empty(env_lookup, "POLAR_MIGRATION_CONCURRENCY") {
        let width = parse_u64("POLAR_MIGRATION_CONCURRENCY", &width)?;
        config.migration.concurrency = usize::try_from(width).unwrap_or(usize::MAX).max(1);
    }
    if let Some(level) = non_empty(env_lookup, "POLAR_LOG") {
        config.logging.level = level;
    }
    // https://no-color.org: any non-empty value disables color.
    if non_empty(env_lookup, "NO_COLOR").is_some() {
        config.display.color = false;
    }
    Ok(())
}

fn non_empty<FEnv>(env_lookup: &FEnv, name: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_u64(name: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| {
        ConfigError::Invalid(format!(
            "invalid {name} value `{value}`: expected a non-negative integer"
        ))
    })
}
