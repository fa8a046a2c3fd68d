//! Configuration loading.
//!
//! Sources are layered: an explicit `--config` path, then `./polar.toml`,
//! then `~/.polar/polar.toml`, then built-in defaults. `POLAR_*` and
//! `NO_COLOR` environment variables are applied last.

mod defaults;
mod env;
mod loader;
mod sources;
mod types;

pub use loader::load_config;
pub use types::{
    AuthConfig, Config, DisplayConfig, GeneralConfig, LoadedConfig, LogFormat, LoggingConfig,
    MigrationConfig, NetworkConfig,
};
