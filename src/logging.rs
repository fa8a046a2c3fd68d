//! Tracing subscriber setup.
//!
//! Diagnostics go to stderr so that stdout stays reserved for command
//! output (listen forwarding lines, migration summaries).

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Initialize tracing from the `[logging]` config section.
///
/// Uses `try_init` so repeated calls (tests, nested runs) are harmless.
pub fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("warn"));

    let result = match config.format {
        LogFormat::Json => fmt::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .try_init(),
        LogFormat::Text => fmt::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init(),
    };
    drop(result);
}
