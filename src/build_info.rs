//! Compile-time build metadata exposed to CLI surfaces.

/// Semver package version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// VCS commit hash captured at build time.
pub const GIT_COMMIT: &str = env!("POLAR_BUILD_GIT_HASH");

/// Build timestamp captured at compile time.
pub const BUILD_TIMESTAMP: &str = env!("POLAR_BUILD_TIMESTAMP");

/// Help trailer block that surfaces build metadata in `polar --help`.
pub const HELP_BUILD_METADATA: &str = concat!(
    "Build metadata:\n  commit: ",
    env!("POLAR_BUILD_GIT_HASH"),
    "\n  built: ",
    env!("POLAR_BUILD_TIMESTAMP")
);

/// Version block printed by `polar --version`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("POLAR_BUILD_GIT_HASH"),
    "\nbuilt: ",
    env!("POLAR_BUILD_TIMESTAMP")
);

/// User agent sent with every outbound HTTP request.
pub fn user_agent() -> String {
    format!("polar-cli/{VERSION}")
}
