//! CLI argument parsing via clap.

use clap::{Parser, Subcommand};
use polar::auth::Server;
use polar::build_info::{HELP_BUILD_METADATA, LONG_VERSION};

/// Command-line client for Polar: login, billing migration and webhook relay.
#[derive(Debug, Parser)]
#[command(
    name = "polar",
    version,
    long_version = LONG_VERSION,
    after_help = HELP_BUILD_METADATA
)]
pub struct Args {
    /// Path to config file (default: ./polar.toml or ~/.polar/polar.toml).
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<String>,

    /// Disable color output.
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in through the browser and select an organization.
    Login {
        /// Environment to log into (production or sandbox).
        #[arg(long, value_parser = parse_server)]
        server: Option<Server>,

        /// Only show saved-login health for both environments.
        #[arg(long, conflicts_with = "refresh")]
        check: bool,

        /// Renew the saved login with its refresh token instead of the browser.
        #[arg(long)]
        refresh: bool,
    },

    /// Migrate products and customers from another billing platform.
    Migrate {
        #[arg(long, value_parser = parse_server)]
        server: Option<Server>,

        /// Source platform; prompts when omitted.
        #[arg(long)]
        provider: Option<String>,
    },

    /// Stream webhook events and forward them to a local URL.
    Listen {
        /// Target URL, e.g. http://localhost:3000/api/webhooks
        url: String,

        #[arg(long, value_parser = parse_server)]
        server: Option<Server>,
    },
}

fn parse_server(value: &str) -> Result<Server, String> {
    value.parse()
}
