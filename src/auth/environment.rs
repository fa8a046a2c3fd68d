//! Compiled-in OAuth client configuration for the two Polar environments.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const PRODUCTION_CLIENT_ID: &str = "polar_ci_gBnJ_Yv_uSGm5mtoPa2cCA";
const SANDBOX_CLIENT_ID: &str = "polar_ci_KTj3Pfw3PE54dsjgcjVT6w";

const PRODUCTION_AUTHORIZATION_URL: &str = "https://polar.sh/oauth2/authorize";
const SANDBOX_AUTHORIZATION_URL: &str = "https://sandbox.polar.sh/oauth2/authorize";

const PRODUCTION_TOKEN_URL: &str = "https://api.polar.sh/v1/oauth2/token";
const SANDBOX_TOKEN_URL: &str = "https://sandbox-api.polar.sh/v1/oauth2/token";

const PRODUCTION_API_BASE_URL: &str = "https://api.polar.sh";
const SANDBOX_API_BASE_URL: &str = "https://sandbox-api.polar.sh";

/// Redirect URI registered with both authorization servers.
pub const REDIRECT_URL: &str = "http://127.0.0.1:3333/oauth/callback";

/// Scopes requested on every login.
pub const SCOPES: &[&str] = &[
    "openid",
    "profile",
    "email",
    "user:read",
    "organizations:read",
    "organizations:write",
    "products:read",
    "products:write",
    "benefits:read",
    "benefits:write",
    "files:read",
    "files:write",
    "discounts:read",
    "discounts:write",
    "customers:read",
    "customers:write",
];

/// Target Polar environment. Threaded explicitly through every auth call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Server {
    Production,
    Sandbox,
}

impl Server {
    pub const ALL: [Server; 2] = [Server::Production, Server::Sandbox];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Sandbox => "sandbox",
        }
    }

    /// Base URL of the commerce API for this environment.
    pub fn api_base_url(self) -> &'static str {
        match self {
            Self::Production => PRODUCTION_API_BASE_URL,
            Self::Sandbox => SANDBOX_API_BASE_URL,
        }
    }
}

impl fmt::Display for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Server {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "sandbox" => Ok(Self::Sandbox),
            other => Err(format!(
                "unknown server `{other}` (expected `production` or `sandbox`)"
            )),
        }
    }
}

/// OAuth client settings for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub authorization_url: String,
    pub token_url: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
}

impl OAuthClientConfig {
    fn compiled(client_id: &str, authorization_url: &str, token_url: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            authorization_url: authorization_url.to_string(),
            token_url: token_url.to_string(),
            redirect_url: REDIRECT_URL.to_string(),
            scopes: SCOPES.iter().map(|scope| scope.to_string()).collect(),
        }
    }

    /// Scopes joined the way the authorization server expects them.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Per-environment OAuth client table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthEndpoints {
    production: OAuthClientConfig,
    sandbox: OAuthClientConfig,
}

impl OAuthEndpoints {
    /// The endpoints registered for this CLI.
    pub fn compiled() -> Self {
        Self {
            production: OAuthClientConfig::compiled(
                PRODUCTION_CLIENT_ID,
                PRODUCTION_AUTHORIZATION_URL,
                PRODUCTION_TOKEN_URL,
            ),
            sandbox: OAuthClientConfig::compiled(
                SANDBOX_CLIENT_ID,
                SANDBOX_AUTHORIZATION_URL,
                SANDBOX_TOKEN_URL,
            ),
        }
    }

    /// Build a custom table (used to point the flow at local mock servers).
    pub fn new(production: OAuthClientConfig, sandbox: OAuthClientConfig) -> Self {
        Self {
            production,
            sandbox,
        }
    }

    pub fn for_server(&self, server: Server) -> &OAuthClientConfig {
        match server {
            Server::Production => &self.production,
            Server::Sandbox => &self.sandbox,
        }
    }
}

impl Default for OAuthEndpoints {
    fn default() -> Self {
        Self::compiled()
    }
}
