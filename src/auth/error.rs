//! Auth subsystem error definitions.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::environment::Server;

/// Token cache file failures. Every variant names the file involved.
#[derive(Debug)]
pub enum TokenFileError {
    /// The file or its directory could not be created, read, or written.
    AccessDenied {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid JSON.
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The file is JSON but does not match the token cache layout.
    SchemaMismatch {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl TokenFileError {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::AccessDenied { path, .. }
            | Self::Malformed { path, .. }
            | Self::SchemaMismatch { path, .. } => path,
        }
    }
}

impl fmt::Display for TokenFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessDenied { path, source } => write!(
                f,
                "cannot access token cache `{}`: {source} (check the file and directory permissions)",
                path.display()
            ),
            Self::Malformed { path, source } => write!(
                f,
                "token cache `{}` is not valid JSON: {source}",
                path.display()
            ),
            Self::SchemaMismatch { path, source } => write!(
                f,
                "token cache `{}` has an unexpected layout: {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for TokenFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::AccessDenied { source, .. } => Some(source),
            Self::Malformed { source, .. } | Self::SchemaMismatch { source, .. } => Some(source),
        }
    }
}

/// Errors surfaced by login, refresh and token resolution.
#[derive(Debug)]
pub enum AuthError {
    /// Redirect was missing `code`/`state`, carried a mismatched `state`, or
    /// reported an authorization-server error.
    Authorization(String),
    /// Token endpoint answered with a non-success status.
    TokenExchange { status: u16, body: String },
    /// Token endpoint answered 2xx with a body that is not a token response.
    TokenParse(String),
    TokenFile(TokenFileError),
    /// The fixed loopback callback address could not be bound.
    ListenerBind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    /// Transport failure while talking to the token endpoint.
    Http(reqwest::Error),
    /// Refresh requested but no refresh token is cached for the environment.
    RefreshUnavailable(Server),
    /// No redirect arrived within the configured callback timeout.
    CallbackTimeout(Duration),
}

impl AuthError {
    /// True for contract violations by the authorization server. These are
    /// not retryable and are reported as internal failures.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TokenParse(_))
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authorization(msg) => write!(f, "authorization failed: {msg}"),
            Self::TokenExchange { status, body } => {
                write!(f, "token endpoint returned status {status}: {body}")
            }
            Self::TokenParse(msg) => {
                write!(f, "token endpoint returned an unexpected response: {msg}")
            }
            Self::TokenFile(err) => write!(f, "{err}"),
            Self::ListenerBind { addr, source } => write!(
                f,
                "cannot listen for the login callback on {addr}: {source} (is another login already running?)"
            ),
            Self::Http(err) => write!(f, "http: {err}"),
            Self::RefreshUnavailable(server) => write!(
                f,
                "no refresh token saved for {server}; run `polar login --server {server}`"
            ),
            Self::CallbackTimeout(after) => write!(
                f,
                "no login callback received within {}s",
                after.as_secs()
            ),
        }
    }
}

impl std::error::Error for AuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TokenFile(err) => Some(err),
            Self::ListenerBind { source, .. } => Some(source),
            Self::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TokenFileError> for AuthError {
    fn from(value: TokenFileError) -> Self {
        Self::TokenFile(value)
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_exchange_display_includes_status_and_body() {
        let err = AuthError::TokenExchange {
            status: 401,
            body: "{\"error\":\"invalid_grant\"}".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("401"));
        assert!(text.contains("invalid_grant"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn token_parse_is_fatal() {
        assert!(AuthError::TokenParse("missing access_token".into()).is_fatal());
        assert!(!AuthError::Authorization("state mismatch".into()).is_fatal());
    }

    #[test]
    fn token_file_errors_name_the_path() {
        let err = TokenFileError::AccessDenied {
            path: PathBuf::from("/home/u/.polar/tokens.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/home/u/.polar/tokens.json"));
        let wrapped = AuthError::from(err);
        assert!(wrapped.to_string().contains("permissions"));
    }
}
