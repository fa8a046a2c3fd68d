//! Error types shared by config, the HTTP clients, migration and listen.
//!
//! Login and token-cache errors live in [`crate::auth::AuthError`].

use std::fmt;

use crate::auth::AuthError;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Toml(e) => write!(f, "toml: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Toml(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e)
    }
}

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// Errors from the commerce and billing HTTP clients.
#[derive(Debug)]
pub enum ApiError {
    /// Network / reqwest-level error.
    Http(reqwest::Error),
    /// Non-2xx status from the API.
    Status {
        code: u16,
        body: String,
        retry_after_secs: Option<u64>,
    },
    /// 2xx response whose body did not match the expected shape.
    InvalidResponse(String),
    /// No usable token could be obtained.
    Auth(AuthError),
}

impl ApiError {
    pub fn status(code: u16, body: String, retry_after_secs: Option<u64>) -> Self {
        Self::Status {
            code,
            body,
            retry_after_secs,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Status {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(e) => write!(f, "http: {e}"),
            Self::Status { code, body, .. } => write!(f, "status {code}: {body}"),
            Self::InvalidResponse(msg) => write!(f, "invalid response: {msg}"),
            Self::Auth(e) => write!(f, "auth: {e}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e),
            Self::Auth(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

// ---------------------------------------------------------------------------
// MigrationError
// ---------------------------------------------------------------------------

/// Errors that abort a migration before any record is created.
#[derive(Debug)]
pub enum MigrationError {
    /// Reading from the billing platform failed.
    Source { entity: &'static str, source: ApiError },
    /// The user aborted or gave unusable prompt input.
    Prompt(String),
    UnsupportedProvider(String),
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source { entity, source } => write!(f, "failed to list {entity}: {source}"),
            Self::Prompt(msg) => write!(f, "{msg}"),
            Self::UnsupportedProvider(name) => {
                write!(f, "unsupported migration provider `{name}`")
            }
        }
    }
}

impl std::error::Error for MigrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ListenError
// ---------------------------------------------------------------------------

/// Errors that end `polar listen`.
#[derive(Debug)]
pub enum ListenError {
    /// The cached login has no organization attached.
    NoOrganization,
    /// The target URL given on the command line is not an absolute URL.
    InvalidTarget(String),
    /// The event stream could not be opened or was rejected.
    Connect(ApiError),
    /// The stream broke or ended.
    Stream(String),
}

impl fmt::Display for ListenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOrganization => write!(
                f,
                "no organization selected; run `polar login` first to select an organization"
            ),
            Self::InvalidTarget(url) => write!(f, "invalid forward url `{url}`"),
            Self::Connect(e) => write!(f, "failed to open event stream: {e}"),
            Self::Stream(msg) => write!(f, "event stream error: {msg}"),
        }
    }
}

impl std::error::Error for ListenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ApiError> for ListenError {
    fn from(e: ApiError) -> Self {
        Self::Connect(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let e = ConfigError::from(io_err);
        let s = e.to_string();
        assert!(s.starts_with("io:"), "got: {s}");
        assert!(s.contains("file not found"));
    }

    #[test]
    fn config_error_from_toml() {
        let toml_err: toml::de::Error = toml::from_str::<toml::Value>("x = [unclosed").unwrap_err();
        let e = ConfigError::from(toml_err);
        assert!(e.to_string().starts_with("toml:"));
    }

    #[test]
    fn api_status_exposes_code_and_retry_after() {
        let e = ApiError::status(429, "slow down".into(), Some(3));
        assert_eq!(e.status_code(), Some(429));
        assert_eq!(e.retry_after_secs(), Some(3));
        assert_eq!(e.to_string(), "status 429: slow down");
        assert_eq!(ApiError::InvalidResponse("x".into()).status_code(), None);
    }

    #[test]
    fn api_error_wraps_auth_failures() {
        let e = ApiError::from(AuthError::Authorization("state mismatch".into()));
        assert!(e.to_string().starts_with("auth: authorization failed"), "got: {e}");
    }

    #[test]
    fn migration_source_error_names_entity() {
        let e = MigrationError::Source {
            entity: "customers",
            source: ApiError::status(401, "bad key".into(), None),
        };
        assert_eq!(e.to_string(), "failed to list customers: status 401: bad key");
    }

    #[test]
    fn listen_errors_have_actionable_text() {
        assert!(ListenError::NoOrganization.to_string().contains("polar login"));
        let e = ListenError::from(ApiError::status(403, "forbidden".into(), None));
        assert!(e.to_string().contains("403"));
    }
}
