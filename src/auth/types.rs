//! Public auth model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::environment::Server;
use super::secret;
use secrecy::SecretString;

/// One OAuth grant for one environment, as cached on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(with = "secret")]
    pub token: SecretString,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "secret::option")]
    pub refresh_token: Option<SecretString>,
    #[serde(with = "duration_millis")]
    pub expires_in: Duration,
    pub expires_at: DateTime<Utc>,
    pub scope: Vec<String>,
    pub server: Server,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_slug: Option<String>,
}

impl Token {
    /// Build a freshly issued token. `expires_at` is always derived from the
    /// issuance instant, never carried over from older records.
    pub fn issue(
        server: Server,
        access_token: SecretString,
        refresh_token: Option<SecretString>,
        expires_in: Duration,
        scope: Vec<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let expires_at = chrono::Duration::from_std(expires_in)
            .ok()
            .and_then(|delta| issued_at.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            token: access_token,
            refresh_token,
            expires_in,
            expires_at,
            scope,
            server,
            organization_id: None,
            organization_slug: None,
        }
    }

    /// Expired at `now` when `expires_at` is at or before it.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Attach the organization selected after login.
    pub fn with_organization(mut self, id: impl Into<String>, slug: impl Into<String>) -> Self {
        self.organization_id = Some(id.into());
        self.organization_slug = Some(slug.into());
        self
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        let refresh_matches = match (&self.refresh_token, &other.refresh_token) {
            (Some(left), Some(right)) => secret::same(left, right),
            (None, None) => true,
            _ => false,
        };
        secret::same(&self.token, &other.token)
            && refresh_matches
            && self.expires_in == other.expires_in
            && self.expires_at == other.expires_at
            && self.scope == other.scope
            && self.server == other.server
            && self.organization_id == other.organization_id
            && self.organization_slug == other.organization_slug
    }
}

impl Eq for Token {}

/// Contents of the token cache file: at most one token per environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub production: Option<Token>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<Token>,
}

impl Tokens {
    pub fn get(&self, server: Server) -> Option<&Token> {
        match server {
            Server::Production => self.production.as_ref(),
            Server::Sandbox => self.sandbox.as_ref(),
        }
    }

    /// Replace the entry for `token.server`, leaving the other untouched.
    pub fn set(&mut self, token: Token) {
        match token.server {
            Server::Production => self.production = Some(token),
            Server::Sandbox => self.sandbox = Some(token),
        }
    }
}

/// Summary of a cached login, used by `polar login --check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginHealth {
    pub server: Server,
    pub has_token: bool,
    pub expired: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub can_refresh: bool,
    pub organization_slug: Option<String>,
}

impl LoginHealth {
    pub fn from_cached(server: Server, token: Option<&Token>, now: DateTime<Utc>) -> Self {
        Self {
            server,
            has_token: token.is_some(),
            expired: token.is_some_and(|token| token.is_expired_at(now)),
            expires_at: token.map(|token| token.expires_at),
            can_refresh: token.is_some_and(|token| token.refresh_token.is_some()),
            organization_slug: token.and_then(|token| token.organization_slug.clone()),
        }
    }
}

/// `expiresIn` is stored as a millisecond count.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use secrecy::ExposeSecret;

    fn sample(server: Server) -> Token {
        let issued = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        Token::issue(
            server,
            SecretString::new("access".to_string()),
            Some(SecretString::new("refresh".to_string())),
            Duration::from_secs(3600),
            vec!["openid".into(), "products:read".into()],
            issued,
        )
    }

    #[test]
    fn issue_derives_expiry_from_issuance_time() {
        let token = sample(Server::Sandbox);
        assert_eq!(
            token.expires_at,
            Utc.with_ymd_and_hms(2026, 1, 2, 4, 4, 5).unwrap()
        );
    }

    #[test]
    fn expiry_boundary_counts_as_expired() {
        let token = sample(Server::Production);
        assert!(token.is_expired_at(token.expires_at));
        assert!(!token.is_expired_at(token.expires_at - chrono::Duration::seconds(1)));
    }

    #[test]
    fn record_uses_camel_case_and_millis() {
        let json = serde_json::to_value(sample(Server::Sandbox)).unwrap();
        assert_eq!(json["token"], "access");
        assert_eq!(json["refreshToken"], "refresh");
        assert_eq!(json["expiresIn"], 3_600_000);
        assert_eq!(json["expiresAt"], "2026-01-02T04:04:05Z");
        assert_eq!(json["server"], "sandbox");
        assert!(json.get("organizationId").is_none());
    }

    #[test]
    fn set_replaces_only_the_matching_environment() {
        let mut tokens = Tokens::default();
        tokens.set(sample(Server::Production));
        let mut newer = sample(Server::Sandbox);
        newer.token = SecretString::new("second".to_string());
        tokens.set(newer.clone());
        assert_eq!(tokens.get(Server::Sandbox), Some(&newer));
        assert_eq!(
            tokens.get(Server::Production).map(|t| t.token.expose_secret().as_str()),
            Some("access")
        );
    }

    #[test]
    fn equality_compares_secret_values_without_printing_them() {
        let token = sample(Server::Sandbox);
        let mut rotated = token.clone();
        rotated.refresh_token = Some(SecretString::new("refresh-2".to_string()));
        assert_eq!(token, sample(Server::Sandbox));
        assert_ne!(token, rotated);
        let rendered = format!("{rotated:?}");
        assert!(!rendered.contains("access") && !rendered.contains("refresh-2"), "{rendered}");
    }

    #[test]
    fn health_reports_missing_and_expired_tokens() {
        let token = sample(Server::Production);
        let later = token.expires_at + chrono::Duration::seconds(1);
        let health = LoginHealth::from_cached(Server::Production, Some(&token), later);
        assert!(health.has_token && health.expired && health.can_refresh);

        let empty = LoginHealth::from_cached(Server::Sandbox, None, later);
        assert!(!empty.has_token && !empty.expired && empty.expires_at.is_none());
    }
}
