//! Token lifecycle: the one place consumers ask for a usable token.

use chrono::Utc;
use tracing::{debug, info};

use super::environment::Server;
use super::error::AuthError;
use super::flow::AuthorizationFlow;
use super::types::{LoginHealth, Token};

/// Resolves non-expired tokens per environment, logging in when needed.
pub struct TokenManager {
    flow: AuthorizationFlow,
}

impl TokenManager {
    pub fn new(flow: AuthorizationFlow) -> Self {
        Self { flow }
    }

    /// Cached token for `server` if it has not expired; otherwise run the
    /// full login flow. Never refreshes implicitly.
    pub async fn resolve_access_token(&self, server: Server) -> Result<Token, AuthError> {
        match self.cached(server)? {
            Some(token) if !token.is_expired_at(Utc::now()) => {
                debug!(server = %server, expires_at = %token.expires_at, "using cached token");
                Ok(token)
            }
            Some(token) => {
                info!(server = %server, expired_at = %token.expires_at, "cached token expired; logging in");
                self.flow.login(server).await
            }
            None => {
                info!(server = %server, "no cached token; logging in");
                self.flow.login(server).await
            }
        }
    }

    /// Unconditional interactive login.
    pub async fn login(&self, server: Server) -> Result<Token, AuthError> {
        self.flow.login(server).await
    }

    /// Explicit renewal of the cached token using its refresh token.
    pub async fn refresh(&self, server: Server) -> Result<Token, AuthError> {
        let Some(current) = self.cached(server)? else {
            return Err(AuthError::RefreshUnavailable(server));
        };
        self.flow.refresh(&current).await
    }

    pub fn cached(&self, server: Server) -> Result<Option<Token>, AuthError> {
        Ok(self.flow.store().read()?.get(server).cloned())
    }

    pub fn is_authenticated(&self, server: Server) -> Result<bool, AuthError> {
        Ok(self
            .cached(server)?
            .is_some_and(|token| !token.is_expired_at(Utc::now())))
    }

    pub fn health(&self, server: Server) -> Result<LoginHealth, AuthError> {
        let cached = self.cached(server)?;
        Ok(LoginHealth::from_cached(server, cached.as_ref(), Utc::now()))
    }

    /// Persist an updated token (e.g. after selecting an organization).
    pub fn save(&self, token: &Token) -> Result<(), AuthError> {
        self.flow.store().write(token)?;
        Ok(())
    }
}
