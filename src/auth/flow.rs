//! Authorization Code + PKCE login and the refresh-token sub-flow.

use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use super::browser::UrlOpener;
use super::callback::LoopbackServer;
use super::environment::{OAuthClientConfig, OAuthEndpoints, Server};
use super::error::AuthError;
use super::pkce::{PkceExchange, CODE_CHALLENGE_METHOD};
use super::store::TokenStore;
use super::types::Token;

/// Login progress. `Failed` is reachable from every non-terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    BuildingRequest,
    AwaitingRedirect,
    ExchangingCode,
    Persisting,
    Complete,
    Failed(String),
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_))
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(&self, next: &FlowState) -> bool {
        use FlowState::*;
        match (self, next) {
            (current, Failed(_)) => !current.is_terminal(),
            (Idle, BuildingRequest)
            | (BuildingRequest, AwaitingRedirect)
            | (AwaitingRedirect, ExchangingCode)
            | (ExchangingCode, Persisting)
            | (Persisting, Complete) => true,
            _ => false,
        }
    }
}

/// Records and logs state transitions for one flow run.
#[derive(Debug)]
struct FlowTracker {
    server: Server,
    state: FlowState,
}

impl FlowTracker {
    fn new(server: Server) -> Self {
        Self {
            server,
            state: FlowState::Idle,
        }
    }

    fn advance(&mut self, next: FlowState) {
        debug_assert!(
            self.state.can_advance_to(&next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(server = %self.server, from = ?self.state, to = ?next, "login flow transition");
        self.state = next;
    }

    fn fail(&mut self, err: &AuthError) {
        if !self.state.is_terminal() {
            self.advance(FlowState::Failed(err.to_string()));
        }
    }
}

/// Raw token endpoint response. Presence of each field is validated per grant.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
}

/// Runs the browser login and refresh grants against one endpoint table.
pub struct AuthorizationFlow {
    http: reqwest::Client,
    endpoints: OAuthEndpoints,
    opener: Arc<dyn UrlOpener>,
    store: TokenStore,
    callback_timeout: Option<Duration>,
}

impl AuthorizationFlow {
    pub fn new(
        http: reqwest::Client,
        endpoints: OAuthEndpoints,
        opener: Arc<dyn UrlOpener>,
        store: TokenStore,
    ) -> Self {
        Self {
            http,
            endpoints,
            opener,
            store,
            callback_timeout: None,
        }
    }

    /// Give up waiting for the browser redirect after `timeout`.
    pub fn with_callback_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Full interactive login for `server`. The token is persisted before it
    /// is returned.
    pub async fn login(&self, server: Server) -> Result<Token, AuthError> {
        let mut tracker = FlowTracker::new(server);
        match self.run_login(server, &mut tracker).await {
            Ok(token) => {
                tracker.advance(FlowState::Complete);
                info!(server = %server, "login complete");
                Ok(token)
            }
            Err(err) => {
                tracker.fail(&err);
                Err(err)
            }
        }
    }

    async fn run_login(&self, server: Server, tracker: &mut FlowTracker) -> Result<Token, AuthError> {
        let config = self.endpoints.for_server(server);

        tracker.advance(FlowState::BuildingRequest);
        let pkce = PkceExchange::generate();
        let authorization_url = build_authorization_url(config, &pkce)?;
        let redirect_url = parse_redirect_url(config)?;
        let listen_addr = redirect_socket_addr(&redirect_url)?;

        tracker.advance(FlowState::AwaitingRedirect);
        let mut listener = LoopbackServer::bind(listen_addr).await?;
        if !self.opener.open(authorization_url.as_str()) {
            debug!(server = %server, "no browser launched; waiting for a manual visit");
        }
        let callback = listener.wait(self.callback_timeout).await?;
        drop(listener);

        let code = authorization_code_from_callback(&redirect_url, &callback.target, &pkce.state)?;

        tracker.advance(FlowState::ExchangingCode);
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_url.as_str()),
            ("code", code.as_str()),
            ("code_verifier", pkce.code_verifier.expose_secret().as_str()),
        ];
        let response = self.request_token(config, &form).await?;
        let token = token_from_code_response(server, response)?;

        tracker.advance(FlowState::Persisting);
        self.store.write(&token)?;
        Ok(token)
    }

    /// Renew `current` with its refresh token and persist the result.
    /// Fields the server leaves out (refresh token, scope) carry over, as
    /// does the selected organization.
    pub async fn refresh(&self, current: &Token) -> Result<Token, AuthError> {
        let server = current.server;
        let Some(refresh_token) = current.refresh_token.as_ref() else {
            return Err(AuthError::RefreshUnavailable(server));
        };
        let config = self.endpoints.for_server(server);
        let scope = config.scope_param();
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.expose_secret().as_str()),
            ("client_id", config.client_id.as_str()),
            ("scope", scope.as_str()),
        ];
        let response = self.request_token(config, &form).await?;
        let token = token_from_refresh_response(current, response)?;
        self.store.write(&token)?;
        info!(server = %server, "token refreshed");
        Ok(token)
    }

    async fn request_token(
        &self,
        config: &OAuthClientConfig,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(&config.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::TokenExchange {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|err| AuthError::TokenParse(err.to_string()))
    }
}

/// Authorization endpoint plus the PKCE query parameters.
pub fn build_authorization_url(
    config: &OAuthClientConfig,
    pkce: &PkceExchange,
) -> Result<Url, AuthError> {
    let scope = config.scope_param();
    Url::parse_with_params(
        &config.authorization_url,
        [
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_url.as_str()),
            ("response_type", "code"),
            ("scope", scope.as_str()),
            ("state", pkce.state.as_str()),
            ("code_challenge", pkce.code_challenge.as_str()),
            ("code_challenge_method", CODE_CHALLENGE_METHOD),
        ],
    )
    .map_err(|err| {
        AuthError::Authorization(format!(
            "invalid authorization url `{}`: {err}",
            config.authorization_url
        ))
    })
}

fn parse_redirect_url(config: &OAuthClientConfig) -> Result<Url, AuthError> {
    Url::parse(&config.redirect_url).map_err(|err| {
        AuthError::Authorization(format!(
            "invalid redirect url `{}`: {err}",
            config.redirect_url
        ))
    })
}

/// Loopback socket address named by the redirect URL.
fn redirect_socket_addr(redirect_url: &Url) -> Result<SocketAddr, AuthError> {
    let ip = redirect_url
        .host_str()
        .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
        .and_then(|host| host.parse::<IpAddr>().ok());
    match (ip, redirect_url.port_or_known_default()) {
        (Some(ip), Some(port)) => Ok(SocketAddr::new(ip, port)),
        _ => Err(AuthError::Authorization(format!(
            "redirect url `{redirect_url}` must name a loopback ip and port"
        ))),
    }
}

/// Validate the redirect target and extract the authorization code.
///
/// Checks run in order: a server-reported `error`, then missing `code` or
/// `state`, then a `state` that differs from the one sent.
pub fn authorization_code_from_callback(
    redirect_url: &Url,
    target: &str,
    expected_state: &str,
) -> Result<String, AuthError> {
    let url = redirect_url.join(target).map_err(|err| {
        AuthError::Authorization(format!("unreadable redirect `{target}`: {err}"))
    })?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        let message = match error_description {
            Some(description) if !description.is_empty() => format!("{error}: {description}"),
            _ => error,
        };
        return Err(AuthError::Authorization(format!(
            "authorization server returned an error ({message})"
        )));
    }

    let (Some(code), Some(state)) = (code.filter(|c| !c.is_empty()), state) else {
        return Err(AuthError::Authorization(
            "authorization code or state is missing in the redirect".into(),
        ));
    };
    if state != expected_state {
        return Err(AuthError::Authorization(
            "redirect state does not match the login request".into(),
        ));
    }
    Ok(code)
}

fn token_from_code_response(server: Server, response: TokenResponse) -> Result<Token, AuthError> {
    let access_token = required(response.access_token, "access_token")?;
    let refresh_token = required(response.refresh_token, "refresh_token")?;
    let expires_in = response
        .expires_in
        .ok_or_else(|| AuthError::TokenParse("response is missing `expires_in`".into()))?;
    let scope = required(response.scope, "scope")?;

    Ok(Token::issue(
        server,
        SecretString::new(access_token),
        Some(SecretString::new(refresh_token)),
        Duration::from_secs(expires_in),
        split_scope(&scope),
        Utc::now(),
    ))
}

fn token_from_refresh_response(current: &Token, response: TokenResponse) -> Result<Token, AuthError> {
    let access_token = required(response.access_token, "access_token")?;
    let expires_in = response
        .expires_in
        .ok_or_else(|| AuthError::TokenParse("response is missing `expires_in`".into()))?;
    let refresh_token = response
        .refresh_token
        .filter(|value| !value.trim().is_empty())
        .map(SecretString::new)
        .or_else(|| current.refresh_token.clone());
    let scope = response
        .scope
        .map(|scope| split_scope(&scope))
        .filter(|scope| !scope.is_empty())
        .unwrap_or_else(|| current.scope.clone());

    let mut token = Token::issue(
        current.server,
        SecretString::new(access_token),
        refresh_token,
        Duration::from_secs(expires_in),
        scope,
        Utc::now(),
    );
    token.organization_id = current.organization_id.clone();
    token.organization_slug = current.organization_slug.clone();
    Ok(token)
}

fn required(value: Option<String>, field: &str) -> Result<String, AuthError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AuthError::TokenParse(format!("response is missing `{field}`")))
}

fn split_scope(scope: &str) -> Vec<String> {
    scope.split_whitespace().map(str::to_string).collect()
}
