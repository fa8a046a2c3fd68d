//! OAuth2 Authorization Code + PKCE login and the on-disk token cache.
//!
//! Every operation takes the target [`Server`] explicitly. Consumers only
//! need [`TokenManager::resolve_access_token`]; PKCE, the loopback redirect
//! listener, and the token endpoint stay internal to this module.

mod browser;
mod callback;
mod environment;
mod error;
mod flow;
mod lifecycle;
mod pkce;
mod secret;
mod store;
mod types;

pub use browser::{try_open_browser, SystemBrowser, UrlOpener};
pub use callback::{CallbackRequest, LoopbackServer};
pub use environment::{OAuthClientConfig, OAuthEndpoints, Server, REDIRECT_URL, SCOPES};
pub use error::{AuthError, TokenFileError};
pub use flow::{authorization_code_from_callback, build_authorization_url, AuthorizationFlow, FlowState};
pub use lifecycle::TokenManager;
pub use pkce::{generate_code_challenge, generate_random_string, PkceExchange, CODE_CHALLENGE_METHOD};
pub use secrecy::{ExposeSecret, SecretString};
pub use store::{default_token_store_path, TokenStore};
pub use types::{LoginHealth, Token, Tokens};
