//! Polar command-line client library.
//!
//! - `auth`: OAuth2 PKCE login, the token cache and token lifecycle
//! - `api`: commerce API client (customers, products, organizations)
//! - `migration`: billing-platform import into Polar
//! - `listen`: webhook event relay over server-sent events
//! - `config`, `logging`, `ui`: ambient CLI plumbing

pub mod api;
pub mod auth;
pub mod build_info;
pub mod config;
pub mod error;
pub mod listen;
pub mod logging;
pub mod migration;
pub mod ui;

#[cfg(test)]
pub(crate) mod testsupport;
