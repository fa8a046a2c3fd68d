//! `polar listen`: relay webhook events to a local URL.

use crate::app::entry::CommandError;
use polar::auth::{Server, Token, TokenManager};
use polar::config::Config;
use polar::error::ListenError;
use polar::listen::{listen_url, parse_target, Relay};
use polar::ui::RenderSink;
use std::sync::Arc;

/// Handle `polar listen <url>`. Runs until the stream ends or Ctrl-C.
pub(crate) async fn run_listen(
    sink: Arc<dyn RenderSink>,
    manager: &TokenManager,
    config: &Config,
    server: Server,
    url: &str,
) -> Result<(), CommandError> {
    let target = parse_target(url)?;
    let token = manager.resolve_access_token(server).await?;
    let organization_id = organization_for(&token)?;

    let stream_url = listen_url(server.api_base_url(), organization_id);
    sink.activity(&format!("Listening for events, forwarding to {target}..."));
    let relay = Relay::new(
        stream_url,
        token.token.clone(),
        target,
        config.http_timeout(),
        Arc::clone(&sink),
    );
    relay.run().await?;
    Ok(())
}

fn organization_for(token: &Token) -> Result<&str, ListenError> {
    token
        .organization_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(ListenError::NoOrganization)
}
