//! `polar login`: saved-login health, explicit refresh, or a fresh browser
//! login followed by organization selection.

use crate::app::entry::CommandError;
use crate::app::prompts::{Choice, Prompter};
use polar::api::{CommerceApi, PolarClient};
use polar::auth::{LoginHealth, Server, Token, TokenManager, UrlOpener};
use polar::config::Config;
use polar::ui::RenderSink;
use std::sync::Arc;
use tracing::info;

/// Opens the authorization page, or shows its URL through the render sink
/// when no browser could be launched.
pub(crate) struct AnnouncingBrowser {
    inner: Arc<dyn UrlOpener>,
    sink: Arc<dyn RenderSink>,
}

impl AnnouncingBrowser {
    pub(crate) fn new(inner: Arc<dyn UrlOpener>, sink: Arc<dyn RenderSink>) -> Self {
        Self { inner, sink }
    }
}

impl UrlOpener for AnnouncingBrowser {
    fn open(&self, url: &str) -> bool {
        if self.inner.open(url) {
            return true;
        }
        self.sink.section("Open this URL in your browser to continue");
        self.sink.detail(url);
        false
    }
}

/// Handle `polar login` health/refresh/browser-login flow.
pub(crate) async fn run_login_flow(
    renderer: &dyn RenderSink,
    prompter: &dyn Prompter,
    manager: &TokenManager,
    config: &Config,
    server: Server,
    check: bool,
    refresh: bool,
) -> Result<(), CommandError> {
    if check {
        for server in Server::ALL {
            render_health(renderer, &manager.health(server)?);
        }
        return Ok(());
    }

    if refresh {
        let token = {
            let _progress = renderer.progress("refreshing saved login");
            manager.refresh(server).await?
        };
        renderer.section("login refreshed");
        renderer.field("server", server.as_str());
        renderer.field("expires_at", &token.expires_at.to_rfc3339());
        eprintln!();
        return Ok(());
    }

    renderer.section("login");
    renderer.field("server", server.as_str());
    let token = {
        let _progress = renderer.progress("waiting for browser authorization");
        manager.login(server).await?
    };

    let api = PolarClient::new(server, token.token.clone(), config.http_timeout());
    let token = select_organization(renderer, prompter, &api, token).await?;
    manager.save(&token)?;
    info!(server = %server, organization = ?token.organization_slug, "login complete");

    renderer.section("Successfully logged into Polar");
    renderer.field("server", server.as_str());
    if let Some(slug) = &token.organization_slug {
        renderer.field("organization", slug);
    }
    eprintln!();
    Ok(())
}

/// Attach an organization to a fresh token. A single organization is picked
/// automatically; several are offered through the prompter; none leaves the
/// token unchanged with a warning.
pub(crate) async fn select_organization(
    renderer: &dyn RenderSink,
    prompter: &dyn Prompter,
    api: &dyn CommerceApi,
    token: Token,
) -> Result<Token, CommandError> {
    let organizations = {
        let _progress = renderer.progress("loading organizations");
        api.list_organizations().await?
    };

    let index = match organizations.len() {
        0 => {
            renderer.warn(
                "no organizations found for this account; create one on polar.sh and run `polar login` again",
            );
            return Ok(token);
        }
        1 => 0,
        _ => {
            let choices: Vec<Choice> = organizations
                .iter()
                .map(|org| Choice::enabled(format!("{} ({})", org.name, org.slug)))
                .collect();
            prompter.select("Select an organization", &choices)?
        }
    };
    let Some(organization) = organizations.get(index) else {
        return Err(CommandError::Message(format!(
            "organization choice {} is out of range",
            index + 1
        )));
    };
    Ok(token.with_organization(organization.id.clone(), organization.slug.clone()))
}

fn render_health(renderer: &dyn RenderSink, health: &LoginHealth) {
    renderer.section("login health");
    renderer.field("server", health.server.as_str());
    renderer.field(
        "saved_credentials",
        if health.has_token { "yes" } else { "no" },
    );
    if let Some(expires_at) = health.expires_at {
        renderer.field("expires_at", &expires_at.to_rfc3339());
        renderer.field("expired", if health.expired { "yes" } else { "no" });
        renderer.field("can_refresh", if health.can_refresh { "yes" } else { "no" });
    }
    if let Some(slug) = &health.organization_slug {
        renderer.field("organization", slug);
    }
    eprintln!();
}
