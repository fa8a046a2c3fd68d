//! Application entry orchestration for the polar CLI.

use crate::app::listen::run_listen;
use crate::app::login::{run_login_flow, AnnouncingBrowser};
use crate::app::migrate::run_migrate_flow;
use crate::app::prompts::TerminalPrompter;
use crate::cli::{Args, Command};
use polar::auth::{
    default_token_store_path, AuthError, AuthorizationFlow, OAuthEndpoints, SystemBrowser,
    TokenManager, TokenStore,
};
use polar::build_info;
use polar::config::{load_config, Config};
use polar::error::{ApiError, ListenError, MigrationError};
use polar::logging::init_tracing;
use polar::ui::{set_progress_enabled, RenderSink, Renderer};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const EXIT_FAILURE: i32 = 1;
/// EX_SOFTWARE: the authorization server broke its response contract.
const EXIT_SOFTWARE: i32 = 70;
const EXIT_INTERRUPTED: i32 = 130;

/// Failure of one subcommand, mapped onto a process exit code.
#[derive(Debug)]
pub(crate) enum CommandError {
    Auth(AuthError),
    Api(ApiError),
    Migration(MigrationError),
    Listen(ListenError),
    Interrupted,
    Message(String),
}

impl CommandError {
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            Self::Auth(err) | Self::Api(ApiError::Auth(err)) if err.is_fatal() => EXIT_SOFTWARE,
            Self::Interrupted => EXIT_INTERRUPTED,
            _ => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(err) => write!(f, "{err}"),
            Self::Api(err) => write!(f, "{err}"),
            Self::Migration(err) => write!(f, "{err}"),
            Self::Listen(err) => write!(f, "{err}"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::Message(msg) => write!(f, "{msg}"),
        }
    }
}

impl From<AuthError> for CommandError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<ApiError> for CommandError {
    fn from(err: ApiError) -> Self {
        Self::Api(err)
    }
}

impl From<MigrationError> for CommandError {
    fn from(err: MigrationError) -> Self {
        Self::Migration(err)
    }
}

impl From<ListenError> for CommandError {
    fn from(err: ListenError) -> Self {
        Self::Listen(err)
    }
}

impl From<String> for CommandError {
    fn from(msg: String) -> Self {
        Self::Message(msg)
    }
}

/// Top-level CLI entrypoint: load config, wire the token manager and
/// dispatch the subcommand. Returns the process exit code.
pub(crate) async fn run(args: Args) -> i32 {
    let bootstrap_renderer = Renderer::new(!args.no_color);
    let loaded = match load_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(err) => {
            bootstrap_renderer.error(&format!("failed to load config: {err}"));
            return EXIT_FAILURE;
        }
    };
    let mut config = loaded.config;
    if args.no_color {
        config.display.color = false;
    }
    init_tracing(&config.logging);
    debug!(source = %loaded.source, "config loaded");
    set_progress_enabled(config.display.color);

    let renderer = Renderer::new(config.display.color);
    let manager = match build_token_manager(&config, renderer) {
        Ok(manager) => manager,
        Err(err) => {
            renderer.error(&err.to_string());
            return err.exit_code();
        }
    };

    // Dropping the command future on Ctrl-C releases the loopback listener
    // and any open stream.
    let result = tokio::select! {
        result = dispatch(&renderer, &config, &manager, args.command) => result,
        _ = tokio::signal::ctrl_c() => Err(CommandError::Interrupted),
    };
    match result {
        Ok(()) => 0,
        Err(CommandError::Interrupted) => {
            eprintln!();
            renderer.warn("interrupted");
            EXIT_INTERRUPTED
        }
        Err(err) => {
            renderer.error(&err.to_string());
            err.exit_code()
        }
    }
}

async fn dispatch(
    renderer: &Renderer,
    config: &Config,
    manager: &TokenManager,
    command: Command,
) -> Result<(), CommandError> {
    let prompter = TerminalPrompter;
    match command {
        Command::Login {
            server,
            check,
            refresh,
        } => {
            let server = server.unwrap_or(config.general.server);
            run_login_flow(renderer, &prompter, manager, config, server, check, refresh).await
        }
        Command::Migrate { server, provider } => {
            let server = server.unwrap_or(config.general.server);
            run_migrate_flow(renderer, &prompter, manager, config, server, provider.as_deref())
                .await
        }
        Command::Listen { url, server } => {
            let server = server.unwrap_or(config.general.server);
            let sink: Arc<dyn RenderSink> = Arc::new(*renderer);
            run_listen(sink, manager, config, server, &url).await
        }
    }
}

fn build_token_manager(config: &Config, renderer: Renderer) -> Result<TokenManager, CommandError> {
    let Some(path) = default_token_store_path() else {
        return Err(CommandError::Message(
            "could not determine the home directory for ~/.polar/tokens.json".to_string(),
        ));
    };
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .user_agent(build_info::user_agent())
        .build()
        .map_err(|err| CommandError::Message(format!("failed to build http client: {err}")))?;
    let flow = AuthorizationFlow::new(
        http,
        OAuthEndpoints::compiled(),
        Arc::new(AnnouncingBrowser::new(Arc::new(SystemBrowser), Arc::new(renderer))),
        TokenStore::at(path),
    )
    .with_callback_timeout(config.callback_timeout());
    Ok(TokenManager::new(flow))
}
