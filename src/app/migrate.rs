//! `polar migrate`: move products and customers from a billing platform
//! into the Polar organization of the current login.

use crate::app::entry::CommandError;
use crate::app::prompts::{Choice, Prompter};
use polar::api::{CommerceApi, PolarClient};
use polar::auth::{SecretString, Server, TokenManager};
use polar::config::Config;
use polar::error::MigrationError;
use polar::migration::{
    run_migration, BillingSource, Entity, LemonSqueezyClient, MigrationReport, Provider,
};
use polar::ui::RenderSink;
use std::sync::Arc;

/// Handle `polar migrate`.
pub(crate) async fn run_migrate_flow(
    renderer: &dyn RenderSink,
    prompter: &dyn Prompter,
    manager: &TokenManager,
    config: &Config,
    server: Server,
    provider: Option<&str>,
) -> Result<(), CommandError> {
    let token = manager.resolve_access_token(server).await?;

    let provider = match provider {
        Some(raw) => raw.parse::<Provider>()?,
        None => prompt_provider(prompter)?,
    };
    if !provider.is_supported() {
        return Err(MigrationError::UnsupportedProvider(provider.title().to_string()).into());
    }
    let entities = prompt_entities(prompter)?;
    let api_key = prompt_api_key(renderer, prompter)?;

    let source = match provider {
        Provider::LemonSqueezy => LemonSqueezyClient::new(api_key, config.http_timeout()),
        other => {
            return Err(MigrationError::UnsupportedProvider(other.title().to_string()).into())
        }
    };
    let api: Arc<dyn CommerceApi> = Arc::new(PolarClient::new(
        server,
        token.token.clone(),
        config.http_timeout(),
    ));
    migrate_from_source(
        renderer,
        prompter,
        &source,
        api,
        &entities,
        config.migration_concurrency(),
    )
    .await
}

/// Pick a store, migrate the selected entities and render one report per
/// entity. Per-record failures are reported, not returned as errors.
pub(crate) async fn migrate_from_source(
    renderer: &dyn RenderSink,
    prompter: &dyn Prompter,
    source: &dyn BillingSource,
    api: Arc<dyn CommerceApi>,
    entities: &[Entity],
    concurrency: usize,
) -> Result<(), CommandError> {
    let stores = {
        let _progress = renderer.progress("loading stores");
        source
            .stores()
            .await
            .map_err(|source| MigrationError::Source {
                entity: "stores",
                source,
            })?
    };
    let index = match stores.len() {
        0 => {
            return Err(CommandError::Message(format!(
                "no stores found on {}",
                source.name()
            )))
        }
        1 => 0,
        _ => {
            let choices: Vec<Choice> = stores
                .iter()
                .map(|store| Choice::enabled(store.name.clone()))
                .collect();
            prompter.select("Select Store to Migrate", &choices)?
        }
    };
    let Some(store) = stores.get(index) else {
        return Err(CommandError::Message(format!(
            "store choice {} is out of range",
            index + 1
        )));
    };

    renderer.section(&format!("migrating from {}", source.name()));
    renderer.field("store", &store.name);
    let reports = {
        let _progress = renderer.progress("migrating records");
        run_migration(source, api, &store.id, entities, concurrency).await?
    };
    for (entity, report) in &reports {
        render_report(renderer, *entity, report);
    }
    eprintln!();
    Ok(())
}

fn prompt_provider(prompter: &dyn Prompter) -> Result<Provider, CommandError> {
    let choices: Vec<Choice> = Provider::ALL
        .iter()
        .map(|provider| {
            if provider.is_supported() {
                Choice::enabled(provider.title())
            } else {
                Choice::disabled(provider.title())
            }
        })
        .collect();
    let index = prompter.select("Select Migration Provider", &choices)?;
    Provider::ALL
        .get(index)
        .copied()
        .ok_or_else(|| {
            MigrationError::Prompt(format!("provider choice {} is out of range", index + 1)).into()
        })
}

fn prompt_entities(prompter: &dyn Prompter) -> Result<Vec<Entity>, CommandError> {
    let choices: Vec<Choice> = Entity::ALL
        .iter()
        .map(|entity| Choice::enabled(entity.title()))
        .collect();
    let indices = prompter.multi_select("Select Entities to Migrate", &choices)?;
    let entities: Vec<Entity> = indices
        .into_iter()
        .filter_map(|index| Entity::ALL.get(index).copied())
        .collect();
    if entities.is_empty() {
        return Err(
            MigrationError::Prompt("select at least one entity to migrate".to_string()).into(),
        );
    }
    Ok(entities)
}

/// Ask until a non-empty key is entered.
fn prompt_api_key(
    renderer: &dyn RenderSink,
    prompter: &dyn Prompter,
) -> Result<SecretString, CommandError> {
    loop {
        let key = prompter.secret("Enter the API Key")?;
        let key = key.trim();
        if !key.is_empty() {
            return Ok(SecretString::new(key.to_string()));
        }
        renderer.warn("API Key is required");
    }
}

fn render_report(renderer: &dyn RenderSink, entity: Entity, report: &MigrationReport) {
    renderer.section(&format!("{} migrated", entity.title()));
    renderer.field("created", &format!("{}/{}", report.created.len(), report.total()));
    for failed in &report.failed {
        renderer.warn(&format!("{} `{}` failed: {}", entity.as_str(), failed.label, failed.error));
    }
}
