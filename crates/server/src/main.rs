use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::eyre;
use migration::{Migrator, MigratorTrait};
use oauth2_authority::api::start_webserver;
use oauth2_authority::config::{AppConfig, load_config};
use oauth2_authority::notify::{LogNotifier, Notifier, SmtpNotifier};
use oauth2_authority::oauth2::OAuth2State;
use oauth2_authority::store::{MemoryRepository, Repository, SqlRepository, spawn_housekeeping};
use rustls::crypto;
use rustls::crypto::CryptoProvider;
use sea_orm::Database;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "oauth2_authority=info,tower_http=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

async fn open_repository(config: &AppConfig) -> color_eyre::Result<Arc<dyn Repository>> {
    if config.database_url == "memory" {
        tracing::warn!("using the in-memory repository, nothing survives a restart");
        return Ok(Arc::new(MemoryRepository::new()));
    }
    let db = Database::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;
    tracing::info!("database migrations applied");
    Ok(Arc::new(SqlRepository::new(Arc::new(db))))
}

fn notifier(config: &AppConfig) -> color_eyre::Result<Arc<dyn Notifier>> {
    match &config.smtp {
        Some(smtp) => Ok(Arc::new(SmtpNotifier::new(smtp, &config.public_url)?)),
        None => {
            tracing::warn!("no smtp section configured, verification links are only logged");
            Ok(Arc::new(LogNotifier::new(&config.public_url)))
        }
    }
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    initialize_tracing();

    let config = load_config()?;

    let ring_provider = crypto::ring::default_provider();
    CryptoProvider::install_default(ring_provider)
        .map_err(|_| eyre!("Failed to install crypto provider"))?;

    let repo = open_repository(&config).await?;
    let notifier = notifier(&config)?;
    let state = OAuth2State::from_config(&config, repo.clone(), notifier)?;

    // Best-effort removal of expired records
    spawn_housekeeping(
        repo,
        Duration::from_secs(config.oauth2.housekeeping_interval),
    );

    start_webserver(state, &config).await?;
    Ok(())
}
