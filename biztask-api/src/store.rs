/// Gateway bootstrap
///
/// Picks the gateway the server starts with:
///
/// 1. `BIZTASK_STORE=memory`: a fresh [`MemoryGateway`]
/// 2. `DATABASE_URL` set: PostgreSQL at that URL
/// 3. a saved `store-settings.json`: PostgreSQL with those settings
/// 4. otherwise none, and the server starts in setup mode
///
/// A PostgreSQL connection that fails at startup is logged and also leaves the
/// server in setup mode.

use crate::config::{Config, StoreKind};
use anyhow::Context;
use biztask_shared::db::migrations::{ensure_database_exists, get_migration_status, run_migrations};
use biztask_shared::db::pool::{create_pool, DatabaseConfig};
use biztask_shared::gateway::memory::MemoryGateway;
use biztask_shared::gateway::postgres::PgGateway;
use biztask_shared::gateway::Gateway;
use biztask_shared::settings::{SettingsFile, StoreSettings};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Creates the database if needed, migrates it and starts the change listener
pub async fn connect_postgres(settings: &StoreSettings) -> anyhow::Result<Arc<dyn Gateway>> {
    settings.validate()?;

    ensure_database_exists(&settings.database_url)
        .await
        .context("Failed to create database")?;

    let pool = create_pool(DatabaseConfig::from(settings))
        .await
        .context("Failed to connect to database")?;

    run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let schema = get_migration_status(&pool)
        .await
        .context("Failed to read migration status")?;
    info!(
        applied_migrations = schema.applied_migrations,
        latest_version = ?schema.latest_version,
        "Database schema ready"
    );

    let gateway = PgGateway::connect(pool)
        .await
        .context("Failed to start change listener")?;

    Ok(Arc::new(gateway))
}

/// Settings from the environment, falling back to the settings file
pub async fn startup_settings(config: &Config, file: &SettingsFile) -> Option<StoreSettings> {
    if let Some(url) = &config.store.database_url {
        let mut settings = StoreSettings::with_url(url.clone());
        settings.max_connections = Some(config.store.max_connections);
        return Some(settings);
    }
    file.load().await
}

/// Gateway to start with, `None` for setup mode
pub async fn initial_gateway(config: &Config, file: &SettingsFile) -> Option<Arc<dyn Gateway>> {
    if config.store.kind == StoreKind::Memory {
        warn!("Using in-memory store; data is lost on restart");
        return Some(Arc::new(MemoryGateway::new()));
    }

    let Some(settings) = startup_settings(config, file).await else {
        info!(path = %file.path().display(), "No store settings found, starting in setup mode");
        return None;
    };

    match connect_postgres(&settings).await {
        Ok(gateway) => {
            info!("Connected to PostgreSQL store");
            Some(gateway)
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "Store connection failed, starting in setup mode");
            None
        }
    }
}
