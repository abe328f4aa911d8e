/// Store connection for the worker
///
/// The worker reads the same sources as the API: `DATABASE_URL` first, then
/// `{BIZTASK_DATA_DIR}/store-settings.json`. It never creates the database or
/// runs migrations; that is the API's job.

use anyhow::Context;
use biztask_shared::db::pool::{create_pool, DatabaseConfig};
use biztask_shared::gateway::postgres::PgGateway;
use biztask_shared::gateway::Gateway;
use biztask_shared::settings::{SettingsFile, StoreSettings};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

/// Settings from `DATABASE_URL` or the settings file
pub async fn resolve_settings() -> anyhow::Result<StoreSettings> {
    if let Some(url) = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()) {
        return Ok(StoreSettings::with_url(url));
    }

    let data_dir = env::var("BIZTASK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./data"));
    let file = SettingsFile::new(&data_dir);

    file.load().await.with_context(|| {
        format!(
            "No DATABASE_URL and no store settings at {}",
            file.path().display()
        )
    })
}

pub async fn connect(settings: &StoreSettings) -> anyhow::Result<Arc<dyn Gateway>> {
    settings.validate()?;

    let pool = create_pool(DatabaseConfig::from(settings))
        .await
        .context("Failed to connect to database")?;

    let gateway = PgGateway::connect(pool)
        .await
        .context("Failed to open store")?;

    Ok(Arc::new(gateway))
}
