/// PostgreSQL connection pool
///
/// The pool backs [`crate::gateway::postgres::PgGateway`]. Its parameters come
/// from the local store settings file or from `DATABASE_URL`.
///
/// # Example
///
/// ```no_run
/// use biztask_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     Ok(())
/// }
/// ```

use crate::settings::StoreSettings;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the database connection pool
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Default: 10
    pub max_connections: u32,

    /// Default: 2
    pub min_connections: u32,

    /// Timeout for acquiring a connection, in seconds. Default: 30
    pub connect_timeout_seconds: u64,

    /// Idle connections are closed after this many seconds. Default: 600
    pub idle_timeout_seconds: Option<u64>,

    /// Connections are recycled after this many seconds. Default: 1800
    pub max_lifetime_seconds: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_seconds: 30,
            idle_timeout_seconds: Some(600),
            max_lifetime_seconds: Some(1800),
        }
    }
}

impl From<&StoreSettings> for DatabaseConfig {
    fn from(settings: &StoreSettings) -> Self {
        let defaults = Self::default();
        Self {
            url: settings.database_url.clone(),
            max_connections: settings.max_connections.unwrap_or(defaults.max_connections),
            min_connections: settings
                .min_connections
                .unwrap_or(defaults.min_connections),
            connect_timeout_seconds: settings
                .connect_timeout_seconds
                .unwrap_or(defaults.connect_timeout_seconds),
            ..defaults
        }
    }
}

/// Creates a pool and verifies connectivity with a health check
pub async fn create_pool(config: DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_seconds = config.connect_timeout_seconds,
        "Creating database connection pool"
    );

    let mut pool_options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .test_before_acquire(true);

    if let Some(idle_timeout) = config.idle_timeout_seconds {
        pool_options = pool_options.idle_timeout(Duration::from_secs(idle_timeout));
        debug!(idle_timeout_seconds = idle_timeout, "Set idle timeout");
    }

    if let Some(max_lifetime) = config.max_lifetime_seconds {
        pool_options = pool_options.max_lifetime(Duration::from_secs(max_lifetime));
        debug!(max_lifetime_seconds = max_lifetime, "Set max lifetime");
    }

    let pool = pool_options.connect(&config.url).await?;

    health_check(&pool).await?;

    info!("Database connection pool created successfully");
    Ok(pool)
}

/// Runs `SELECT 1` against the pool
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    let result: (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;

    if result.0 == 1 {
        debug!("Database health check passed");
        Ok(())
    } else {
        warn!("Database health check returned unexpected value: {}", result.0);
        Err(sqlx::Error::Protocol(
            "Health check returned unexpected value".into(),
        ))
    }
}

/// Pool occupancy reported by `/health`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub active_connections: usize,
    pub idle_connections: usize,
    pub total_connections: usize,
}

impl PoolStats {
    fn from_counts(size: u32, idle: usize) -> Self {
        let total = size as usize;
        let idle = idle.min(total);
        PoolStats {
            active_connections: total - idle,
            idle_connections: idle,
            total_connections: total,
        }
    }
}

pub fn get_pool_stats(pool: &PgPool) -> PoolStats {
    PoolStats::from_counts(pool.size(), pool.num_idle())
}

/// Closes the pool during shutdown
pub async fn close_pool(pool: PgPool) {
    info!("Closing database connection pool");
    pool.close().await;
    info!("Database connection pool closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.connect_timeout_seconds, 30);
        assert_eq!(config.idle_timeout_seconds, Some(600));
        assert_eq!(config.max_lifetime_seconds, Some(1800));
    }

    #[test]
    fn test_pool_stats_from_counts() {
        let stats = PoolStats::from_counts(5, 2);
        assert_eq!(stats.active_connections, 3);
        assert_eq!(stats.idle_connections, 2);
        assert_eq!(stats.total_connections, 5);

        // Idle count is sampled separately and can briefly exceed the size
        let stats = PoolStats::from_counts(1, 3);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.idle_connections, 1);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = StoreSettings {
            database_url: "postgres://localhost/biztask".to_string(),
            max_connections: Some(4),
            min_connections: None,
            connect_timeout_seconds: Some(5),
            project_name: None,
        };

        let config = DatabaseConfig::from(&settings);
        assert_eq!(config.url, "postgres://localhost/biztask");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.connect_timeout_seconds, 5);
    }
}
