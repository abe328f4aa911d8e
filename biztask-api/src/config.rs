/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `JWT_SECRET`: Secret key for JWT signing (required, at least 32 bytes)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
/// - `PRODUCTION`: `true` switches logs to JSON
/// - `BIZTASK_STORE`: `postgres` (default) or `memory`
/// - `DATABASE_URL`: PostgreSQL URL; when unset the store settings file is used
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `BIZTASK_DATA_DIR`: Directory for `store-settings.json` (default: `./data`)
/// - `GEMINI_API_KEY`, `GEMINI_MODEL`: Voice dictation
/// - `REPORT_UTC_OFFSET_MINUTES`: Report time zone (default: 420, UTC+7)
/// - `RUST_LOG`: Log level
///
/// # Example
///
/// ```no_run
/// use biztask_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use biztask_shared::calendar::DEFAULT_UTC_OFFSET_MINUTES;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    pub dictation: DictationConfig,
    pub report: ReportConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// `*` allows any origin
    pub cors_origins: Vec<String>,

    pub production: bool,
}

/// Which gateway backs the API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Postgres => "postgres",
            StoreKind::Memory => "memory",
        }
    }
}

impl std::str::FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            other => anyhow::bail!("BIZTASK_STORE must be 'postgres' or 'memory', got '{}'", other),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub kind: StoreKind,

    /// Overrides the settings file when set
    pub database_url: Option<String>,

    pub max_connections: u32,

    /// Where `store-settings.json` lives
    pub data_dir: PathBuf,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictationConfig {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Calendar configuration for statistics and reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Minutes east of UTC
    pub utc_offset_minutes: i32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `JWT_SECRET` is missing or shorter than 32 characters
    /// - A numeric or enum variable has an invalid value
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let production = env::var("PRODUCTION")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let kind = env::var("BIZTASK_STORE")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse::<StoreKind>()?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let data_dir = env::var("BIZTASK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let utc_offset_minutes = match non_empty_var("REPORT_UTC_OFFSET_MINUTES") {
            Some(v) => v.parse::<i32>()?,
            None => DEFAULT_UTC_OFFSET_MINUTES,
        };

        Ok(Self {
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
                production,
            },
            store: StoreConfig {
                kind,
                database_url: non_empty_var("DATABASE_URL"),
                max_connections,
                data_dir,
            },
            jwt: JwtConfig { secret: jwt_secret },
            dictation: DictationConfig {
                api_key: non_empty_var("GEMINI_API_KEY"),
                model: non_empty_var("GEMINI_MODEL"),
            },
            report: ReportConfig { utc_offset_minutes },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Minimal configuration for an in-memory server
    pub fn for_memory_store(jwt_secret: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            store: StoreConfig {
                kind: StoreKind::Memory,
                database_url: None,
                max_connections: 10,
                data_dir: data_dir.into(),
            },
            jwt: JwtConfig {
                secret: jwt_secret.into(),
            },
            dictation: DictationConfig::default(),
            report: ReportConfig::default(),
        }
    }
}
