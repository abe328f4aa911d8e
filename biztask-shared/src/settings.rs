/// Remote store connection settings
///
/// The API boots without a database when no settings file exists and answers
/// every data route with `setup_required`. An operator then pastes the
/// connection block into `POST /v1/setup`; it is parsed leniently, validated
/// and persisted to `{data_dir}/store-settings.json`.
///
/// # Accepted input
///
/// ```text
/// const config = {
///   databaseUrl: 'postgres://biztask:secret@db:5432/biztask',
///   maxConnections: 10,
/// };
/// ```
///
/// Everything outside the outermost braces is ignored. Bare `key: value`
/// text without braces is wrapped. Unquoted keys, single quotes and trailing
/// commas are repaired when strict JSON parsing fails.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name inside the data directory
pub const SETTINGS_FILE_NAME: &str = "store-settings.json";

static UNQUOTED_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([{,]\s*)([A-Za-z0-9_]+)\s*:"#).expect("Valid unquoted key regex")
});
static TRAILING_COMMA_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#",\s*\}"#).expect("Valid trailing comma regex"));
static TRAILING_COMMA_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#",\s*\]"#).expect("Valid trailing comma regex"));

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Vui lòng dán mã cấu hình")]
    Empty,

    /// Neither strict nor repaired JSON parsed
    #[error("Không thể đọc định dạng cấu hình: {0}")]
    Unreadable(String),

    #[error("Cấu hình thiếu trường bắt buộc: {0}")]
    MissingField(&'static str),

    #[error("Settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Connection parameters for the remote document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    /// PostgreSQL URL
    #[serde(default)]
    pub database_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_connections: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_seconds: Option<u64>,

    /// Free-form label shown on the setup screen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

impl StoreSettings {
    /// Settings with only the URL set
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: None,
            min_connections: None,
            connect_timeout_seconds: None,
            project_name: None,
        }
    }

    /// Checks the required fields
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.database_url.trim().is_empty() {
            return Err(SettingsError::MissingField("databaseUrl"));
        }
        Ok(())
    }
}

/// Parses pasted configuration text
///
/// # Errors
///
/// - `Empty` for blank input
/// - `Unreadable` when the text cannot be turned into a JSON object
/// - `MissingField` when `databaseUrl` is absent or blank
pub fn parse_lenient(input: &str) -> Result<StoreSettings, SettingsError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SettingsError::Empty);
    }

    let candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => trimmed[start..=end].to_string(),
        _ if trimmed.contains(':') => format!("{{{}}}", trimmed),
        _ => trimmed.to_string(),
    };

    let value: serde_json::Value = match serde_json::from_str(&candidate) {
        Ok(value) => value,
        Err(_) => serde_json::from_str(&repair_loose_json(&candidate))
            .map_err(|e| SettingsError::Unreadable(e.to_string()))?,
    };

    if !value.is_object() {
        return Err(SettingsError::Unreadable("expected an object".to_string()));
    }

    let settings: StoreSettings = serde_json::from_value(value)
        .map_err(|e| SettingsError::Unreadable(e.to_string()))?;
    settings.validate()?;

    Ok(settings)
}

/// Quotes bare keys, swaps single quotes and drops trailing commas
fn repair_loose_json(input: &str) -> String {
    let quoted = UNQUOTED_KEY.replace_all(input, r#"$1"$2":"#);
    let double = quoted.replace('\'', "\"");
    let no_obj_comma = TRAILING_COMMA_OBJECT.replace_all(&double, "}");
    TRAILING_COMMA_ARRAY
        .replace_all(&no_obj_comma, "]")
        .into_owned()
}

/// Settings persisted in the data directory
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(SETTINGS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads saved settings
    ///
    /// A missing file is `None`. An unreadable or invalid file is removed and
    /// also reads as `None`, which sends the API back to setup mode.
    pub async fn load(&self) -> Option<StoreSettings> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read store settings");
                return None;
            }
        };

        match serde_json::from_str::<StoreSettings>(&raw) {
            Ok(settings) if settings.validate().is_ok() => Some(settings),
            _ => {
                warn!(path = %self.path.display(), "Discarding invalid store settings file");
                let _ = tokio::fs::remove_file(&self.path).await;
                None
            }
        }
    }

    /// Writes settings, creating the data directory if needed
    pub async fn save(&self, settings: &StoreSettings) -> Result<(), SettingsError> {
        settings.validate()?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(settings)?;
        tokio::fs::write(&self.path, json).await?;
        info!(path = %self.path.display(), "Store settings saved");
        Ok(())
    }

    /// Deletes saved settings; a missing file is not an error
    pub async fn reset(&self) -> Result<(), SettingsError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Store settings reset");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
