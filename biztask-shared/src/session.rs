/// Local session store
///
/// Client-side persistence for the signed-in user. The session file holds the
/// user record without password material together with the API tokens; a
/// second file remembers the company and login names typed last so the login
/// form can be prefilled.
///
/// Corrupt files read as absent: a broken session simply means signing in
/// again.
///
/// The API server never reads these files. It is stateless and trusts only the
/// bearer token; this store is for client programs built on this crate.
///
/// # Example
///
/// ```no_run
/// use biztask_shared::session::{SavedCredentials, SessionStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SessionStore::new("/var/lib/biztask-client");
///
/// store.remember_credentials(&SavedCredentials {
///     company_name: "Cong ty ABC".to_string(),
///     username: "giamdoc".to_string(),
/// }).await?;
///
/// if let Some(session) = store.load().await {
///     println!("signed in as {}", session.user.name);
/// }
/// # Ok(())
/// # }
/// ```

use crate::models::user::PublicUser;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SESSION_FILE_NAME: &str = "session.json";
const CREDENTIALS_FILE_NAME: &str = "saved-credentials.json";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Signed-in user plus API tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: PublicUser,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Login form prefill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedCredentials {
    pub company_name: String,
    pub username: String,
}

/// File-backed session storage in one directory
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Current session, if any
    pub async fn load(&self) -> Option<Session> {
        read_json(&self.dir.join(SESSION_FILE_NAME)).await
    }

    /// Stores the session, or removes it when `None` (logout)
    pub async fn save(&self, session: Option<&Session>) -> Result<(), SessionError> {
        let path = self.dir.join(SESSION_FILE_NAME);
        match session {
            Some(session) => write_json(&path, session).await,
            None => remove_if_exists(&path).await,
        }
    }

    pub async fn saved_credentials(&self) -> Option<SavedCredentials> {
        read_json(&self.dir.join(CREDENTIALS_FILE_NAME)).await
    }

    /// Remembers the names used in the last successful login or registration
    pub async fn remember_credentials(
        &self,
        credentials: &SavedCredentials,
    ) -> Result<(), SessionError> {
        write_json(&self.dir.join(CREDENTIALS_FILE_NAME), credentials).await
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read session file");
            return None;
        }
    };

    match serde_json::from_slice(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring corrupt session file");
            None
        }
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SessionError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, serde_json::to_vec(value)?).await?;
    debug!(path = %path.display(), "Session file written");
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<(), SessionError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
