/// Remote data gateway
///
/// Create/read/update/delete and subscribe operations over the `users` and
/// `tasks` collections. Every list and subscription is scoped by company id;
/// single-document operations address documents by id.
///
/// # Implementations
///
/// - [`memory::MemoryGateway`]: in-process collections with change broadcasts,
///   used by tests and demo mode
/// - [`postgres::PgGateway`]: JSONB documents in PostgreSQL with
///   `LISTEN/NOTIFY` change streams
///
/// # Semantics
///
/// - `add_*` writes the whole document and overwrites an existing one with the
///   same id.
/// - `update_*` replaces an existing document; a missing document is
///   `NotFound`.
/// - Documents larger than [`MAX_DOCUMENT_BYTES`] once serialized are rejected
///   with `WriteTooLarge` before anything is written.
/// - Subscriptions yield full snapshots. The first item is the current state;
///   later items follow every write that touches the company.
/// - Last write wins. Nothing is retried.
///
/// # Example
///
/// ```
/// use biztask_shared::gateway::{memory::MemoryGateway, Gateway};
/// use biztask_shared::models::user::User;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = MemoryGateway::new();
/// let boss = User::founder("Cong ty ABC", "Tran Van B", "giamdoc", "$argon2id$...".to_string());
/// gateway.register_company(&boss).await?;
///
/// let roster = gateway.list_users(boss.company_id).await?;
/// assert_eq!(roster.len(), 1);
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod postgres;

use crate::db::pool::PoolStats;
use crate::models::task::{Task, TaskStatus};
use crate::models::user::User;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{info, warn};
use uuid::Uuid;

/// Largest serialized document the store accepts (1 MiB)
pub const MAX_DOCUMENT_BYTES: usize = 1_048_576;

/// Completed tasks older than this are swept
pub const RETENTION_DAYS: i64 = 90;

/// Store failures
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{collection} document {id} not found")]
    NotFound { collection: Collection, id: Uuid },

    /// Serialized document exceeds [`MAX_DOCUMENT_BYTES`]
    #[error("Document is {size} bytes, the store accepts at most {limit}")]
    WriteTooLarge { size: usize, limit: usize },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Change feed ended or could not be established
    #[error("Change feed unavailable: {0}")]
    Subscription(String),
}

/// Collection names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Tasks,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Tasks => "tasks",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification that a company's collection changed
///
/// Same shape as the `biztask_changes` NOTIFY payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub collection: Collection,
    pub company_id: Uuid,
}

/// Stream of full collection snapshots
pub type SnapshotStream<T> = BoxStream<'static, Result<Vec<T>, StoreError>>;

/// Document store operations
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Stores the founding user of a new company
    async fn register_company(&self, founder: &User) -> Result<(), StoreError>;

    /// Looks up a user by company name and login name
    async fn find_user_for_login(
        &self,
        company_name: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError>;

    /// Whether a login name is taken within a company name
    async fn username_exists(&self, company_name: &str, username: &str)
        -> Result<bool, StoreError>;

    async fn add_user(&self, user: &User) -> Result<(), StoreError>;

    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Company roster ordered by name
    async fn list_users(&self, company_id: Uuid) -> Result<Vec<User>, StoreError>;

    async fn add_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn update_task(&self, task: &Task) -> Result<(), StoreError>;

    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;

    /// Company tasks, newest created first
    async fn list_tasks(&self, company_id: Uuid) -> Result<Vec<Task>, StoreError>;

    /// Deletes tasks in one batch, returning how many existed
    async fn delete_tasks(&self, ids: &[Uuid]) -> Result<usize, StoreError>;

    async fn subscribe_users(&self, company_id: Uuid) -> Result<SnapshotStream<User>, StoreError>;

    async fn subscribe_tasks(&self, company_id: Uuid) -> Result<SnapshotStream<Task>, StoreError>;

    /// Every company with at least one user
    async fn company_ids(&self) -> Result<Vec<Uuid>, StoreError>;

    /// Connectivity check
    async fn ping(&self) -> Result<(), StoreError>;

    /// Connection pool occupancy, `None` for stores without a pool
    fn pool_stats(&self) -> Option<PoolStats> {
        None
    }

    /// Releases connections before the gateway is dropped
    async fn close(&self) {}
}

/// Serializes a document and enforces [`MAX_DOCUMENT_BYTES`]
pub fn encode_document<T: Serialize>(doc: &T) -> Result<serde_json::Value, StoreError> {
    let bytes = serde_json::to_vec(doc)?;
    if bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(StoreError::WriteTooLarge {
            size: bytes.len(),
            limit: MAX_DOCUMENT_BYTES,
        });
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Orders tasks newest created first
pub(crate) fn sort_newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Turns a change feed into a snapshot stream
///
/// Emits `fetch()` once immediately, then again after every event for
/// `collection` in `company_id`. A lagging receiver re-reads instead of
/// replaying the missed events.
pub(crate) fn snapshot_stream<T, F, Fut>(
    changes: broadcast::Receiver<ChangeEvent>,
    collection: Collection,
    company_id: Uuid,
    fetch: F,
) -> SnapshotStream<T>
where
    T: Send + 'static,
    F: Fn() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, StoreError>> + Send + 'static,
{
    // The receiver is created before the first read, so a write racing the
    // initial snapshot produces one extra snapshot instead of a missed one.
    let initial_fetch = fetch.clone();
    let initial = stream::once(async move { initial_fetch().await });

    let updates = BroadcastStream::new(changes)
        .filter(move |change| {
            let relevant = match change {
                Ok(event) => event.collection == collection && event.company_id == company_id,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(%company_id, %collection, skipped, "Change feed lagged, re-reading snapshot");
                    true
                }
            };
            future::ready(relevant)
        })
        .then(move |_| {
            let fetch = fetch.clone();
            async move { fetch().await }
        });

    initial.chain(updates).boxed()
}

/// Deletes completed tasks older than `retention`
///
/// Age is measured from `completed_at`, or from `created_at` when the stamp is
/// missing. Returns the number of deleted tasks.
pub async fn cleanup_tasks_older_than(
    gateway: &dyn Gateway,
    company_id: Uuid,
    now: DateTime<Utc>,
    retention: Duration,
) -> Result<usize, StoreError> {
    let cutoff = now - retention;

    let stale: Vec<Uuid> = gateway
        .list_tasks(company_id)
        .await?
        .into_iter()
        .filter(|task| task.status == TaskStatus::Completed)
        .filter(|task| task.completed_at.unwrap_or(task.created_at) < cutoff)
        .map(|task| task.id)
        .collect();

    if stale.is_empty() {
        return Ok(0);
    }

    let deleted = gateway.delete_tasks(&stale).await?;
    info!(%company_id, deleted, "Swept old completed tasks");
    Ok(deleted)
}

/// Deletes completed tasks older than [`RETENTION_DAYS`]
pub async fn cleanup_old_tasks(
    gateway: &dyn Gateway,
    company_id: Uuid,
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    cleanup_tasks_older_than(gateway, company_id, now, Duration::days(RETENTION_DAYS)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_document_within_limit() {
        let value = encode_document(&serde_json::json!({"title": "ok"})).unwrap();
        assert_eq!(value["title"], "ok");
    }

    #[test]
    fn test_encode_document_too_large() {
        let blob = "x".repeat(MAX_DOCUMENT_BYTES);
        let err = encode_document(&serde_json::json!({ "attachments": [blob] })).unwrap_err();
        assert!(matches!(
            err,
            StoreError::WriteTooLarge { limit: MAX_DOCUMENT_BYTES, .. }
        ));
    }

    #[test]
    fn test_change_event_matches_notify_payload() {
        let company_id = Uuid::new_v4();
        let payload = format!(r#"{{"collection":"tasks","companyId":"{}"}}"#, company_id);
        let event: ChangeEvent = serde_json::from_str(&payload).unwrap();
        assert_eq!(event.collection, Collection::Tasks);
        assert_eq!(event.company_id, company_id);
    }
}
