/// PostgreSQL document store
///
/// Documents are stored whole in a JSONB `doc` column. The columns used by
/// equality filters (`company_id`, `company_name`, `username`, `status`) are
/// copied out of the document on every write.
///
/// A trigger publishes `{"collection", "companyId"}` on the `biztask_changes`
/// channel after each write. One background task per gateway listens on that
/// channel and fans notifications out to subscribers through a broadcast
/// channel; subscribers re-read the company snapshot.
///
/// # Example
///
/// ```no_run
/// use biztask_shared::db::pool::{create_pool, DatabaseConfig};
/// use biztask_shared::gateway::{postgres::PgGateway, Gateway};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// }).await?;
///
/// let gateway = PgGateway::connect(pool).await?;
/// gateway.ping().await?;
/// # Ok(())
/// # }
/// ```

use super::{
    encode_document, snapshot_stream, ChangeEvent, Collection, Gateway, SnapshotStream,
    StoreError,
};
use crate::db::pool::{close_pool, get_pool_stats, health_check, PoolStats};
use crate::models::task::Task;
use crate::models::user::User;
use async_trait::async_trait;
use sqlx::postgres::{PgListener, PgPool};
use sqlx::types::Json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// NOTIFY channel written by the change trigger
pub const CHANGE_CHANNEL: &str = "biztask_changes";

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// Aborts the listener task when the last gateway clone is dropped
#[derive(Debug)]
struct ListenerGuard(JoinHandle<()>);

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Gateway backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgGateway {
    pool: PgPool,
    changes: broadcast::Sender<ChangeEvent>,
    _listener: Arc<ListenerGuard>,
}

impl PgGateway {
    /// Starts listening on [`CHANGE_CHANNEL`] and wraps the pool
    pub async fn connect(pool: PgPool) -> Result<Self, StoreError> {
        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let handle = tokio::spawn(forward_changes(listener, changes.clone()));

        info!(channel = CHANGE_CHANNEL, "Listening for document changes");

        Ok(Self {
            pool,
            changes,
            _listener: Arc::new(ListenerGuard(handle)),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn forward_changes(mut listener: PgListener, changes: broadcast::Sender<ChangeEvent>) {
    loop {
        match listener.recv().await {
            Ok(notification) => {
                match serde_json::from_str::<ChangeEvent>(notification.payload()) {
                    Ok(event) => {
                        debug!(collection = %event.collection, company_id = %event.company_id, "Change notification");
                        let _ = changes.send(event);
                    }
                    Err(e) => {
                        warn!(payload = notification.payload(), error = %e, "Ignoring malformed change notification");
                    }
                }
            }
            Err(e) => {
                // PgListener reconnects on the next recv.
                error!(error = %e, "Change listener connection failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn users_of(pool: &PgPool, company_id: Uuid) -> Result<Vec<User>, StoreError> {
    let rows: Vec<Json<User>> = sqlx::query_scalar(
        "SELECT doc FROM users WHERE company_id = $1 ORDER BY doc->>'name', username",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|Json(user)| user).collect())
}

async fn tasks_of(pool: &PgPool, company_id: Uuid) -> Result<Vec<Task>, StoreError> {
    let rows: Vec<Json<Task>> = sqlx::query_scalar(
        "SELECT doc FROM tasks WHERE company_id = $1 ORDER BY created_at DESC",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|Json(task)| task).collect())
}

#[async_trait]
impl Gateway for PgGateway {
    async fn register_company(&self, founder: &User) -> Result<(), StoreError> {
        self.add_user(founder).await
    }

    async fn find_user_for_login(
        &self,
        company_name: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let row: Option<Json<User>> = sqlx::query_scalar(
            "SELECT doc FROM users WHERE company_name = $1 AND username = $2 LIMIT 1",
        )
        .bind(company_name)
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|Json(user)| user))
    }

    async fn username_exists(&self, company_name: &str, username: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE company_name = $1 AND username = $2)",
        )
        .bind(company_name)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn add_user(&self, user: &User) -> Result<(), StoreError> {
        let doc = encode_document(user)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, company_id, company_name, username, doc, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (id) DO UPDATE SET
                company_id = EXCLUDED.company_id,
                company_name = EXCLUDED.company_name,
                username = EXCLUDED.username,
                doc = EXCLUDED.doc,
                updated_at = NOW()
            "#,
        )
        .bind(user.id)
        .bind(user.company_id)
        .bind(&user.company_name)
        .bind(&user.username)
        .bind(doc)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let doc = encode_document(user)?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET company_id = $2, company_name = $3, username = $4, doc = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(user.company_id)
        .bind(&user.company_name)
        .bind(&user.username)
        .bind(doc)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: Collection::Users,
                id: user.id,
            });
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: Collection::Users,
                id,
            });
        }
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row: Option<Json<User>> = sqlx::query_scalar("SELECT doc FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|Json(user)| user))
    }

    async fn list_users(&self, company_id: Uuid) -> Result<Vec<User>, StoreError> {
        users_of(&self.pool, company_id).await
    }

    async fn add_task(&self, task: &Task) -> Result<(), StoreError> {
        let doc = encode_document(task)?;

        sqlx::query(
            r#"
            INSERT INTO tasks (id, company_id, status, created_at, doc, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (id) DO UPDATE SET
                company_id = EXCLUDED.company_id,
                status = EXCLUDED.status,
                created_at = EXCLUDED.created_at,
                doc = EXCLUDED.doc,
                updated_at = NOW()
            "#,
        )
        .bind(task.id)
        .bind(task.company_id)
        .bind(task.status.as_str())
        .bind(task.created_at)
        .bind(doc)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        let doc = encode_document(task)?;

        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET company_id = $2, status = $3, created_at = $4, doc = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(task.id)
        .bind(task.company_id)
        .bind(task.status.as_str())
        .bind(task.created_at)
        .bind(doc)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: Collection::Tasks,
                id: task.id,
            });
        }
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: Collection::Tasks,
                id,
            });
        }
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        let row: Option<Json<Task>> = sqlx::query_scalar("SELECT doc FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|Json(task)| task))
    }

    async fn list_tasks(&self, company_id: Uuid) -> Result<Vec<Task>, StoreError> {
        tasks_of(&self.pool, company_id).await
    }

    async fn delete_tasks(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM tasks WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn subscribe_users(&self, company_id: Uuid) -> Result<SnapshotStream<User>, StoreError> {
        let pool = self.pool.clone();
        Ok(snapshot_stream(
            self.changes.subscribe(),
            Collection::Users,
            company_id,
            move || {
                let pool = pool.clone();
                async move { users_of(&pool, company_id).await }
            },
        ))
    }

    async fn subscribe_tasks(&self, company_id: Uuid) -> Result<SnapshotStream<Task>, StoreError> {
        let pool = self.pool.clone();
        Ok(snapshot_stream(
            self.changes.subscribe(),
            Collection::Tasks,
            company_id,
            move || {
                let pool = pool.clone();
                async move { tasks_of(&pool, company_id).await }
            },
        ))
    }

    async fn company_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT DISTINCT company_id FROM users ORDER BY company_id")
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        health_check(&self.pool).await?;
        Ok(())
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        Some(get_pool_stats(&self.pool))
    }

    async fn close(&self) {
        close_pool(self.pool.clone()).await;
    }
}
