/// In-process document store
///
/// Holds both collections in `RwLock`ed maps and publishes a [`ChangeEvent`]
/// on a broadcast channel after every write. Used by the test suites and by
/// the API when `BIZTASK_STORE=memory`.

use super::{
    encode_document, snapshot_stream, sort_newest_first, ChangeEvent, Collection, Gateway,
    SnapshotStream, StoreError,
};
use crate::models::task::Task;
use crate::models::user::User;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
struct Collections {
    users: RwLock<HashMap<Uuid, User>>,
    tasks: RwLock<HashMap<Uuid, Task>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Collections {
    fn notify(&self, collection: Collection, company_id: Uuid) {
        // No receivers is fine.
        let _ = self.changes.send(ChangeEvent {
            collection,
            company_id,
        });
    }

    async fn users_of(&self, company_id: Uuid) -> Vec<User> {
        let mut users: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.company_id == company_id)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.username.cmp(&b.username)));
        users
    }

    async fn tasks_of(&self, company_id: Uuid) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.company_id == company_id)
            .cloned()
            .collect();
        sort_newest_first(&mut tasks);
        tasks
    }
}

/// Gateway backed by process memory
#[derive(Debug, Clone)]
pub struct MemoryGateway {
    inner: Arc<Collections>,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Collections {
                users: RwLock::new(HashMap::new()),
                tasks: RwLock::new(HashMap::new()),
                changes,
            }),
        }
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn register_company(&self, founder: &User) -> Result<(), StoreError> {
        self.add_user(founder).await
    }

    async fn find_user_for_login(
        &self,
        company_name: &str,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .users
            .read()
            .await
            .values()
            .find(|u| u.company_name == company_name && u.username == username)
            .cloned())
    }

    async fn username_exists(&self, company_name: &str, username: &str) -> Result<bool, StoreError> {
        Ok(self.find_user_for_login(company_name, username).await?.is_some())
    }

    async fn add_user(&self, user: &User) -> Result<(), StoreError> {
        encode_document(user)?;
        self.inner.users.write().await.insert(user.id, user.clone());
        debug!(user_id = %user.id, company_id = %user.company_id, "User stored");
        self.inner.notify(Collection::Users, user.company_id);
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        encode_document(user)?;
        {
            let mut users = self.inner.users.write().await;
            let slot = users.get_mut(&user.id).ok_or(StoreError::NotFound {
                collection: Collection::Users,
                id: user.id,
            })?;
            *slot = user.clone();
        }
        self.inner.notify(Collection::Users, user.company_id);
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let removed = self.inner.users.write().await.remove(&id);
        match removed {
            Some(user) => {
                self.inner.notify(Collection::Users, user.company_id);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                collection: Collection::Users,
                id,
            }),
        }
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.users.read().await.get(&id).cloned())
    }

    async fn list_users(&self, company_id: Uuid) -> Result<Vec<User>, StoreError> {
        Ok(self.inner.users_of(company_id).await)
    }

    async fn add_task(&self, task: &Task) -> Result<(), StoreError> {
        encode_document(task)?;
        self.inner.tasks.write().await.insert(task.id, task.clone());
        debug!(task_id = %task.id, company_id = %task.company_id, "Task stored");
        self.inner.notify(Collection::Tasks, task.company_id);
        Ok(())
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        encode_document(task)?;
        {
            let mut tasks = self.inner.tasks.write().await;
            let slot = tasks.get_mut(&task.id).ok_or(StoreError::NotFound {
                collection: Collection::Tasks,
                id: task.id,
            })?;
            *slot = task.clone();
        }
        self.inner.notify(Collection::Tasks, task.company_id);
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<(), StoreError> {
        let removed = self.inner.tasks.write().await.remove(&id);
        match removed {
            Some(task) => {
                self.inner.notify(Collection::Tasks, task.company_id);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                collection: Collection::Tasks,
                id,
            }),
        }
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        Ok(self.inner.tasks.read().await.get(&id).cloned())
    }

    async fn list_tasks(&self, company_id: Uuid) -> Result<Vec<Task>, StoreError> {
        Ok(self.inner.tasks_of(company_id).await)
    }

    async fn delete_tasks(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        let removed: Vec<Task> = {
            let mut tasks = self.inner.tasks.write().await;
            ids.iter().filter_map(|id| tasks.remove(id)).collect()
        };

        let companies: BTreeSet<Uuid> = removed.iter().map(|t| t.company_id).collect();
        for company_id in companies {
            self.inner.notify(Collection::Tasks, company_id);
        }

        Ok(removed.len())
    }

    async fn subscribe_users(&self, company_id: Uuid) -> Result<SnapshotStream<User>, StoreError> {
        let inner = Arc::clone(&self.inner);
        let rx = inner.changes.subscribe();
        Ok(snapshot_stream(rx, Collection::Users, company_id, move || {
            let inner = Arc::clone(&inner);
            async move { Ok(inner.users_of(company_id).await) }
        }))
    }

    async fn subscribe_tasks(&self, company_id: Uuid) -> Result<SnapshotStream<Task>, StoreError> {
        let inner = Arc::clone(&self.inner);
        let rx = inner.changes.subscribe();
        Ok(snapshot_stream(rx, Collection::Tasks, company_id, move || {
            let inner = Arc::clone(&inner);
            async move { Ok(inner.tasks_of(company_id).await) }
        }))
    }

    async fn company_ids(&self) -> Result<Vec<Uuid>, StoreError> {
        let ids: BTreeSet<Uuid> = self
            .inner
            .users
            .read()
            .await
            .values()
            .map(|u| u.company_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
