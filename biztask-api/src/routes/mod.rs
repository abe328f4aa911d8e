/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `setup`: Store connection setup
/// - `auth`: Authentication endpoints (register, login, refresh)
/// - `dashboard`: Statistics for the signed-in user
/// - `tasks`: Task list, lifecycle, export and live stream
/// - `team`: Workload per member and leaderboard
/// - `users`: Roster management and CSV import
/// - `profile`: Own profile, password and avatar
/// - `dictation`: Voice input for the task form

pub mod auth;
pub mod dashboard;
pub mod dictation;
pub mod health;
pub mod profile;
pub mod setup;
pub mod tasks;
pub mod team;
pub mod users;

use crate::app::{AppState, AuthContext};
use crate::error::{ApiError, ApiResult};
use biztask_shared::gateway::Gateway;
use biztask_shared::models::task::Task;
use biztask_shared::models::user::User;
use std::sync::Arc;
use uuid::Uuid;

/// Authenticated caller with a live gateway
///
/// Tokens only carry ids; the user document is re-read on every request so
/// role changes and deletions take effect immediately.
pub struct Caller {
    pub gateway: Arc<dyn Gateway>,
    pub user: User,
}

impl Caller {
    pub async fn resolve(state: &AppState, auth: AuthContext) -> ApiResult<Self> {
        let gateway = state.gateway().await?;

        let user = gateway
            .get_user(auth.user_id)
            .await?
            .filter(|u| u.company_id == auth.company_id)
            .ok_or_else(|| {
                tracing::warn!(user_id = %auth.user_id, "Token for unknown user");
                ApiError::Unauthorized("Tài khoản không còn tồn tại".to_string())
            })?;

        Ok(Self { gateway, user })
    }

    /// Fails with 403 unless the caller is a director or manager
    pub fn require_manager(&self) -> ApiResult<()> {
        if self.user.role.is_manager_tier() {
            Ok(())
        } else {
            Err(ApiError::manager_only())
        }
    }

    /// Loads a task of the caller's company
    ///
    /// Tasks of other companies are reported as missing.
    pub async fn load_task(&self, id: Uuid) -> ApiResult<Task> {
        self.gateway
            .get_task(id)
            .await?
            .filter(|t| t.company_id == self.user.company_id)
            .ok_or_else(|| ApiError::NotFound("Không tìm thấy công việc".to_string()))
    }

    /// Loads a member of the caller's company
    pub async fn load_member(&self, id: Uuid) -> ApiResult<User> {
        self.gateway
            .get_user(id)
            .await?
            .filter(|u| u.company_id == self.user.company_id)
            .ok_or_else(|| ApiError::NotFound("Không tìm thấy nhân viên".to_string()))
    }

    pub async fn company_tasks(&self) -> ApiResult<Vec<Task>> {
        Ok(self.gateway.list_tasks(self.user.company_id).await?)
    }

    pub async fn company_users(&self) -> ApiResult<Vec<User>> {
        Ok(self.gateway.list_users(self.user.company_id).await?)
    }
}
