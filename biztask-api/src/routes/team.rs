/// Team endpoints
///
/// - `GET /v1/team` - Workload per member, heaviest backlog first (managers)
/// - `GET /v1/team/leaderboard` - Top employees this month (everyone)
/// - `GET /v1/team/:id/tasks` - One member's tasks (managers, or the member)

use crate::{
    app::{AppState, AuthContext},
    error::{ApiError, ApiResult},
    routes::{tasks::TaskView, Caller},
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use biztask_shared::{
    filter,
    stats::{self, TeamStat},
};
use chrono::Utc;
use uuid::Uuid;

pub async fn team_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<TeamStat>>> {
    let caller = Caller::resolve(&state, auth).await?;
    caller.require_manager()?;

    let users = caller.company_users().await?;
    let tasks = caller.company_tasks().await?;

    Ok(Json(stats::team_stats(&users, &tasks, &state.zone, Utc::now())))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<TeamStat>>> {
    let caller = Caller::resolve(&state, auth).await?;

    let users = caller.company_users().await?;
    let tasks = caller.company_tasks().await?;
    let team = stats::team_stats(&users, &tasks, &state.zone, Utc::now());

    Ok(Json(stats::leaderboard(&team)))
}

/// Tasks assigned to one member: open first, then by due date
pub async fn member_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(member_id): Path<Uuid>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let caller = Caller::resolve(&state, auth).await?;
    if !caller.user.role.is_manager_tier() && caller.user.id != member_id {
        return Err(ApiError::manager_only());
    }

    let member = caller.load_member(member_id).await?;
    let tasks = caller.company_tasks().await?;

    let now = Utc::now();
    let views = filter::employee_tasks(&tasks, member.id)
        .into_iter()
        .map(|t| TaskView::new(t, now))
        .collect();

    Ok(Json(views))
}
