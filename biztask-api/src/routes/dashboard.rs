/// Dashboard endpoint
///
/// # Endpoint
///
/// ```text
/// GET /v1/dashboard
/// ```
///
/// Figures are computed over the caller's scope: the whole company for
/// directors and managers, own tasks for employees.

use crate::{
    app::{AppState, AuthContext},
    error::ApiResult,
    routes::Caller,
};
use axum::{extract::State, Extension, Json};
use biztask_shared::{
    filter::scope_for,
    stats::{self, DashboardStats, TrendPoint},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// First and last day of the current month, for drill-down links
#[derive(Debug, Serialize, Deserialize)]
pub struct MonthRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub stats: DashboardStats,
    pub trend: Vec<TrendPoint>,
    /// Open TODO tasks waiting for an employee; 0 for managers
    pub pending_badge: usize,
    /// Company-wide tasks created this month
    pub company_created_month: usize,
    pub month_range: MonthRange,
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DashboardResponse>> {
    let caller = Caller::resolve(&state, auth).await?;
    let tasks = caller.company_tasks().await?;
    let scoped = scope_for(&caller.user, &tasks);

    let now = Utc::now();
    let (from, to) = state.zone.month_range(now);

    Ok(Json(DashboardResponse {
        stats: stats::dashboard(&scoped, &state.zone, now),
        trend: stats::completion_trend(&scoped, &state.zone, now),
        pending_badge: stats::pending_badge_count(&caller.user, &tasks),
        company_created_month: stats::tasks_created_this_month(&tasks, &state.zone, now),
        month_range: MonthRange { from, to },
    }))
}
