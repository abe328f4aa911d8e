/// Task endpoints
///
/// # Endpoints
///
/// - `GET /v1/tasks` - Filtered, sorted task list
/// - `POST /v1/tasks` - Create a task
/// - `GET /v1/tasks/export` - Filtered list as an XLSX report
/// - `GET /v1/tasks/stream` - SSE stream of filtered snapshots
/// - `GET /v1/tasks/:id` - Task details
/// - `PUT /v1/tasks/:id` - Edit content (managers)
/// - `DELETE /v1/tasks/:id` - Delete (managers)
/// - `POST /v1/tasks/:id/advance` - Press the status button
/// - `POST /v1/tasks/:id/complete` - Complete with an optional proof image
/// - `POST /v1/tasks/:id/reassign` - Hand the task to another member
///
/// List, export and stream accept the same query string:
///
/// ```text
/// ?status=COMPLETED&completion=LATE&search=báo giá&from=2024-06-01&to=2024-06-30
/// ```
///
/// Employees only ever see tasks assigned to them.

use crate::{
    app::{AppState, AuthContext},
    error::{ApiError, ApiResult},
    routes::Caller,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Extension, Json,
};
use biztask_shared::{
    export,
    filter::{self, DeadlineInfo, TaskQuery},
    imaging::{self, ImageFailure},
    lifecycle::{self, Advance, TaskDraft, TaskEdit},
    models::task::{Task, TaskPriority},
};
use chrono::{DateTime, Utc};
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Task with its derived deadline badge
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,

    /// `None` once completed
    pub deadline: Option<DeadlineInfo>,

    /// Completed after the due date
    pub late: bool,
}

impl TaskView {
    pub fn new(task: Task, now: DateTime<Utc>) -> Self {
        Self {
            deadline: filter::deadline_info(&task, now),
            late: task.is_late(),
            task,
        }
    }
}

/// Result of create and edit
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMutation {
    pub task: Task,

    /// Images dropped because of `proceedWithoutFailedImages`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ImageFailure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,

    #[serde(default)]
    pub description: String,

    /// Ignored for employees, who always get their own task
    pub assignee_id: Option<Uuid>,

    pub due_date: Option<DateTime<Utc>>,

    pub priority: Option<TaskPriority>,

    /// Raw images as `data:` URLs or bare base64
    #[serde(default)]
    pub attachments: Vec<String>,

    #[serde(default)]
    pub proceed_without_failed_images: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
    pub priority: Option<TaskPriority>,

    /// Already stored images to keep; `None` keeps all of them
    pub attachments: Option<Vec<String>>,

    /// Raw images to compress and append
    #[serde(default)]
    pub new_attachments: Vec<String>,

    #[serde(default)]
    pub proceed_without_failed_images: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteTaskRequest {
    pub proof_image: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignTaskRequest {
    pub assignee_id: Uuid,
}

/// Outcome of the status button
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvanceResponse {
    /// Moved to IN_PROGRESS
    Started { task: Task },

    /// Still IN_PROGRESS; call `/complete`
    NeedsCompletion { task: Task },
}

/// Compresses submitted images, enforcing the partial-failure choice
async fn compress_attachments(
    raw: Vec<String>,
    proceed_without_failed: bool,
) -> ApiResult<(Vec<String>, Vec<ImageFailure>)> {
    if raw.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    let outcome = imaging::process_images(raw).await;
    if !outcome.is_complete() && !proceed_without_failed {
        return Err(ApiError::image_failures(&outcome.failures));
    }

    Ok((outcome.images, outcome.failures))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TaskQuery>,
) -> ApiResult<Json<Vec<TaskView>>> {
    let caller = Caller::resolve(&state, auth).await?;
    let tasks = caller.company_tasks().await?;

    let now = Utc::now();
    let views = filter::visible_tasks(&caller.user, &tasks, &query, &state.zone, now)
        .into_iter()
        .map(|t| TaskView::new(t, now))
        .collect();

    Ok(Json(views))
}

/// Creates a task
///
/// # Errors
///
/// - `400 Bad Request`: Title or due date missing
/// - `404 Not Found`: Assignee is not a member of the company
/// - `413 Payload Too Large`: Task document exceeds 1 MiB
/// - `422 Unprocessable Entity`: Images failed and `proceedWithoutFailedImages` is false
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskMutation>)> {
    let caller = Caller::resolve(&state, auth).await?;

    if let Some(assignee_id) = req.assignee_id.filter(|_| caller.user.role.can_assign_tasks()) {
        caller.load_member(assignee_id).await?;
    }

    let (attachments, warnings) =
        compress_attachments(req.attachments, req.proceed_without_failed_images).await?;

    let task = lifecycle::new_task(
        TaskDraft {
            title: req.title,
            description: req.description,
            assignee_id: req.assignee_id,
            due_date: req.due_date,
            priority: req.priority,
            attachments,
        },
        &caller.user,
        Utc::now(),
    )?;

    caller.gateway.add_task(&task).await?;

    info!(
        task_id = %task.id,
        company_id = %task.company_id,
        assignee_id = %task.assignee_id,
        dropped_images = warnings.len(),
        "Task created"
    );

    Ok((StatusCode::CREATED, Json(TaskMutation { task, warnings })))
}

/// Task details; employees only see their own tasks
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TaskView>> {
    let caller = Caller::resolve(&state, auth).await?;
    let task = caller.load_task(id).await?;

    if !caller.user.role.can_view_all_tasks() && task.assignee_id != caller.user.id {
        return Err(ApiError::NotFound("Không tìm thấy công việc".to_string()));
    }

    Ok(Json(TaskView::new(task, Utc::now())))
}

/// Manager edit of title, description, due date, assignee, priority and images
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskMutation>> {
    let caller = Caller::resolve(&state, auth).await?;
    if !lifecycle::can_edit_content(&caller.user) {
        return Err(ApiError::manager_only());
    }

    let current = caller.load_task(id).await?;
    if let Some(assignee_id) = req.assignee_id {
        caller.load_member(assignee_id).await?;
    }

    let touches_images = req.attachments.is_some() || !req.new_attachments.is_empty();
    let (added, warnings) =
        compress_attachments(req.new_attachments, req.proceed_without_failed_images).await?;

    let attachments = touches_images.then(|| {
        let mut kept = req.attachments.unwrap_or_else(|| current.attachments.clone());
        kept.extend(added);
        kept
    });

    let task = lifecycle::apply_edit(
        &current,
        TaskEdit {
            title: req.title,
            description: req.description,
            due_date: req.due_date,
            assignee_id: req.assignee_id,
            priority: req.priority,
            attachments,
        },
    )?;

    caller.gateway.update_task(&task).await?;
    info!(task_id = %task.id, editor_id = %caller.user.id, "Task edited");

    Ok(Json(TaskMutation { task, warnings }))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let caller = Caller::resolve(&state, auth).await?;
    caller.require_manager()?;

    let task = caller.load_task(id).await?;
    caller.gateway.delete_task(task.id).await?;

    info!(task_id = %task.id, deleted_by = %caller.user.id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// TODO → IN_PROGRESS; an IN_PROGRESS task answers `NEEDS_COMPLETION`
///
/// # Errors
///
/// - `403 Forbidden`: Caller is neither a manager nor the assignee
/// - `409 Conflict`: Task is already completed
pub async fn advance_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AdvanceResponse>> {
    let caller = Caller::resolve(&state, auth).await?;
    let task = caller.load_task(id).await?;

    if !lifecycle::can_edit_status(&caller.user, &task) {
        return Err(ApiError::manager_only());
    }

    match lifecycle::advance(&task)? {
        Advance::Started(started) => {
            caller.gateway.update_task(&started).await?;
            info!(task_id = %started.id, user_id = %caller.user.id, "Task started");
            Ok(Json(AdvanceResponse::Started { task: started }))
        }
        Advance::NeedsCompletion => Ok(Json(AdvanceResponse::NeedsCompletion { task })),
    }
}

/// IN_PROGRESS → COMPLETED
pub async fn complete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<CompleteTaskRequest>>,
) -> ApiResult<Json<Task>> {
    let caller = Caller::resolve(&state, auth).await?;
    let task = caller.load_task(id).await?;

    if !lifecycle::can_edit_status(&caller.user, &task) {
        return Err(ApiError::manager_only());
    }

    let req = body.map(|Json(req)| req).unwrap_or_default();
    let proof_image = match req.proof_image.filter(|p| !p.trim().is_empty()) {
        Some(raw) => Some(imaging::compress_in_background(raw).await?),
        None => None,
    };

    let done = lifecycle::complete(&task, proof_image, Utc::now())?;
    caller.gateway.update_task(&done).await?;

    info!(
        task_id = %done.id,
        user_id = %caller.user.id,
        late = done.is_late(),
        "Task completed"
    );

    Ok(Json(done))
}

pub async fn reassign_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReassignTaskRequest>,
) -> ApiResult<Json<Task>> {
    let caller = Caller::resolve(&state, auth).await?;
    caller.require_manager()?;

    let task = caller.load_task(id).await?;
    let assignee = caller.load_member(req.assignee_id).await?;

    // A completed task is a lifecycle conflict, not a permission problem.
    let moved = lifecycle::reassign(&task, assignee.id)?;
    caller.gateway.update_task(&moved).await?;

    info!(
        task_id = %moved.id,
        from = %task.assignee_id,
        to = %moved.assignee_id,
        "Task reassigned"
    );

    Ok(Json(moved))
}

/// Filtered list as `Bao_Cao_Cong_Viec_{date}.xlsx`
///
/// # Errors
///
/// - `400 Bad Request`: Nothing matches the filter
pub async fn export_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TaskQuery>,
) -> ApiResult<Response> {
    let caller = Caller::resolve(&state, auth).await?;
    let tasks = caller.company_tasks().await?;
    let users = caller.company_users().await?;

    let now = Utc::now();
    let visible = filter::visible_tasks(&caller.user, &tasks, &query, &state.zone, now);
    let workbook = export::export_tasks(&visible, &users, &state.zone, now)?;

    info!(rows = visible.len(), user_id = %caller.user.id, "Tasks exported");

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export::export_file_name(now)
    );

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        workbook,
    )
        .into_response())
}

/// Streams the filtered list every time a company task changes
///
/// The first event carries the current list. Events are named `tasks`;
/// a failed snapshot is sent as an `error` event and the stream continues.
pub async fn stream_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<TaskQuery>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let caller = Caller::resolve(&state, auth).await?;

    info!(
        user_id = %caller.user.id,
        company_id = %caller.user.company_id,
        "Streaming task snapshots"
    );

    let snapshots = caller.gateway.subscribe_tasks(caller.user.company_id).await?;
    let user = caller.user;
    let zone = state.zone;

    let events = snapshots.map(move |snapshot| {
        let event = match snapshot {
            Ok(tasks) => {
                let now = Utc::now();
                let views: Vec<TaskView> =
                    filter::visible_tasks(&user, &tasks, &query, &zone, now)
                        .into_iter()
                        .map(|t| TaskView::new(t, now))
                        .collect();
                Event::default().event("tasks").json_data(views)
            }
            Err(e) => {
                warn!(error = %e, "Task snapshot failed");
                Ok(Event::default().event("error").data(e.to_string()))
            }
        };

        Ok(event.unwrap_or_else(|e| Event::default().event("error").data(e.to_string())))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(25))))
}
