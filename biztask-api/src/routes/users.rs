/// User management endpoints
///
/// # Endpoints
///
/// - `GET /v1/users` - Company roster (everyone)
/// - `POST /v1/users` - Add a member (managers)
/// - `POST /v1/users/import` - Bulk add from CSV text (managers)
/// - `GET /v1/users/template` - CSV template download
/// - `PUT /v1/users/:id` - Edit a member (managers)
/// - `DELETE /v1/users/:id` - Remove a member (managers)
/// - `PUT /v1/users/:id/password` - Set a member's password (managers)
///
/// Only a director may create, edit or remove another director. Nobody can
/// remove their own account.

use crate::{
    app::{AppState, AuthContext},
    error::{ApiError, ApiResult},
    routes::Caller,
};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use biztask_shared::{
    auth::{
        login::{with_new_password, AuthError},
        password::{hash_password, validate_new_password},
    },
    import::{self, SkippedRow},
    models::user::{CreateUser, PublicUser, User, UserRole},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Họ tên từ 1 đến 100 ký tự"))]
    pub name: String,

    #[validate(length(min = 1, max = 50, message = "Tên đăng nhập từ 1 đến 50 ký tự"))]
    pub username: String,

    pub password: String,

    /// Defaults to EMPLOYEE
    pub role: Option<UserRole>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100, message = "Họ tên từ 1 đến 100 ký tự"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Tên đăng nhập từ 1 đến 50 ký tự"))]
    pub username: Option<String>,

    pub role: Option<UserRole>,

    #[validate(email(message = "Email không hợp lệ"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub imported: Vec<PublicUser>,
    pub skipped: Vec<SkippedRow>,
}

/// Directors are managed by directors only
fn ensure_may_manage(caller: &User, role: UserRole) -> ApiResult<()> {
    if role == UserRole::Director && caller.role != UserRole::Director {
        return Err(ApiError::Forbidden(
            "Chỉ giám đốc mới được quản lý tài khoản giám đốc".to_string(),
        ));
    }
    Ok(())
}

fn username_taken(roster: &[User], username: &str, except: Option<Uuid>) -> bool {
    roster
        .iter()
        .any(|u| u.username == username && Some(u.id) != except)
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<PublicUser>>> {
    let caller = Caller::resolve(&state, auth).await?;
    let users = caller.company_users().await?;

    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

/// Adds a member to the caller's company
///
/// # Errors
///
/// - `403 Forbidden`: Caller is an employee, or creates a director without being one
/// - `409 Conflict`: Login name already used in the company
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<PublicUser>)> {
    req.validate()?;

    let caller = Caller::resolve(&state, auth).await?;
    caller.require_manager()?;

    let role = req.role.unwrap_or(UserRole::Employee);
    ensure_may_manage(&caller.user, role)?;

    validate_new_password(&req.password).map_err(|e| ApiError::field("password", e))?;

    let username = req.username.trim().to_string();
    let roster = caller.company_users().await?;
    if username_taken(&roster, &username, None) {
        return Err(AuthError::UsernameTaken.into());
    }

    let user = User::for_company_of(
        &caller.user,
        CreateUser {
            name: req.name.trim().to_string(),
            username,
            password_hash: hash_password(&req.password)?,
            role,
        },
    );
    caller.gateway.add_user(&user).await?;

    info!(
        user_id = %user.id,
        company_id = %user.company_id,
        role = %user.role,
        created_by = %caller.user.id,
        "User created"
    );

    Ok((StatusCode::CREATED, Json(PublicUser::from(&user))))
}

/// Imports members from CSV text
///
/// The body is the raw file content. Bad and duplicate rows, and rows the
/// store refuses, are reported and never fatal.
pub async fn import_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    body: String,
) -> ApiResult<Json<ImportResponse>> {
    let caller = Caller::resolve(&state, auth).await?;
    caller.require_manager()?;

    let content = body.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(ApiError::BadRequest("Tệp CSV trống".to_string()));
    }

    let roster = caller.company_users().await?;
    let report = import::parse_roster_csv(content, &caller.user, &roster)?;

    let outcome = import::store_imported(caller.gateway.as_ref(), report).await;

    info!(
        company_id = %caller.user.company_id,
        imported = outcome.stored.len(),
        skipped = outcome.skipped.len(),
        "Roster imported"
    );

    Ok(Json(ImportResponse {
        imported: outcome.stored.iter().map(PublicUser::from).collect(),
        skipped: outcome.skipped,
    }))
}

pub async fn import_template() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", import::TEMPLATE_FILE_NAME),
            ),
        ],
        import::template_csv(),
    )
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<PublicUser>> {
    req.validate()?;

    let caller = Caller::resolve(&state, auth).await?;
    caller.require_manager()?;

    let mut user = caller.load_member(id).await?;
    ensure_may_manage(&caller.user, user.role)?;

    if let Some(role) = req.role {
        ensure_may_manage(&caller.user, role)?;
        user.role = role;
    }
    if let Some(name) = req.name {
        user.name = name.trim().to_string();
    }
    if let Some(username) = req.username {
        let username = username.trim().to_string();
        let roster = caller.company_users().await?;
        if username_taken(&roster, &username, Some(user.id)) {
            return Err(AuthError::UsernameTaken.into());
        }
        user.username = username;
    }
    if let Some(email) = req.email {
        user.email = Some(email);
    }

    caller.gateway.update_user(&user).await?;
    info!(user_id = %user.id, updated_by = %caller.user.id, "User updated");

    Ok(Json(PublicUser::from(&user)))
}

/// Removes a member; their tasks stay in the company
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let caller = Caller::resolve(&state, auth).await?;
    caller.require_manager()?;

    if id == caller.user.id {
        return Err(ApiError::Conflict(
            "Không thể xóa tài khoản đang đăng nhập".to_string(),
        ));
    }

    let user = caller.load_member(id).await?;
    ensure_may_manage(&caller.user, user.role)?;

    caller.gateway.delete_user(user.id).await?;
    info!(user_id = %user.id, deleted_by = %caller.user.id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<StatusCode> {
    let caller = Caller::resolve(&state, auth).await?;
    caller.require_manager()?;

    let user = caller.load_member(id).await?;
    ensure_may_manage(&caller.user, user.role)?;

    let updated = with_new_password(&user, &req.password)?;
    caller.gateway.update_user(&updated).await?;

    info!(user_id = %user.id, reset_by = %caller.user.id, "Password reset");
    Ok(StatusCode::NO_CONTENT)
}
