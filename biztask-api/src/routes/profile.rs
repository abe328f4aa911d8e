/// Own profile endpoints
///
/// - `GET /v1/profile` - Signed-in user
/// - `PUT /v1/profile/password` - Change own password
/// - `PUT /v1/profile/avatar` - Replace avatar with an uploaded image

use crate::{
    app::{AppState, AuthContext},
    error::ApiResult,
    routes::Caller,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use biztask_shared::{auth::login::with_new_password, imaging, models::user::PublicUser};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeAvatarRequest {
    /// `data:` URL or bare base64 of the picked image
    pub image: String,
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<PublicUser>> {
    let caller = Caller::resolve(&state, auth).await?;
    Ok(Json(PublicUser::from(&caller.user)))
}

/// The bearer token is the proof of identity; the old password is not asked
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let caller = Caller::resolve(&state, auth).await?;

    let updated = with_new_password(&caller.user, &req.new_password)?;
    caller.gateway.update_user(&updated).await?;

    info!(user_id = %updated.id, "Password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// Compresses the image and stores it inline as the avatar
///
/// # Errors
///
/// - `413 Payload Too Large`: User document would exceed 1 MiB
/// - `422 Unprocessable Entity`: Image could not be decoded
pub async fn change_avatar(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangeAvatarRequest>,
) -> ApiResult<Json<PublicUser>> {
    let caller = Caller::resolve(&state, auth).await?;

    let mut user = caller.user;
    user.avatar = imaging::compress_in_background(req.image).await?;
    caller.gateway.update_user(&user).await?;

    info!(user_id = %user.id, avatar_bytes = user.avatar.len(), "Avatar changed");
    Ok(Json(PublicUser::from(&user)))
}
