/// Authentication endpoints
///
/// This module provides company authentication endpoints:
/// - Company registration (creates the founding director)
/// - Login by company name, login name and password
/// - Token refresh
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register a company
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Refresh access token

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use biztask_shared::{
    auth::{jwt, login as company_login},
    models::user::PublicUser,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Tên công ty từ 1 đến 100 ký tự"))]
    pub company_name: String,

    /// Display name of the director
    #[validate(length(min = 1, max = 100, message = "Họ tên từ 1 đến 100 ký tự"))]
    pub name: String,

    #[validate(length(min = 1, max = 50, message = "Tên đăng nhập từ 1 đến 50 ký tự"))]
    pub username: String,

    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Vui lòng nhập tên công ty"))]
    pub company_name: String,

    #[validate(length(min = 1, message = "Vui lòng nhập tên đăng nhập"))]
    pub username: String,

    pub password: String,
}

/// Session returned by register and login
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: PublicUser,

    #[serde(flatten)]
    pub tokens: jwt::TokenPair,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// New access token (24h)
    pub access_token: String,
}

/// Registers a company and signs in its director
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "companyName": "Công ty ABC",
///   "name": "Trần Văn B",
///   "username": "giamdoc",
///   "password": "matkhau"
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: A field is blank
/// - `409 Conflict`: Login name already used in this company
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<SessionResponse>> {
    req.validate()?;

    let gateway = state.gateway().await?;
    let user = company_login::register(
        gateway.as_ref(),
        company_login::Registration {
            company_name: req.company_name,
            name: req.name,
            username: req.username,
            password: req.password,
        },
    )
    .await?;

    let tokens = jwt::issue_token_pair(user.id, user.company_id, state.jwt_secret())?;

    Ok(Json(SessionResponse {
        user: PublicUser::from(&user),
        tokens,
    }))
}

/// Login endpoint
///
/// # Errors
///
/// - `401 Unauthorized`: Wrong company, login name or password
/// - `422 Unprocessable Entity`: Validation failed
/// - `503 Service Unavailable`: Store not configured
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    req.validate()?;

    let gateway = state.gateway().await?;
    let user = company_login::login(
        gateway.as_ref(),
        &req.company_name,
        &req.username,
        &req.password,
    )
    .await?;

    let tokens = jwt::issue_token_pair(user.id, user.company_id, state.jwt_secret())?;

    Ok(Json(SessionResponse {
        user: PublicUser::from(&user),
        tokens,
    }))
}

/// Exchanges a refresh token for a new access token
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired refresh token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let access = jwt::Claims::new(claims.sub, claims.company_id, jwt::TokenType::Access);
    let access_token = jwt::create_token(&access, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}
