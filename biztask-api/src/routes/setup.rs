/// Store connection setup
///
/// # Endpoints
///
/// - `GET /v1/setup` - Whether a store is connected
/// - `POST /v1/setup` - Parse pasted settings, connect, persist
/// - `DELETE /v1/setup` - Forget the settings and return to setup mode
///
/// `POST` is open only while no store is connected. Once a store is
/// connected, both `POST` and `DELETE` require a director's access token.
///
/// `POST` accepts the connection block as copied from a hosting console:
///
/// ```json
/// { "config": "const config = { databaseUrl: 'postgres://…', maxConnections: 5 };" }
/// ```

use crate::{
    app::{authenticate, AppState},
    config::StoreKind,
    error::{ApiError, ApiResult},
    routes::Caller,
    store,
};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use biztask_shared::models::user::UserRole;
use biztask_shared::settings::{parse_lenient, SettingsError};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Setup status response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupStatus {
    pub configured: bool,

    /// `postgres` or `memory`
    pub store: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

/// Pasted configuration
#[derive(Debug, Deserialize)]
pub struct ConfigureRequest {
    pub config: String,
}

/// Requires a director of the connected store, if one is connected
async fn require_director_once_configured(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    if !state.is_configured().await {
        return Ok(());
    }

    let auth = authenticate(state, headers)?;
    let caller = Caller::resolve(state, auth).await?;
    if caller.user.role != UserRole::Director {
        warn!(user_id = %caller.user.id, "Non-director tried to change store settings");
        return Err(ApiError::Forbidden(
            "Chỉ giám đốc mới được thay đổi cấu hình cơ sở dữ liệu".to_string(),
        ));
    }
    Ok(())
}

pub async fn setup_status(State(state): State<AppState>) -> ApiResult<Json<SetupStatus>> {
    let project_name = state.settings.load().await.and_then(|s| s.project_name);

    Ok(Json(SetupStatus {
        configured: state.is_configured().await,
        store: state.config.store.kind.as_str().to_string(),
        project_name,
    }))
}

/// Configures the PostgreSQL store
///
/// # Errors
///
/// - `400 Bad Request`: Text could not be parsed or lacks `databaseUrl`
/// - `401 Unauthorized`: A store is connected and no valid token was sent
/// - `403 Forbidden`: A store is connected and the caller is not a director
/// - `409 Conflict`: Server runs on the in-memory store
/// - `503 Service Unavailable`: Connection or migration failed
pub async fn configure(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConfigureRequest>,
) -> ApiResult<Json<SetupStatus>> {
    if state.config.store.kind == StoreKind::Memory {
        return Err(ApiError::Conflict(
            "Máy chủ đang chạy với bộ nhớ tạm, không cần cấu hình".to_string(),
        ));
    }
    require_director_once_configured(&state, &headers).await?;

    let settings = parse_lenient(&req.config).map_err(|e| match e {
        SettingsError::Io(_) => ApiError::from(e),
        other => ApiError::BadRequest(other.to_string()),
    })?;

    let gateway = store::connect_postgres(&settings).await.map_err(|e| {
        error!(error = %format!("{:#}", e), "Store setup failed");
        ApiError::SetupRequired(format!("Không thể kết nối cơ sở dữ liệu: {}", e))
    })?;

    state.settings.save(&settings).await?;
    state.install_gateway(gateway).await;

    info!(project_name = ?settings.project_name, "Store configured");

    Ok(Json(SetupStatus {
        configured: true,
        store: StoreKind::Postgres.as_str().to_string(),
        project_name: settings.project_name,
    }))
}

/// Removes the saved settings and disconnects
///
/// Requires a director's token while a store is connected.
pub async fn reset(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<StatusCode> {
    if state.config.store.kind == StoreKind::Memory {
        return Err(ApiError::Conflict(
            "Máy chủ đang chạy với bộ nhớ tạm, không thể đặt lại".to_string(),
        ));
    }
    require_director_once_configured(&state, &headers).await?;

    state.settings.reset().await?;
    state.clear_gateway().await;

    info!("Store settings reset, back to setup mode");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::http::header;
    use biztask_shared::auth::jwt;
    use biztask_shared::gateway::{memory::MemoryGateway, Gateway};
    use biztask_shared::models::user::User;
    use std::sync::Arc;

    fn postgres_state(dir: &std::path::Path) -> AppState {
        let mut config = Config::for_memory_store("test-secret-key-at-least-32-bytes-long", dir);
        config.store.kind = StoreKind::Postgres;
        AppState::new(config)
    }

    #[tokio::test]
    async fn test_unparseable_config_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let result = configure(
            State(postgres_state(dir.path())),
            HeaderMap::new(),
            Json(ConfigureRequest {
                config: "không phải cấu hình".to_string(),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_missing_database_url_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let result = configure(
            State(postgres_state(dir.path())),
            HeaderMap::new(),
            Json(ConfigureRequest {
                config: "{ projectName: 'demo' }".to_string(),
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_reset_returns_to_setup_mode() {
        let dir = tempfile::tempdir().unwrap();
        let state = postgres_state(dir.path());
        let gateway = Arc::new(MemoryGateway::new());
        let boss = User::founder("Công ty ABC", "Trần Văn B", "giamdoc", "hash".to_string());
        gateway.register_company(&boss).await.unwrap();
        state.install_gateway(gateway).await;

        let pair = jwt::issue_token_pair(boss.id, boss.company_id, state.jwt_secret()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {}", pair.access_token).parse().unwrap(),
        );

        assert_eq!(
            reset(State(state.clone()), headers).await.unwrap(),
            StatusCode::NO_CONTENT
        );
        let Json(status) = setup_status(State(state)).await.unwrap();
        assert!(!status.configured);
    }

    #[tokio::test]
    async fn test_reset_without_token_keeps_store() {
        let dir = tempfile::tempdir().unwrap();
        let state = postgres_state(dir.path());
        state.install_gateway(Arc::new(MemoryGateway::new())).await;

        let result = reset(State(state.clone()), HeaderMap::new()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
        assert!(state.is_configured().await);
    }

    #[tokio::test]
    async fn test_configure_without_token_once_configured() {
        let dir = tempfile::tempdir().unwrap();
        let state = postgres_state(dir.path());
        state.install_gateway(Arc::new(MemoryGateway::new())).await;

        let result = configure(
            State(state.clone()),
            HeaderMap::new(),
            Json(ConfigureRequest {
                config: "{ databaseUrl: 'postgres://attacker/db' }".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
        assert!(state.is_configured().await);
    }
}
