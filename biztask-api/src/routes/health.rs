/// Health check endpoint
///
/// Reports whether the server runs and whether the document store answers.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "store": "connected",
///   "pool": { "activeConnections": 1, "idleConnections": 1, "totalConnections": 2 }
/// }
/// ```
///
/// `pool` is present only for PostgreSQL.
///
/// `store` is `connected`, `disconnected` or `setup_required`. Anything but
/// `connected` reports `status: degraded`.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use biztask_shared::db::pool::PoolStats;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Document store status
    pub store: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let (store_status, pool) = match state.gateway().await {
        Ok(gateway) => {
            let status = match gateway.ping().await {
                Ok(()) => "connected",
                Err(e) => {
                    tracing::warn!(error = %e, "Store ping failed");
                    "disconnected"
                }
            };
            (status, gateway.pool_stats())
        }
        Err(_) => ("setup_required", None),
    };

    Ok(Json(HealthResponse {
        status: if store_status == "connected" {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: store_status.to_string(),
        pool,
    }))
}
