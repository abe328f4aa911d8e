/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// The gateway slot starts empty when no store is configured. Every data
/// route then answers `503 setup_required` until `POST /v1/setup` installs a
/// gateway.
///
/// # Example
///
/// ```no_run
/// use biztask_api::{app::AppState, config::Config};
/// use biztask_shared::gateway::memory::MemoryGateway;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::new(config).with_gateway(Arc::new(MemoryGateway::new()));
/// let app = biztask_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError};
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post, put},
    Router,
};
use biztask_shared::auth::jwt;
use biztask_shared::calendar::ReportZone;
use biztask_shared::dictation::Transcriber;
use biztask_shared::gateway::Gateway;
use biztask_shared::settings::SettingsFile;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

/// Largest accepted request body; several inline images fit
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Caller identity injected by [`jwt_auth_layer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub company_id: Uuid,
}

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Installed gateway; `None` while the store is not configured
    gateway: Arc<RwLock<Option<Arc<dyn Gateway>>>>,

    /// Application configuration
    pub config: Arc<Config>,

    /// Speech-to-text backend, when an API key is configured
    pub transcriber: Option<Arc<dyn Transcriber>>,

    /// Calendar used by statistics and exports
    pub zone: ReportZone,

    /// Local store settings file
    pub settings: SettingsFile,
}

impl AppState {
    /// Creates state without a gateway (setup mode)
    pub fn new(config: Config) -> Self {
        let zone = ReportZone::from_offset_minutes(config.report.utc_offset_minutes);
        let settings = SettingsFile::new(&config.store.data_dir);

        Self {
            gateway: Arc::new(RwLock::new(None)),
            config: Arc::new(config),
            transcriber: None,
            zone,
            settings,
        }
    }

    pub fn with_gateway(self, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway: Arc::new(RwLock::new(Some(gateway))),
            ..self
        }
    }

    pub fn with_transcriber(self, transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            transcriber: Some(transcriber),
            ..self
        }
    }

    /// The installed gateway, or `setup_required`
    pub async fn gateway(&self) -> Result<Arc<dyn Gateway>, ApiError> {
        self.gateway.read().await.clone().ok_or_else(|| {
            ApiError::SetupRequired("Chưa cấu hình kết nối cơ sở dữ liệu".to_string())
        })
    }

    pub async fn is_configured(&self) -> bool {
        self.gateway.read().await.is_some()
    }

    /// Replaces the gateway after a successful setup
    pub async fn install_gateway(&self, gateway: Arc<dyn Gateway>) {
        let previous = self.gateway.write().await.replace(gateway);
        if let Some(gateway) = previous {
            gateway.close().await;
        }
    }

    /// Drops the gateway, returning to setup mode
    pub async fn clear_gateway(&self) {
        let previous = self.gateway.write().await.take();
        if let Some(gateway) = previous {
            gateway.close().await;
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                      # Health check (public)
/// └── /v1/
///     ├── /setup                   # GET status, POST configure, DELETE reset (director once configured)
///     ├── /auth/                   # register, login, refresh (public)
///     ├── /dashboard               # GET statistics
///     ├── /tasks                   # GET list, POST create
///     │   ├── /export              # GET xlsx
///     │   ├── /stream              # GET SSE snapshots
///     │   └── /:id                 # GET, PUT, DELETE, POST advance|complete|reassign
///     ├── /team                    # GET workload, /leaderboard, /:id/tasks
///     ├── /users                   # GET, POST, /import, /template, /:id, /:id/password
///     ├── /profile                 # GET, PUT /password, PUT /avatar
///     └── /dictation               # POST audio
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Body size limit (tower-http RequestBodyLimitLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let setup_routes = Router::new().route(
        "/",
        get(routes::setup::setup_status)
            .post(routes::setup::configure)
            .delete(routes::setup::reset),
    );

    // Auth routes (public, no auth required)
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh));

    let task_routes = Router::new()
        .route(
            "/",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route("/export", get(routes::tasks::export_tasks))
        .route("/stream", get(routes::tasks::stream_tasks))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:id/advance", post(routes::tasks::advance_task))
        .route("/:id/complete", post(routes::tasks::complete_task))
        .route("/:id/reassign", post(routes::tasks::reassign_task));

    let team_routes = Router::new()
        .route("/", get(routes::team::team_stats))
        .route("/leaderboard", get(routes::team::leaderboard))
        .route("/:id/tasks", get(routes::team::member_tasks));

    let user_routes = Router::new()
        .route("/", get(routes::users::list_users).post(routes::users::create_user))
        .route("/import", post(routes::users::import_users))
        .route("/template", get(routes::users::import_template))
        .route(
            "/:id",
            put(routes::users::update_user).delete(routes::users::delete_user),
        )
        .route("/:id/password", put(routes::users::reset_password));

    let profile_routes = Router::new()
        .route("/", get(routes::profile::get_profile))
        .route("/password", put(routes::profile::change_password))
        .route("/avatar", put(routes::profile::change_avatar));

    // Everything below requires a valid access token
    let protected_routes = Router::new()
        .route("/dashboard", get(routes::dashboard::dashboard))
        .nest("/tasks", task_routes)
        .nest("/team", team_routes)
        .nest("/users", user_routes)
        .nest("/profile", profile_routes)
        .route("/dictation", post(routes::dictation::dictate))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    // Build complete v1 API
    let v1_routes = Router::new()
        .nest("/setup", setup_routes)
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

/// Reads the bearer access token from request headers
///
/// # Errors
///
/// - `401 Unauthorized`: Header missing, token invalid or expired
/// - `400 Bad Request`: Header is not a `Bearer` token
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, ApiError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::BadRequest("Expected Bearer token".to_string()))?;

    let claims = jwt::validate_access_token(token, state.jwt_secret())?;

    Ok(AuthContext {
        user_id: claims.sub,
        company_id: claims.company_id,
    })
}

/// JWT authentication middleware layer
///
/// Validates the access token and injects [`AuthContext`] into request
/// extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = authenticate(&state, req.headers())?;
    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
