/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - Router backed by a fresh in-memory gateway
/// - Scripted transcriber for dictation
/// - Company registration and login helpers
/// - JSON request helpers

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use biztask_api::app::{build_router, AppState};
use biztask_api::config::{Config, StoreKind};
use biztask_shared::dictation::{DictationError, Transcriber};
use biztask_shared::gateway::memory::MemoryGateway;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const JWT_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

/// Echoes a fixed sentence for any non-empty audio
pub struct ScriptedTranscriber(pub &'static str);

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(
        &self,
        audio_base64: &str,
        mime_type: &str,
    ) -> Result<Option<String>, DictationError> {
        if audio_base64.is_empty() {
            return Err(DictationError::EmptyAudio);
        }
        if mime_type.trim().is_empty() {
            return Err(DictationError::MissingMimeType);
        }
        Ok(Some(self.0.to_string()))
    }
}

/// Signed-in user as returned by register/login
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: Value,
}

impl Session {
    pub fn id(&self) -> String {
        self.user["id"].as_str().unwrap_or_default().to_string()
    }
}

/// Test context containing the router and its backing store
pub struct TestContext {
    pub app: Router,
    pub gateway: Arc<MemoryGateway>,
    _data_dir: tempfile::TempDir,
}

impl TestContext {
    /// Router with an in-memory store and a scripted transcriber
    pub fn new() -> Self {
        Self::build(StoreKind::Memory)
    }

    /// Router set up for PostgreSQL whose connected store is in memory
    ///
    /// Behaves like a server that already went through `POST /v1/setup`.
    pub fn configured_postgres() -> Self {
        Self::build(StoreKind::Postgres)
    }

    fn build(kind: StoreKind) -> Self {
        let data_dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(MemoryGateway::new());

        let mut config = Config::for_memory_store(JWT_SECRET, data_dir.path());
        config.store.kind = kind;

        let state = AppState::new(config)
            .with_gateway(gateway.clone())
            .with_transcriber(Arc::new(ScriptedTranscriber("Gửi báo giá cho khách")));

        Self {
            app: build_router(state),
            gateway,
            _data_dir: data_dir,
        }
    }

    /// Router without any store configured
    pub fn unconfigured() -> Router {
        let mut config = Config::for_memory_store(JWT_SECRET, std::env::temp_dir());
        config.store.kind = StoreKind::Postgres;
        build_router(AppState::new(config))
    }

    /// Sends a request and returns the status with the parsed JSON body
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        send_to(&self.app, request).await
    }

    /// Sends a raw text body, e.g. CSV
    pub async fn send_text(&self, uri: &str, token: &str, text: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "text/csv")
            .body(Body::from(text.to_string()))
            .unwrap();

        send_to(&self.app, request).await
    }

    /// Returns status, content type and raw bytes
    pub async fn download(&self, uri: &str, token: &str) -> (StatusCode, String, Vec<u8>) {
        let request = Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        (status, content_type, bytes.to_vec())
    }

    /// Registers a company and returns its director's session
    pub async fn register(&self, company: &str, username: &str) -> Session {
        let (status, body) = self
            .send(
                "POST",
                "/v1/auth/register",
                None,
                Some(json!({
                    "companyName": company,
                    "name": "Giám đốc",
                    "username": username,
                    "password": "matkhau",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register failed: {}", body);
        session_from(body)
    }

    pub async fn login(&self, company: &str, username: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/v1/auth/login",
            None,
            Some(json!({
                "companyName": company,
                "username": username,
                "password": password,
            })),
        )
        .await
    }

    /// Adds a member through the API and signs them in
    pub async fn hire(&self, boss: &Session, company: &str, username: &str, role: &str) -> Session {
        let (status, body) = self
            .send(
                "POST",
                "/v1/users",
                Some(&boss.token),
                Some(json!({
                    "name": format!("Nhân sự {}", username),
                    "username": username,
                    "password": "123456",
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create user failed: {}", body);

        let (status, body) = self.login(company, username, "123456").await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        session_from(body)
    }

    /// Creates a task due in `due_in_days` and returns its JSON
    pub async fn create_task(
        &self,
        creator: &Session,
        title: &str,
        assignee: &Session,
        due_in_days: i64,
    ) -> Value {
        let due = chrono::Utc::now() + chrono::Duration::days(due_in_days);
        let (status, body) = self
            .send(
                "POST",
                "/v1/tasks",
                Some(&creator.token),
                Some(json!({
                    "title": title,
                    "description": "Chi tiết",
                    "assigneeId": assignee.id(),
                    "dueDate": due,
                    "priority": "HIGH",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create task failed: {}", body);
        body["task"].clone()
    }
}

pub fn session_from(body: Value) -> Session {
    Session {
        token: body["accessToken"].as_str().unwrap_or_default().to_string(),
        user: body["user"].clone(),
    }
}

pub async fn send_to(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}
