/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; library errors convert with `?`.
///
/// | Error                                   | Status | Code               |
/// |-----------------------------------------|--------|--------------------|
/// | store not configured, missing API key   | 503    | `setup_required`   |
/// | wrong company/login/password, bad token | 401    | `unauthorized`     |
/// | role does not allow the action          | 403    | `forbidden`        |
/// | document over 1 MiB                     | 413    | `payload_too_large`|
/// | undecodable image, empty audio          | 422    | `media_error`      |
/// | lifecycle violation, duplicate login    | 409    | `conflict`         |
/// | transcription upstream failure          | 502    | `bad_gateway`      |
/// | anything else from the store            | 500    | `internal_error`   |
///
/// # Example
///
/// ```ignore
/// use biztask_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::json;
///
/// async fn handler() -> ApiResult<Json<serde_json::Value>> {
///     let data = fetch_data().await?;
///     Ok(Json(json!({ "data": data })))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use biztask_shared::auth::jwt::JwtError;
use biztask_shared::auth::login::AuthError;
use biztask_shared::auth::password::PasswordError;
use biztask_shared::dictation::DictationError;
use biztask_shared::export::ExportError;
use biztask_shared::gateway::StoreError;
use biztask_shared::imaging::{ImageError, ImageFailure};
use biztask_shared::import::ImportError;
use biztask_shared::lifecycle::LifecycleError;
use biztask_shared::settings::SettingsError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Shown when a document would exceed the store's size limit
pub const TOO_LARGE_MESSAGE: &str =
    "Dữ liệu quá lớn (vượt quá 1MB). Vui lòng bỏ bớt ảnh đính kèm.";

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409)
    Conflict(String),

    /// Payload too large (413)
    PayloadTooLarge(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Unprocessable entity (422) - images or audio that could not be used
    MediaError {
        message: String,
        details: Option<Vec<ValidationErrorDetail>>,
    },

    /// Internal server error (500)
    InternalError(String),

    /// Bad gateway (502)
    BadGateway(String),

    /// Service unavailable (503) - store or integration not configured
    SetupRequired(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional per-field details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl ApiError {
    /// Rejects a request because some images failed to compress
    pub fn image_failures(failures: &[ImageFailure]) -> Self {
        ApiError::MediaError {
            message: format!(
                "{} ảnh không xử lý được. Gửi lại với proceedWithoutFailedImages để bỏ qua.",
                failures.len()
            ),
            details: Some(
                failures
                    .iter()
                    .map(|f| ValidationErrorDetail {
                        field: format!("attachments[{}]", f.index),
                        message: f.message.clone(),
                    })
                    .collect(),
            ),
        }
    }

    pub fn manager_only() -> Self {
        ApiError::Forbidden("Bạn không có quyền thực hiện thao tác này".to_string())
    }

    pub fn field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: field.to_string(),
            message: message.into(),
        }])
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::MediaError { message, .. } => write!(f, "Media error: {}", message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::BadGateway(msg) => write!(f, "Bad gateway: {}", msg),
            ApiError::SetupRequired(msg) => write!(f, "Setup required: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg, None)
            }
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::MediaError { message, details } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "media_error", message, details)
            }
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::BadGateway(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "bad_gateway",
                    "Dịch vụ nhận dạng giọng nói không phản hồi".to_string(),
                    None,
                )
            }
            ApiError::SetupRequired(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "setup_required", msg, None)
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert validator errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let errors: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();
        ApiError::ValidationError(errors)
    }
}

/// Convert store errors to API errors
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, .. } => {
                ApiError::NotFound(format!("{} not found", collection))
            }
            StoreError::WriteTooLarge { .. } => ApiError::PayloadTooLarge(TOO_LARGE_MESSAGE.to_string()),
            other => ApiError::InternalError(format!("Store error: {}", other)),
        }
    }
}

/// Convert login/registration errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AuthError::MissingFields => ApiError::BadRequest(err.to_string()),
            AuthError::UsernameTaken => ApiError::Conflict(err.to_string()),
            AuthError::WeakPassword(msg) => ApiError::field("password", msg),
            AuthError::Password(e) => e.into(),
            AuthError::Store(e) => e.into(),
        }
    }
}

/// Convert lifecycle violations to API errors
impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::MissingRequiredFields => ApiError::BadRequest(err.to_string()),
            other => ApiError::Conflict(other.to_string()),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            _ => ApiError::Unauthorized(format!("Invalid token: {}", err)),
        }
    }
}

impl From<ImageError> for ApiError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Worker(msg) => ApiError::InternalError(msg),
            other => ApiError::MediaError {
                message: other.to_string(),
                details: None,
            },
        }
    }
}

impl From<DictationError> for ApiError {
    fn from(err: DictationError) -> Self {
        match err {
            DictationError::MissingApiKey => ApiError::SetupRequired(err.to_string()),
            DictationError::EmptyAudio | DictationError::MissingMimeType => ApiError::MediaError {
                message: err.to_string(),
                details: None,
            },
            DictationError::Request(e) => ApiError::BadGateway(e.to_string()),
            DictationError::Upstream { status, body } => {
                ApiError::BadGateway(format!("status {}: {}", status, body))
            }
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::NoData => ApiError::BadRequest(err.to_string()),
            ExportError::Workbook(e) => ApiError::InternalError(format!("Export failed: {}", e)),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        ApiError::InternalError(format!("Import failed: {}", err))
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Io(e) => ApiError::InternalError(format!("Settings file: {}", e)),
            other => ApiError::SetupRequired(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biztask_shared::gateway::{Collection, MAX_DOCUMENT_BYTES};
    use uuid::Uuid;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("tasks not found".to_string());
        assert_eq!(err.to_string(), "Not found: tasks not found");
    }

    #[test]
    fn test_validation_error() {
        let errors = vec![
            ValidationErrorDetail {
                field: "title".to_string(),
                message: "Required".to_string(),
            },
            ValidationErrorDetail {
                field: "password".to_string(),
                message: "Too long".to_string(),
            },
        ];

        let err = ApiError::ValidationError(errors);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");
    }

    #[test]
    fn test_status_mapping() {
        let too_large: ApiError = StoreError::WriteTooLarge {
            size: MAX_DOCUMENT_BYTES + 1,
            limit: MAX_DOCUMENT_BYTES,
        }
        .into();
        assert_eq!(too_large.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);

        let missing: ApiError = StoreError::NotFound {
            collection: Collection::Tasks,
            id: Uuid::new_v4(),
        }
        .into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let conflict: ApiError = LifecycleError::AlreadyCompleted.into();
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let setup: ApiError = DictationError::MissingApiKey.into();
        assert_eq!(setup.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let media: ApiError = ImageError::Empty.into();
        assert_eq!(media.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

        let login: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(login.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_image_failures_list_each_index() {
        let err = ApiError::image_failures(&[ImageFailure {
            index: 2,
            message: "bad".to_string(),
        }]);
        match err {
            ApiError::MediaError { details: Some(details), .. } => {
                assert_eq!(details[0].field, "attachments[2]");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
