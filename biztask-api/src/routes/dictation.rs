/// Voice dictation endpoint
///
/// ```text
/// POST /v1/dictation
///
/// {
///   "audioBase64": "GkXfo59ChoEBQveBAULygQRC84EIQoKEd2VibUKHgQRChYECGFOAZwH…",
///   "mimeType": "audio/webm",
///   "title": "",
///   "description": ""
/// }
/// ```
///
/// The response echoes the form fields with the recognised text merged in.

use crate::{
    app::{AppState, AuthContext},
    error::ApiResult,
    routes::Caller,
};
use axum::{extract::State, Extension, Json};
use biztask_shared::{
    dictation::{merge_dictation, DictationError},
    lifecycle::TaskDraft,
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictationRequest {
    pub audio_base64: String,
    pub mime_type: String,

    /// Current form title
    #[serde(default)]
    pub title: String,

    /// Current form description
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DictationResponse {
    /// `None` when nothing was recognised
    pub text: Option<String>,
    pub title: String,
    pub description: String,
}

/// # Errors
///
/// - `422 Unprocessable Entity`: Empty audio or missing MIME type
/// - `502 Bad Gateway`: Transcription API failed
/// - `503 Service Unavailable`: No API key configured
pub async fn dictate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<DictationRequest>,
) -> ApiResult<Json<DictationResponse>> {
    let caller = Caller::resolve(&state, auth).await?;
    let transcriber = state
        .transcriber
        .as_ref()
        .ok_or(DictationError::MissingApiKey)?;

    let text = transcriber
        .transcribe(&req.audio_base64, &req.mime_type)
        .await?;

    let mut draft = TaskDraft {
        title: req.title,
        description: req.description,
        ..Default::default()
    };
    if let Some(text) = &text {
        merge_dictation(&mut draft, text);
    }

    info!(
        user_id = %caller.user.id,
        recognised = text.is_some(),
        "Dictation processed"
    );

    Ok(Json(DictationResponse {
        text,
        title: draft.title,
        description: draft.description,
    }))
}
