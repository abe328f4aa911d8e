/// Voice dictation
///
/// Recorded audio is sent to a speech-to-text model and the returned text is
/// merged into a task draft: it becomes the title when the title is still
/// empty, otherwise it is appended to the description.
///
/// The production transcriber is Gemini's `generateContent` endpoint with the
/// audio passed inline.

use crate::lifecycle::TaskDraft;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const DICTATION_PROMPT: &str = "Hãy nghe đoạn âm thanh này và chép lại chính xác những gì người nói \
đang nói thành văn bản tiếng Việt. Không thêm bớt, không phân tích, chỉ trả về nội dung văn bản \
thuần túy (Dictation).";

#[derive(Debug, thiserror::Error)]
pub enum DictationError {
    #[error("Chưa cấu hình khóa API cho nhận dạng giọng nói")]
    MissingApiKey,

    #[error("Không có dữ liệu âm thanh")]
    EmptyAudio,

    #[error("Thiếu định dạng âm thanh (MIME type)")]
    MissingMimeType,

    #[error("Transcription request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Transcription API returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

/// Speech-to-text backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Returns the dictated text, or `None` when nothing was recognised
    async fn transcribe(
        &self,
        audio_base64: &str,
        mime_type: &str,
    ) -> Result<Option<String>, DictationError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, trimmed; `None` when blank
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

/// Gemini `generateContent` client
#[derive(Debug, Clone)]
pub struct GeminiTranscriber {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiTranscriber {
    /// Fails with [`DictationError::MissingApiKey`] for a blank key
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Result<Self, DictationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DictationError::MissingApiKey);
        }

        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_key,
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Points the client at another endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

fn check_input(audio_base64: &str, mime_type: &str) -> Result<(), DictationError> {
    if audio_base64.trim().is_empty() {
        return Err(DictationError::EmptyAudio);
    }
    if mime_type.trim().is_empty() {
        return Err(DictationError::MissingMimeType);
    }
    Ok(())
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    async fn transcribe(
        &self,
        audio_base64: &str,
        mime_type: &str,
    ) -> Result<Option<String>, DictationError> {
        check_input(audio_base64, mime_type)?;

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    RequestPart::Inline {
                        inline_data: InlineData {
                            mime_type,
                            data: audio_base64,
                        },
                    },
                    RequestPart::Text {
                        text: DICTATION_PROMPT,
                    },
                ],
            }],
        };

        debug!(model = %self.model, mime_type, audio_len = audio_base64.len(), "Sending dictation audio");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(status, body = %body, "Transcription API error");
            return Err(DictationError::Upstream { status, body });
        }

        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed.text())
    }
}

/// Puts dictated text into the draft
///
/// Empty title: the text becomes the title. Otherwise it goes on a new line
/// at the end of the description.
pub fn merge_dictation(draft: &mut TaskDraft, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }

    if draft.title.trim().is_empty() {
        draft.title = text.to_string();
    } else if draft.description.is_empty() {
        draft.description = text.to_string();
    } else {
        draft.description.push('\n');
        draft.description.push_str(text);
    }
}
