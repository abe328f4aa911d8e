/// Image compression for attachments, completion proofs and avatars
///
/// Uploads are decoded, shrunk so the longest side is at most
/// [`MAX_DIMENSION`] pixels (never enlarged), re-encoded as JPEG and returned
/// as an inline `data:image/jpeg;base64,...` string small enough to live in a
/// stored document.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageError as DecodeError};
use serde::Serialize;
use tracing::{debug, warn};

/// Longest side of a stored image
pub const MAX_DIMENSION: u32 = 700;

/// JPEG quality (1-100)
pub const JPEG_QUALITY: u8 = 60;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Ảnh trống")]
    Empty,

    #[error("Không đọc được dữ liệu ảnh: {0}")]
    InvalidDataUrl(String),

    #[error("Không giải mã được ảnh: {0}")]
    Decode(#[source] DecodeError),

    #[error("Không nén được ảnh: {0}")]
    Encode(#[source] DecodeError),

    #[error("Image worker failed: {0}")]
    Worker(String),
}

/// Extracts the payload of a base64 `data:` URL
///
/// Bare base64 without the `data:` prefix is accepted as well.
pub fn decode_data_url(input: &str) -> Result<Vec<u8>, ImageError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ImageError::Empty);
    }

    let payload = match input.strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest
                .split_once(',')
                .ok_or_else(|| ImageError::InvalidDataUrl("missing ','".to_string()))?;
            if !meta.ends_with(";base64") {
                return Err(ImageError::InvalidDataUrl(
                    "only base64 data URLs are supported".to_string(),
                ));
            }
            data
        }
        None => input,
    };

    STANDARD
        .decode(payload)
        .map_err(|e| ImageError::InvalidDataUrl(e.to_string()))
}

fn constrain(img: DynamicImage) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width.max(height) <= MAX_DIMENSION {
        return img;
    }
    img.resize(MAX_DIMENSION, MAX_DIMENSION, FilterType::Triangle)
}

/// Decodes, shrinks and re-encodes an image as a JPEG data URL
///
/// CPU bound; async callers should go through [`compress_in_background`].
pub fn compress_image(bytes: &[u8]) -> Result<String, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }

    let img = image::load_from_memory(bytes).map_err(ImageError::Decode)?;
    let (src_w, src_h) = img.dimensions();
    let rgb = constrain(img).to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(ImageError::Encode)?;

    debug!(
        src_w,
        src_h,
        width = rgb.width(),
        height = rgb.height(),
        bytes = out.len(),
        "Compressed image"
    );

    Ok(format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(&out)))
}

/// [`compress_image`] for an uploaded `data:` URL or bare base64 string
pub fn compress_data_url(input: &str) -> Result<String, ImageError> {
    compress_image(&decode_data_url(input)?)
}

/// Runs [`compress_data_url`] on the blocking thread pool
pub async fn compress_in_background(input: String) -> Result<String, ImageError> {
    tokio::task::spawn_blocking(move || compress_data_url(&input))
        .await
        .map_err(|e| ImageError::Worker(e.to_string()))?
}

/// A single failed image in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFailure {
    /// Position in the submitted list
    pub index: usize,
    pub message: String,
}

/// Outcome of compressing several images
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// Compressed images, in submission order
    pub images: Vec<String>,
    pub failures: Vec<ImageFailure>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Compresses every image, collecting failures instead of stopping
pub async fn process_images(inputs: Vec<String>) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for (index, input) in inputs.into_iter().enumerate() {
        match compress_in_background(input).await {
            Ok(image) => outcome.images.push(image),
            Err(e) => {
                warn!(index, error = %e, "Image failed to compress");
                outcome.failures.push(ImageFailure {
                    index,
                    message: e.to_string(),
                });
            }
        }
    }

    outcome
}
