//! OCR client error types.

use thiserror::Error;

pub type OcrResult<T> = Result<T, OcrError>;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OcrError {
    pub fn is_retryable(&self) -> bool {
        match self {
            OcrError::ServiceUnavailable(_) => true,
            OcrError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
