//! Error types for vision operations.

use thiserror::Error;

/// Result type for vision operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Errors raised by capture, detection, OCR and occupancy scoring.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Failed to open camera source {source_name}: {message}")]
    CameraOpen { source_name: String, message: String },

    #[error("Frame read failed: {0}")]
    FrameRead(String),

    #[error("Capture source released")]
    Released,

    #[error("Detection failed: {0}")]
    DetectionFailed(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Config load failed: {0}")]
    ConfigLoad(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VisionError {
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    pub fn model_load(message: impl Into<String>) -> Self {
        Self::ModelLoad(message.into())
    }

    pub fn camera_open(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CameraOpen {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn frame_read(message: impl Into<String>) -> Self {
        Self::FrameRead(message.into())
    }

    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    pub fn ocr_failed(message: impl Into<String>) -> Self {
        Self::OcrFailed(message.into())
    }

    pub fn config_load(message: impl Into<String>) -> Self {
        Self::ConfigLoad(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Errors that only affect the current frame.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VisionError::FrameRead(_) | VisionError::DetectionFailed(_) | VisionError::OcrFailed(_)
        )
    }
}
