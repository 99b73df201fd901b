//! Worker error types.

use parkwatch_models::CameraId;
use parkwatch_vision::VisionError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Unknown camera: {0}")]
    UnknownCamera(CameraId),

    #[error("Camera already registered: {0}")]
    AlreadyRegistered(CameraId),

    #[error("Failed to open camera {camera}: {source}")]
    CameraOpen {
        camera: String,
        #[source]
        source: VisionError,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn camera_open(camera: impl Into<String>, source: VisionError) -> Self {
        Self::CameraOpen {
            camera: camera.into(),
            source,
        }
    }

    /// Whether trying the same operation again later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::CameraOpen { .. } | WorkerError::Io(_) => true,
            WorkerError::Vision(e) => e.is_transient(),
            _ => false,
        }
    }
}
