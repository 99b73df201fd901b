//! Structured per-camera logging.

use parkwatch_models::{CameraId, CameraRole, CameraStream};
use tracing::{error, info, warn, Span};

/// Camera lifecycle logger with consistent contextual fields.
#[derive(Debug, Clone)]
pub struct CameraLogger {
    camera_id: CameraId,
    camera_code: String,
    role: CameraRole,
}

impl CameraLogger {
    pub fn new(camera: &CameraStream) -> Self {
        Self {
            camera_id: camera.id,
            camera_code: camera.code.clone(),
            role: camera.role,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            camera_id = %self.camera_id,
            camera_code = %self.camera_code,
            role = %self.role,
            "Camera started: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            camera_id = %self.camera_id,
            camera_code = %self.camera_code,
            role = %self.role,
            "Camera warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            camera_id = %self.camera_id,
            camera_code = %self.camera_code,
            role = %self.role,
            "Camera error: {}", message
        );
    }

    pub fn log_stop(&self, message: &str) {
        info!(
            camera_id = %self.camera_id,
            camera_code = %self.camera_code,
            role = %self.role,
            "Camera stopped: {}", message
        );
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn camera_code(&self) -> &str {
        &self.camera_code
    }

    /// Span entered by the camera's worker thread.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "camera",
            camera_id = %self.camera_id,
            camera_code = %self.camera_code,
            role = %self.role
        )
    }
}
