//! Service configuration.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parkwatch_models::CameraStream;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{WorkerError, WorkerResult};

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// OCR sidecar base URL; plate reading is disabled when unset
    pub ocr_service_url: Option<String>,
    /// YOLOv8 vehicle model
    pub vehicle_model_path: Option<PathBuf>,
    /// YOLOv8 plate-region model
    pub plate_model_path: Option<PathBuf>,
    /// Minimum detector confidence for a vehicle
    pub vehicle_confidence_threshold: f32,
    /// Minimum plate confidence for an entry event
    pub plate_confidence_threshold: f32,
    /// Rate-limit window per (role, plate)
    pub event_cooldown: Duration,
    /// Entry pipeline duplicate-plate window
    pub duplicate_window: Duration,
    /// Slot occupied when score is above this
    pub occupancy_threshold: f32,
    /// Camera configuration document
    pub cameras_config: Option<PathBuf>,
    /// ROI configuration document
    pub roi_config: Option<PathBuf>,
    pub frame_width: u32,
    pub frame_height: u32,
    /// `ffmpeg` or, with the `opencv` feature, `opencv`
    pub frame_source: String,
    pub ffmpeg_path: String,
    /// How long `stop` waits for a worker before releasing its source
    pub stop_timeout: Duration,
    /// Status server bind address
    pub status_addr: SocketAddr,
    /// Send a JPEG of the vehicle with entry registrations
    pub attach_snapshots: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            ocr_service_url: None,
            vehicle_model_path: None,
            plate_model_path: None,
            vehicle_confidence_threshold: 0.5,
            plate_confidence_threshold: 0.7,
            event_cooldown: Duration::from_secs(5),
            duplicate_window: Duration::from_secs(10),
            occupancy_threshold: 0.4,
            cameras_config: None,
            roi_config: None,
            frame_width: 1280,
            frame_height: 720,
            frame_source: "ffmpeg".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            stop_timeout: Duration::from_millis(2000),
            status_addr: SocketAddr::from(([0, 0, 0, 0], 8090)),
            attach_snapshots: false,
        }
    }
}

impl ServiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ocr_service_url: non_empty("OCR_SERVICE_URL"),
            vehicle_model_path: non_empty("VEHICLE_MODEL_PATH").map(PathBuf::from),
            plate_model_path: non_empty("PLATE_MODEL_PATH").map(PathBuf::from),
            vehicle_confidence_threshold: std::env::var("VEHICLE_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.vehicle_confidence_threshold),
            plate_confidence_threshold: std::env::var("PLATE_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.plate_confidence_threshold),
            event_cooldown: Duration::from_secs(
                std::env::var("EVENT_COOLDOWN_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
            duplicate_window: Duration::from_secs(
                std::env::var("DUPLICATE_WINDOW_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            occupancy_threshold: std::env::var("OCCUPANCY_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.occupancy_threshold),
            cameras_config: non_empty("CAMERAS_CONFIG").map(PathBuf::from),
            roi_config: non_empty("ROI_CONFIG").map(PathBuf::from),
            frame_width: std::env::var("FRAME_WIDTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.frame_width),
            frame_height: std::env::var("FRAME_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.frame_height),
            frame_source: std::env::var("FRAME_SOURCE")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.frame_source),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            stop_timeout: Duration::from_millis(
                std::env::var("STOP_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            status_addr: std::env::var("STATUS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.status_addr),
            attach_snapshots: std::env::var("ATTACH_SNAPSHOTS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// =============================================================================
// Camera configuration document
// =============================================================================

/// `{"cameras": [{id, code, role, source, fps, active, floor}]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraConfigDocument {
    pub cameras: Vec<CameraStream>,
}

impl CameraConfigDocument {
    pub fn from_json(json: &str) -> WorkerResult<Self> {
        let document: Self =
            serde_json::from_str(json).map_err(|e| WorkerError::config_error(format!("Invalid camera document: {}", e)))?;

        let mut seen = HashSet::new();
        for camera in &document.cameras {
            if !seen.insert(camera.id) {
                return Err(WorkerError::config_error(format!("Duplicate camera id {}", camera.id)));
            }
        }
        Ok(document)
    }
}

/// Load camera definitions from a JSON document.
pub fn load_cameras_config(path: impl AsRef<Path>) -> WorkerResult<Vec<CameraStream>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .map_err(|e| WorkerError::config_error(format!("Failed to read {}: {}", path.display(), e)))?;
    let document = CameraConfigDocument::from_json(&json)?;

    info!(path = %path.display(), cameras = document.cameras.len(), "Camera configuration loaded");
    Ok(document.cameras)
}
