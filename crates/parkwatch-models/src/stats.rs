//! Status and statistics snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::camera::{CameraId, CameraRole};

/// Per-camera status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatus {
    pub id: CameraId,
    pub code: String,
    pub role: CameraRole,
    pub active: bool,
    pub running: bool,
    pub frames_processed: u64,
    pub last_detection_time: Option<DateTime<Utc>>,
}

/// Supervisor-wide counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_cameras: usize,
    pub active_cameras: usize,
    pub running_cameras: usize,
    pub total_frames_processed: u64,
}

/// Detection and dispatch outcome counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceStats {
    pub total_detections: u64,
    pub successful_entries: u64,
    pub successful_exits: u64,
    pub failed_detections: u64,
    pub since_reset: DateTime<Utc>,
}
