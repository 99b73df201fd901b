//! Detection events handed from camera pipelines to the dispatcher.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::camera::{CameraId, CameraRole};
use crate::detection::{Point, VehicleType};
use crate::slot::SlotChange;

/// A vehicle seen at a gate camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSighting {
    pub vehicle_type: VehicleType,
    /// Cleaned plate text. Required for entry and exit dispatch.
    pub plate: Option<String>,
    pub vehicle_confidence: f32,
    pub plate_confidence: f32,
    pub position: Point,
    /// Encoded JPEG of the vehicle crop.
    #[serde(skip)]
    pub snapshot: Option<Vec<u8>>,
}

/// Occupancy counts plus the slots that changed on an indoor camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyUpdate {
    pub total: u32,
    pub occupied: u32,
    pub available: u32,
    pub changes: Vec<SlotChange>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Vehicle(VehicleSighting),
    Occupancy(OccupancyUpdate),
}

/// Unit of work for the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    pub camera_id: CameraId,
    pub role: CameraRole,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl DetectionEvent {
    pub fn vehicle(camera_id: CameraId, role: CameraRole, sighting: VehicleSighting) -> Self {
        Self {
            camera_id,
            role,
            timestamp: Utc::now(),
            payload: EventPayload::Vehicle(sighting),
        }
    }

    pub fn occupancy(camera_id: CameraId, update: OccupancyUpdate) -> Self {
        Self {
            camera_id,
            role: CameraRole::Indoor,
            timestamp: Utc::now(),
            payload: EventPayload::Occupancy(update),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Plate text carried by a vehicle event.
    pub fn plate(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Vehicle(sighting) => sighting.plate.as_deref(),
            EventPayload::Occupancy(_) => None,
        }
    }
}
