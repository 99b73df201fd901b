//! Parking slots, their regions of interest and occupancy state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::camera::{CameraId, Floor};
use crate::detection::{BoundingBox, VehicleType};

/// Globally unique slot identifier.
///
/// Composed as `floor offset + vehicle type offset + slot number`, so
/// `A-C-01` is 1, `A-B-01` is 101 and `B-C-01` is 1001.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u32);

impl SlotId {
    pub fn compose(floor: Floor, vehicle_type: VehicleType, number: u32) -> Self {
        Self(floor.slot_offset() + vehicle_type.slot_offset() + number)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable slot code, e.g. `A-C-07`.
pub fn slot_code(floor: Floor, vehicle_type: VehicleType, number: u32) -> String {
    format!("{}-{}-{:02}", floor, vehicle_type.code(), number)
}

/// Region of a camera frame covering one parking slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRoi {
    pub slot_id: SlotId,
    pub slot_code: String,
    pub bbox: BoundingBox,
    pub vehicle_type: VehicleType,
    pub camera_id: CameraId,
}

/// Live occupancy state of a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotState {
    pub slot_id: SlotId,
    pub occupied: bool,
    pub confidence: f32,
    pub plate: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A slot whose occupied flag flipped during a scoring pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotChange {
    pub slot_id: SlotId,
    pub slot_code: String,
    pub occupied: bool,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

/// Facility-wide slot counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancySummary {
    pub total: u32,
    pub occupied: u32,
    pub available: u32,
}

impl OccupancySummary {
    pub fn new(total: u32, occupied: u32) -> Self {
        let occupied = occupied.min(total);
        Self {
            total,
            occupied,
            available: total - occupied,
        }
    }
}
