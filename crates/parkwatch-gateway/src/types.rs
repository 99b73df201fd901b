//! Backend request and response payloads.
//!
//! Requests are sent camelCase. Responses accept camelCase or snake_case.

use chrono::{DateTime, Utc};
use parkwatch_models::{SlotChange, VehicleType};
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Entry
// =============================================================================

/// `POST /entry`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRequest {
    pub plate: String,
    pub vehicle_type: VehicleType,
    pub timestamp: DateTime<Utc>,
    pub confidence: f32,
    /// Base64 JPEG snapshot of the vehicle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl EntryRequest {
    pub fn new(plate: impl Into<String>, vehicle_type: VehicleType, timestamp: DateTime<Utc>, confidence: f32) -> Self {
        Self {
            plate: plate.into(),
            vehicle_type,
            timestamp,
            confidence,
            image: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    /// Slot the backend assigned to the vehicle.
    #[serde(alias = "assigned_slot", deserialize_with = "string_or_number")]
    pub assigned_slot: String,
    #[serde(default, alias = "ticket_id")]
    pub ticket_id: Option<String>,
}

// =============================================================================
// Exit
// =============================================================================

/// `POST /exit/{plate}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitRequest {
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitResponse {
    #[serde(alias = "parking_duration_minutes")]
    pub parking_duration_minutes: i64,
}

// =============================================================================
// Occupancy
// =============================================================================

/// `POST /occupancy-update`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyUpdateRequest {
    pub total_spots: u32,
    pub occupied_spots: u32,
    pub available_spots: u32,
    pub changes: Vec<SlotChange>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OccupancyAck {
    #[serde(default = "default_ack")]
    pub ack: bool,
}

impl Default for OccupancyAck {
    fn default() -> Self {
        Self { ack: true }
    }
}

fn default_ack() -> bool {
    true
}

/// `GET /health`
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Int(i64),
    }

    Ok(match Repr::deserialize(deserializer)? {
        Repr::Text(s) => s,
        Repr::Int(n) => n.to_string(),
    })
}
