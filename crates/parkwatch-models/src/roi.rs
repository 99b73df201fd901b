//! ROI configuration document.
//!
//! The on-disk shape is
//! `{cameras: [{cameraId, slots: [{slotId, slotCode, coordinates: [x, y, w, h], vehicleType}]}]}`.
//! Snake-case keys are accepted on input.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::camera::CameraId;
use crate::detection::{BoundingBox, VehicleType};
use crate::slot::{SlotId, SlotRoi};

#[derive(Debug, Error)]
pub enum RoiDocumentError {
    #[error("duplicate slot id {0} in ROI document")]
    DuplicateSlot(SlotId),

    #[error("slot {slot_code} has an empty region")]
    EmptyRegion { slot_code: String },

    #[error("invalid ROI document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRoiEntry {
    #[serde(alias = "slot_id")]
    pub slot_id: SlotId,
    #[serde(alias = "slot_code")]
    pub slot_code: String,
    pub coordinates: [i32; 4],
    #[serde(alias = "vehicle_type")]
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRoiEntry {
    #[serde(alias = "camera_id")]
    pub camera_id: CameraId,
    pub slots: Vec<SlotRoiEntry>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RoiDocument {
    pub cameras: Vec<CameraRoiEntry>,
}

impl RoiDocument {
    /// Group ROIs by camera, ordered by camera id.
    pub fn from_rois(rois: &[SlotRoi]) -> Self {
        let mut grouped: BTreeMap<CameraId, Vec<SlotRoiEntry>> = BTreeMap::new();
        for roi in rois {
            grouped.entry(roi.camera_id).or_default().push(SlotRoiEntry {
                slot_id: roi.slot_id,
                slot_code: roi.slot_code.clone(),
                coordinates: [roi.bbox.x, roi.bbox.y, roi.bbox.width, roi.bbox.height],
                vehicle_type: roi.vehicle_type,
            });
        }

        Self {
            cameras: grouped
                .into_iter()
                .map(|(camera_id, slots)| CameraRoiEntry { camera_id, slots })
                .collect(),
        }
    }

    /// Flatten into ROIs, rejecting duplicate slot ids and empty regions.
    pub fn into_rois(self) -> Result<Vec<SlotRoi>, RoiDocumentError> {
        let mut seen = HashSet::new();
        let mut rois = Vec::new();

        for camera in self.cameras {
            for slot in camera.slots {
                if !seen.insert(slot.slot_id) {
                    return Err(RoiDocumentError::DuplicateSlot(slot.slot_id));
                }
                let [x, y, width, height] = slot.coordinates;
                let bbox = BoundingBox::new(x, y, width, height);
                if bbox.is_empty() {
                    return Err(RoiDocumentError::EmptyRegion {
                        slot_code: slot.slot_code,
                    });
                }
                rois.push(SlotRoi {
                    slot_id: slot.slot_id,
                    slot_code: slot.slot_code,
                    bbox,
                    vehicle_type: slot.vehicle_type,
                    camera_id: camera.camera_id,
                });
            }
        }

        Ok(rois)
    }

    pub fn from_json(json: &str) -> Result<Self, RoiDocumentError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, RoiDocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn slot_count(&self) -> usize {
        self.cameras.iter().map(|c| c.slots.len()).sum()
    }
}
