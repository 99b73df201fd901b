//! Entry and exit gate pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parkwatch_models::{CameraId, CameraRole, CameraStream, Detection, DetectionEvent, VehicleSighting};
use parkwatch_vision::{Frame, PlateReader, VehiclePipeline};
use tracing::{debug, info};

use super::{CameraPipeline, FrameOutput};
use crate::dispatcher::encode_snapshot;

/// Remembers the last accepted plate and drops identical reads within a window.
#[derive(Debug, Clone)]
pub struct DuplicateSuppressor {
    window: Duration,
    last: Option<(String, DateTime<Utc>)>,
}

impl DuplicateSuppressor {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Returns false for a repeat of the last plate inside the window.
    /// Suppressed reads do not extend the window.
    pub fn admit(&mut self, plate: &str, at: DateTime<Utc>) -> bool {
        if let Some((last_plate, last_at)) = &self.last {
            let elapsed = (at - *last_at).to_std().unwrap_or(Duration::ZERO);
            if last_plate == plate && elapsed < self.window {
                return false;
            }
        }
        self.last = Some((plate.to_string(), at));
        true
    }
}

/// Vehicle detection, plate reading and sighting events for a gate camera.
///
/// Entry cameras use the multi-attempt plate read and suppress repeated
/// plates; exit cameras take a single read.
pub struct GatePipeline {
    camera_id: CameraId,
    role: CameraRole,
    vehicles: VehiclePipeline,
    plates: Arc<PlateReader>,
    duplicates: Option<DuplicateSuppressor>,
    attach_snapshots: bool,
}

impl GatePipeline {
    pub fn new(
        camera: &CameraStream,
        vehicles: VehiclePipeline,
        plates: Arc<PlateReader>,
        duplicate_window: Duration,
        attach_snapshots: bool,
    ) -> Self {
        let duplicates = (camera.role == CameraRole::Entry).then(|| DuplicateSuppressor::new(duplicate_window));
        Self {
            camera_id: camera.id,
            role: camera.role,
            vehicles,
            plates,
            duplicates,
            attach_snapshots,
        }
    }

    fn sighting(&mut self, frame: &Frame, detection: &Detection) -> Option<VehicleSighting> {
        let reading = if self.role == CameraRole::Entry {
            self.plates.extract_plate_thorough(frame, &detection.bbox)
        } else {
            self.plates.extract_plate(frame, &detection.bbox)
        };

        if let (Some(reading), Some(duplicates)) = (&reading, self.duplicates.as_mut()) {
            if !duplicates.admit(&reading.text, reading.timestamp) {
                debug!(camera_id = %self.camera_id, plate = %reading.text, "Skipping duplicate plate");
                return None;
            }
        }

        if let Some(reading) = &reading {
            info!(
                camera_id = %self.camera_id,
                plate = %reading.text,
                confidence = reading.confidence,
                vehicle_type = %detection.vehicle_type,
                "License plate read"
            );
        }

        let snapshot = if self.attach_snapshots {
            frame.crop(&detection.bbox).and_then(|(_, crop)| encode_snapshot(&crop))
        } else {
            None
        };

        Some(VehicleSighting {
            vehicle_type: detection.vehicle_type,
            plate_confidence: reading.as_ref().map(|r| r.confidence).unwrap_or(0.0),
            plate: reading.map(|r| r.text),
            vehicle_confidence: detection.confidence,
            position: detection.center,
            snapshot,
        })
    }
}

impl CameraPipeline for GatePipeline {
    fn process(&mut self, frame: &Frame) -> FrameOutput {
        let detections = self.vehicles.detect_vehicles(frame);
        if detections.is_empty() {
            return FrameOutput::default();
        }

        let mut events = Vec::with_capacity(detections.len());
        for detection in &detections {
            if let Some(sighting) = self.sighting(frame, detection) {
                events.push(
                    DetectionEvent::vehicle(self.camera_id, self.role, sighting).with_timestamp(frame.captured_at()),
                );
            }
        }

        FrameOutput { events, detected: true }
    }
}
