//! Per-camera occupancy scorer.

use std::time::Instant;

use parkwatch_models::{CameraId, SlotChange, SlotId, SlotRoi};
use tracing::{debug, info};

use super::background::{clean_mask, BackgroundModel, BackgroundModelConfig};
use super::score::{measure_roi, EdgeThresholds, OccupancyWeights, RoiFeatures};
use super::state::SlotStateTable;
use crate::frame::Frame;
use crate::metrics;

#[derive(Debug, Clone)]
pub struct OccupancyScorerConfig {
    /// A slot is occupied when its score is strictly above this.
    pub threshold: f32,
    pub weights: OccupancyWeights,
    pub edges: EdgeThresholds,
    pub background: BackgroundModelConfig,
}

impl Default for OccupancyScorerConfig {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            weights: OccupancyWeights::default(),
            edges: EdgeThresholds::default(),
            background: BackgroundModelConfig::default(),
        }
    }
}

/// Score for one slot in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotReading {
    pub slot_id: SlotId,
    pub slot_code: String,
    pub score: f32,
    pub occupied: bool,
}

/// Scores one indoor camera's slots against its background model.
#[derive(Debug)]
pub struct OccupancyScorer {
    camera_id: CameraId,
    rois: Vec<SlotRoi>,
    background: BackgroundModel,
    config: OccupancyScorerConfig,
}

impl OccupancyScorer {
    pub fn new(camera_id: CameraId, rois: Vec<SlotRoi>, config: OccupancyScorerConfig) -> Self {
        Self {
            camera_id,
            rois,
            background: BackgroundModel::new(config.background.clone()),
            config,
        }
    }

    pub fn camera_id(&self) -> CameraId {
        self.camera_id
    }

    pub fn rois(&self) -> &[SlotRoi] {
        &self.rois
    }

    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    pub fn background(&self) -> &BackgroundModel {
        &self.background
    }

    /// Update the background model and score every ROI.
    pub fn score_frame(&mut self, frame: &Frame) -> Vec<SlotReading> {
        let started = Instant::now();
        let gray = frame.to_gray();
        let foreground = clean_mask(&self.background.apply(&gray));

        let readings = self
            .rois
            .iter()
            .map(|roi| {
                let features = measure_roi(frame.image(), &gray, &foreground, &roi.bbox, self.config.edges)
                    .unwrap_or_else(RoiFeatures::default);
                let score = self.config.weights.score(&features);
                SlotReading {
                    slot_id: roi.slot_id,
                    slot_code: roi.slot_code.clone(),
                    score,
                    occupied: score > self.config.threshold,
                }
            })
            .collect();

        metrics::record_scoring_latency(started.elapsed().as_secs_f64() * 1000.0);
        readings
    }

    /// Score `frame`, write results into `table` and return the slots whose
    /// occupied flag flipped.
    pub fn apply(&mut self, frame: &Frame, table: &SlotStateTable) -> Vec<SlotChange> {
        let readings = self.score_frame(frame);
        let mut changes = Vec::new();

        for reading in readings {
            if !table.update(reading.slot_id, reading.occupied, reading.score, frame.captured_at()) {
                continue;
            }

            info!(
                camera_id = %self.camera_id,
                slot_id = %reading.slot_id,
                slot_code = %reading.slot_code,
                score = reading.score,
                "Slot {} is now {}",
                reading.slot_code,
                if reading.occupied { "occupied" } else { "free" }
            );
            metrics::record_slot_change(reading.occupied);

            changes.push(SlotChange {
                slot_id: reading.slot_id,
                slot_code: reading.slot_code,
                occupied: reading.occupied,
                confidence: reading.score,
                timestamp: frame.captured_at(),
            });
        }

        debug!(camera_id = %self.camera_id, changes = changes.len(), "Occupancy pass complete");
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use parkwatch_models::{BoundingBox, VehicleType};

    fn roi(slot: u32, x: i32) -> SlotRoi {
        SlotRoi {
            slot_id: SlotId(slot),
            slot_code: format!("A-C-{:02}", slot),
            bbox: BoundingBox::new(x, 16, 32, 32),
            vehicle_type: VehicleType::Car,
            camera_id: CameraId(1),
        }
    }

    fn empty_lot() -> Frame {
        Frame::new(RgbImage::from_pixel(128, 64, Rgb([128, 128, 128])))
    }

    /// A high-contrast checkerboard parked over the first slot.
    fn parked_lot() -> Frame {
        let mut img = RgbImage::from_pixel(128, 64, Rgb([128, 128, 128]));
        for x in 8..40 {
            for y in 16..48 {
                let on = ((x / 8) + (y / 8)) % 2 == 0;
                let v = if on { 255 } else { 0 };
                img.put_pixel(x, y, Rgb([v, v, v]));
            }
        }
        Frame::new(img)
    }

    fn scorer() -> OccupancyScorer {
        OccupancyScorer::new(CameraId(1), vec![roi(1, 8), roi(2, 72)], OccupancyScorerConfig::default())
    }

    #[test]
    fn test_empty_lot_scores_zero() {
        let mut scorer = scorer();
        let readings = scorer.score_frame(&empty_lot());
        assert_eq!(readings.len(), 2);
        assert!(readings.iter().all(|r| r.score == 0.0 && !r.occupied));
    }

    #[test]
    fn test_parked_vehicle_flips_slot_once() {
        let mut scorer = scorer();
        let table = SlotStateTable::new();

        assert!(scorer.apply(&empty_lot(), &table).is_empty());

        let changes = scorer.apply(&parked_lot(), &table);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].slot_id, SlotId(1));
        assert!(changes[0].occupied);
        assert!(changes[0].confidence > 0.4);

        // Still parked: no further change events.
        assert!(scorer.apply(&parked_lot(), &table).is_empty());
        assert_eq!(table.occupied_count(), 1);
        assert!(!table.get(SlotId(2)).unwrap().occupied);
    }

    #[test]
    fn test_roi_outside_frame_scores_zero() {
        let mut scorer = OccupancyScorer::new(CameraId(1), vec![roi(9, 500)], OccupancyScorerConfig::default());
        let readings = scorer.score_frame(&parked_lot());
        assert_eq!(readings[0].score, 0.0);
    }
}
