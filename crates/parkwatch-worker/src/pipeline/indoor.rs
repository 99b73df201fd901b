//! Indoor occupancy pipeline.

use std::sync::Arc;

use parkwatch_models::{CameraId, DetectionEvent, OccupancyUpdate};
use parkwatch_vision::{Frame, OccupancyScorer, SlotStateTable};

use super::{CameraPipeline, FrameOutput};

/// Scores a camera's slots each frame and reports flips as occupancy events.
pub struct IndoorPipeline {
    scorer: OccupancyScorer,
    slot_table: Arc<SlotStateTable>,
    total_slots: u32,
}

impl IndoorPipeline {
    pub fn new(scorer: OccupancyScorer, slot_table: Arc<SlotStateTable>, total_slots: u32) -> Self {
        Self {
            scorer,
            slot_table,
            total_slots,
        }
    }

    pub fn camera_id(&self) -> CameraId {
        self.scorer.camera_id()
    }

    pub fn slot_count(&self) -> usize {
        self.scorer.rois().len()
    }
}

impl CameraPipeline for IndoorPipeline {
    fn process(&mut self, frame: &Frame) -> FrameOutput {
        let changes = self.scorer.apply(frame, &self.slot_table);
        if changes.is_empty() {
            return FrameOutput::default();
        }

        let summary = self.slot_table.summary(self.total_slots);
        let update = OccupancyUpdate {
            total: summary.total,
            occupied: summary.occupied,
            available: summary.available,
            changes,
        };
        FrameOutput {
            events: vec![DetectionEvent::occupancy(self.camera_id(), update).with_timestamp(frame.captured_at())],
            detected: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use parkwatch_models::{BoundingBox, EventPayload, SlotId, SlotRoi, VehicleType};
    use parkwatch_vision::occupancy::OccupancyScorerConfig;

    fn roi(slot: u32, x: i32) -> SlotRoi {
        SlotRoi {
            slot_id: SlotId(slot),
            slot_code: format!("A-C-{:02}", slot),
            bbox: BoundingBox::new(x, 16, 32, 32),
            vehicle_type: VehicleType::Car,
            camera_id: CameraId(3),
        }
    }

    fn lot(parked: bool) -> Frame {
        let mut img = RgbImage::from_pixel(128, 64, Rgb([128, 128, 128]));
        if parked {
            for x in 8..40 {
                for y in 16..48 {
                    let v = if ((x / 8) + (y / 8)) % 2 == 0 { 255 } else { 0 };
                    img.put_pixel(x, y, Rgb([v, v, v]));
                }
            }
        }
        Frame::new(img)
    }

    #[test]
    fn test_reports_only_flips() {
        let table = Arc::new(SlotStateTable::new());
        let scorer = OccupancyScorer::new(CameraId(3), vec![roi(1, 8), roi(2, 72)], OccupancyScorerConfig::default());
        let mut pipeline = IndoorPipeline::new(scorer, table.clone(), 72);

        assert!(pipeline.process(&lot(false)).events.is_empty());

        let events = pipeline.process(&lot(true)).events;
        assert_eq!(events.len(), 1);
        match &events[0].payload {
            EventPayload::Occupancy(update) => {
                assert_eq!((update.total, update.occupied, update.available), (72, 1, 71));
                assert_eq!(update.changes.len(), 1);
                assert_eq!(update.changes[0].slot_id, SlotId(1));
            }
            other => panic!("unexpected payload: {other:?}"),
        }

        assert!(pipeline.process(&lot(true)).events.is_empty());
        assert_eq!(pipeline.slot_count(), 2);
    }
}
