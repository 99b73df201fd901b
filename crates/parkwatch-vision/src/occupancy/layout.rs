//! Deterministic slot ROI layout and ROI document persistence.

use std::path::Path;

use parkwatch_models::{slot_code, BoundingBox, CameraId, Floor, RoiDocument, SlotId, SlotRoi, VehicleType};
use tracing::info;

use crate::error::{VisionError, VisionResult};

/// Slot grid within one camera view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotGrid {
    pub slots_per_camera: u32,
    pub columns: u32,
    pub slot_width: i32,
    pub slot_height: i32,
    pub start_x: i32,
    pub start_y: i32,
    /// Horizontal distance between slot origins.
    pub column_spacing: i32,
    /// Vertical distance between row origins.
    pub row_pitch: i32,
}

impl SlotGrid {
    /// Four car slots in a single row.
    pub fn cars() -> Self {
        Self {
            slots_per_camera: 4,
            columns: 4,
            slot_width: 120,
            slot_height: 200,
            start_x: 50,
            start_y: 100,
            column_spacing: 130,
            row_pitch: 220,
        }
    }

    /// Eight bike slots in two rows of four.
    pub fn bikes() -> Self {
        Self {
            slots_per_camera: 8,
            columns: 4,
            slot_width: 60,
            slot_height: 120,
            start_x: 30,
            start_y: 80,
            column_spacing: 70,
            row_pitch: 140,
        }
    }

    fn slot_rect(&self, index: u32) -> BoundingBox {
        let columns = self.columns.max(1);
        let row = (index / columns) as i32;
        let col = (index % columns) as i32;
        BoundingBox::new(
            self.start_x + col * self.column_spacing,
            self.start_y + row * self.row_pitch,
            self.slot_width,
            self.slot_height,
        )
    }
}

/// Facility layout: per floor, car cameras then bike cameras, with camera
/// ids assigned sequentially across floors.
#[derive(Debug, Clone, PartialEq)]
pub struct RoiLayout {
    pub floors: Vec<Floor>,
    pub car_cameras_per_floor: u32,
    pub bike_cameras_per_floor: u32,
    pub car_grid: SlotGrid,
    pub bike_grid: SlotGrid,
    pub first_camera_id: u32,
}

impl Default for RoiLayout {
    fn default() -> Self {
        Self {
            floors: Floor::ALL.to_vec(),
            car_cameras_per_floor: 5,
            bike_cameras_per_floor: 2,
            car_grid: SlotGrid::cars(),
            bike_grid: SlotGrid::bikes(),
            first_camera_id: 1,
        }
    }
}

impl RoiLayout {
    pub fn with_first_camera_id(mut self, first_camera_id: u32) -> Self {
        self.first_camera_id = first_camera_id;
        self
    }

    pub fn generate(&self) -> Vec<SlotRoi> {
        let mut rois = Vec::new();
        let mut camera_id = self.first_camera_id;

        for &floor in &self.floors {
            for (vehicle_type, cameras, grid) in [
                (VehicleType::Car, self.car_cameras_per_floor, &self.car_grid),
                (VehicleType::Bike, self.bike_cameras_per_floor, &self.bike_grid),
            ] {
                for camera_index in 0..cameras {
                    for slot_index in 0..grid.slots_per_camera {
                        let number = camera_index * grid.slots_per_camera + slot_index + 1;
                        rois.push(SlotRoi {
                            slot_id: SlotId::compose(floor, vehicle_type, number),
                            slot_code: slot_code(floor, vehicle_type, number),
                            bbox: grid.slot_rect(slot_index),
                            vehicle_type,
                            camera_id: CameraId(camera_id),
                        });
                    }
                    camera_id += 1;
                }
            }
        }

        rois
    }
}

/// ROIs owned by one camera.
pub fn rois_for_camera(rois: &[SlotRoi], camera_id: CameraId) -> Vec<SlotRoi> {
    rois.iter().filter(|r| r.camera_id == camera_id).cloned().collect()
}

/// Load ROIs from a JSON document.
pub fn load_roi_config(path: impl AsRef<Path>) -> VisionResult<Vec<SlotRoi>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .map_err(|e| VisionError::config_load(format!("Failed to read {}: {}", path.display(), e)))?;

    let rois = RoiDocument::from_json(&json)
        .and_then(RoiDocument::into_rois)
        .map_err(|e| VisionError::config_load(format!("{}: {}", path.display(), e)))?;

    info!(path = %path.display(), slots = rois.len(), "ROI configuration loaded");
    Ok(rois)
}

/// Save ROIs as a JSON document.
pub fn save_roi_config(path: impl AsRef<Path>, rois: &[SlotRoi]) -> VisionResult<()> {
    let path = path.as_ref();
    let json = RoiDocument::from_rois(rois)
        .to_json_pretty()
        .map_err(|e| VisionError::internal(e.to_string()))?;
    std::fs::write(path, json)?;

    info!(path = %path.display(), slots = rois.len(), "ROI configuration saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_layout_counts() {
        let rois = RoiLayout::default().generate();
        assert_eq!(rois.len(), 72);
        let cars = rois.iter().filter(|r| r.vehicle_type == VehicleType::Car).count();
        assert_eq!(cars, 40);
        let cameras: HashSet<_> = rois.iter().map(|r| r.camera_id).collect();
        assert_eq!(cameras.len(), 14);
    }

    #[test]
    fn test_slot_ids_and_codes_distinct() {
        let rois = RoiLayout::default().generate();
        let ids: HashSet<_> = rois.iter().map(|r| r.slot_id).collect();
        let codes: HashSet<_> = rois.iter().map(|r| r.slot_code.clone()).collect();
        assert_eq!(ids.len(), rois.len());
        assert_eq!(codes.len(), rois.len());
    }

    #[test]
    fn test_camera_numbering_and_ids() {
        let rois = RoiLayout::default().generate();
        let find = |code: &str| rois.iter().find(|r| r.slot_code == code).unwrap();

        let a_car_1 = find("A-C-01");
        assert_eq!((a_car_1.camera_id, a_car_1.slot_id), (CameraId(1), SlotId(1)));
        assert_eq!(a_car_1.bbox, BoundingBox::new(50, 100, 120, 200));

        let a_car_5 = find("A-C-05");
        assert_eq!((a_car_5.camera_id, a_car_5.slot_id), (CameraId(2), SlotId(5)));
        assert_eq!(find("A-C-20").camera_id, CameraId(5));

        let a_bike_1 = find("A-B-01");
        assert_eq!((a_bike_1.camera_id, a_bike_1.slot_id), (CameraId(6), SlotId(101)));
        let a_bike_5 = find("A-B-05");
        assert_eq!(a_bike_5.bbox, BoundingBox::new(30, 220, 60, 120));
        assert_eq!(find("A-B-16").camera_id, CameraId(7));

        let b_car_1 = find("B-C-01");
        assert_eq!((b_car_1.camera_id, b_car_1.slot_id), (CameraId(8), SlotId(1001)));
        let b_bike_16 = find("B-B-16");
        assert_eq!((b_bike_16.camera_id, b_bike_16.slot_id), (CameraId(14), SlotId(1116)));
    }

    #[test]
    fn test_rois_for_camera() {
        let rois = RoiLayout::default().generate();
        assert_eq!(rois_for_camera(&rois, CameraId(3)).len(), 4);
        assert_eq!(rois_for_camera(&rois, CameraId(13)).len(), 8);
        assert!(rois_for_camera(&rois, CameraId(99)).is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roi.json");
        let rois = RoiLayout::default().generate();

        save_roi_config(&path, &rois).unwrap();
        let mut loaded = load_roi_config(&path).unwrap();
        loaded.sort_by_key(|r| r.slot_id);
        let mut expected = rois.clone();
        expected.sort_by_key(|r| r.slot_id);
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let result = load_roi_config("/nonexistent/roi.json");
        assert!(matches!(result, Err(VisionError::ConfigLoad(_))));
    }
}
