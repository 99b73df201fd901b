//! Per-camera role pipelines.
//!
//! A pipeline turns one frame into zero or more [`DetectionEvent`]s. Each
//! registered camera owns exactly one pipeline for its whole registration,
//! so state such as the background model survives stop and start.

mod gate;
mod indoor;

use std::sync::Arc;
use std::time::Duration;

use parkwatch_models::{CameraRole, CameraStream, DetectionEvent, SlotRoi};
use parkwatch_vision::occupancy::{rois_for_camera, OccupancyScorer, OccupancyScorerConfig};
use parkwatch_vision::{Frame, PlateReader, SlotStateTable, VehiclePipeline};

use crate::error::{WorkerError, WorkerResult};

pub use gate::{DuplicateSuppressor, GatePipeline};
pub use indoor::IndoorPipeline;

/// What a pipeline made of one frame.
#[derive(Debug, Default)]
pub struct FrameOutput {
    pub events: Vec<DetectionEvent>,
    /// Something was detected, even if no event came of it.
    pub detected: bool,
}

/// Frame-to-events stage run on a camera worker thread.
pub trait CameraPipeline: Send {
    fn process(&mut self, frame: &Frame) -> FrameOutput;
}

/// Shared collaborators used to build camera pipelines.
#[derive(Clone)]
pub struct PipelineContext {
    /// Vehicle detection for gate cameras.
    pub vehicles: Option<VehiclePipeline>,
    /// Plate reading for gate cameras.
    pub plates: Option<Arc<PlateReader>>,
    /// Every slot in the facility.
    pub rois: Arc<Vec<SlotRoi>>,
    pub slot_table: Arc<SlotStateTable>,
    pub scorer: OccupancyScorerConfig,
    pub duplicate_window: Duration,
    pub attach_snapshots: bool,
}

impl PipelineContext {
    pub fn new(rois: Vec<SlotRoi>, slot_table: Arc<SlotStateTable>) -> Self {
        Self {
            vehicles: None,
            plates: None,
            rois: Arc::new(rois),
            slot_table,
            scorer: OccupancyScorerConfig::default(),
            duplicate_window: Duration::from_secs(10),
            attach_snapshots: false,
        }
    }

    pub fn with_vehicles(mut self, vehicles: VehiclePipeline) -> Self {
        self.vehicles = Some(vehicles);
        self
    }

    pub fn with_plates(mut self, plates: Arc<PlateReader>) -> Self {
        self.plates = Some(plates);
        self
    }

    pub fn total_slots(&self) -> u32 {
        self.rois.len() as u32
    }

    /// Build the pipeline for `camera`'s role.
    pub fn build(&self, camera: &CameraStream) -> WorkerResult<Box<dyn CameraPipeline>> {
        match camera.role {
            CameraRole::Entry | CameraRole::Exit => {
                let vehicles = self.vehicles.clone().ok_or_else(|| {
                    WorkerError::config_error(format!("No vehicle detector configured for camera {}", camera.code))
                })?;
                let plates = self.plates.clone().ok_or_else(|| {
                    WorkerError::config_error(format!("No plate reader configured for camera {}", camera.code))
                })?;
                Ok(Box::new(GatePipeline::new(
                    camera,
                    vehicles,
                    plates,
                    self.duplicate_window,
                    self.attach_snapshots,
                )))
            }
            CameraRole::Indoor => {
                let scorer = OccupancyScorer::new(
                    camera.id,
                    rois_for_camera(&self.rois, camera.id),
                    self.scorer.clone(),
                );
                Ok(Box::new(IndoorPipeline::new(scorer, self.slot_table.clone(), self.total_slots())))
            }
        }
    }
}
