//! Shared data models for the parkwatch detection service.
//!
//! This crate contains the types passed between the camera supervisor,
//! the vision pipelines, the event dispatcher and the backend gateway.

pub mod camera;
pub mod detection;
pub mod event;
pub mod roi;
pub mod slot;
pub mod stats;

pub use camera::{
    CameraId, CameraRole, CameraStream, Floor, ParseCameraRoleError, ParseFloorError,
    ParseSourceLocatorError, SourceLocator,
};
pub use detection::{BoundingBox, Detection, ParseVehicleTypeError, PlateReading, Point, VehicleType};
pub use event::{DetectionEvent, EventPayload, OccupancyUpdate, VehicleSighting};
pub use roi::{CameraRoiEntry, RoiDocument, RoiDocumentError, SlotRoiEntry};
pub use slot::{slot_code, OccupancySummary, SlotChange, SlotId, SlotRoi, SlotState};
pub use stats::{CameraStatus, PerformanceStats, SystemStats};
