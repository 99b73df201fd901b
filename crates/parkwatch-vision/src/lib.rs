//! Vision pipeline for the parkwatch service.
//!
//! - [`source`]: frame acquisition from network streams and local devices
//! - [`detection`]: vehicle detection and classification
//! - [`plate`]: plate extraction, OCR and text validation
//! - [`occupancy`]: background modelling and per-slot occupancy scoring

pub mod detection;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod occupancy;
pub mod plate;
pub mod source;

pub use detection::{RawDetection, VehicleClassifier, VehicleDetector, VehiclePipeline};
pub use error::{VisionError, VisionResult};
pub use frame::Frame;
pub use occupancy::{
    BackgroundModel, OccupancyScorer, OccupancyWeights, RoiLayout, SlotReading, SlotStateTable,
};
pub use plate::{OcrCandidate, PlateOcr, PlateReader, PlateReaderConfig, PlateRegionDetector, PlateValidator};
pub use source::{CaptureReleaser, FfmpegSourceFactory, FrameSource, FrameSourceFactory};

#[cfg(feature = "onnx")]
pub use detection::yolo::{YoloDetector, YoloDetectorConfig};
