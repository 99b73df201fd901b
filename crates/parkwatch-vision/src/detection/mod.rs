//! Vehicle detection.
//!
//! The detector itself is a black box behind [`VehicleDetector`]; this module
//! maps its class names onto the facility's vehicle types and turns raw boxes
//! into [`Detection`]s.

#[cfg(feature = "onnx")]
pub mod yolo;

use std::sync::Arc;

use image::RgbImage;
use parkwatch_models::{BoundingBox, Detection, VehicleType};
use tracing::{debug, warn};

use crate::error::VisionResult;
use crate::frame::Frame;
use crate::metrics;

/// Box produced by an object detector, in pixel coordinates of its input.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(class_name: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            bbox,
        }
    }
}

/// Object detector run on whole frames.
pub trait VehicleDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> VisionResult<Vec<RawDetection>>;

    /// Detector name for logging.
    fn name(&self) -> &'static str;
}

// ============================================================================
// Classification
// ============================================================================

/// Substring table mapping detector class names to vehicle types.
///
/// Matching is case-insensitive and the car table is checked first.
#[derive(Debug, Clone)]
pub struct VehicleClassifier {
    car_keywords: Vec<String>,
    bike_keywords: Vec<String>,
}

impl Default for VehicleClassifier {
    fn default() -> Self {
        Self::new(
            ["car", "truck", "van", "suv"],
            ["motorcycle", "bicycle", "scooter"],
        )
    }
}

impl VehicleClassifier {
    pub fn new<C, B>(car_keywords: C, bike_keywords: B) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        Self {
            car_keywords: car_keywords.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
            bike_keywords: bike_keywords.into_iter().map(|k| k.as_ref().to_lowercase()).collect(),
        }
    }

    pub fn classify(&self, class_name: &str) -> Option<VehicleType> {
        let name = class_name.to_lowercase();
        if self.car_keywords.iter().any(|k| name.contains(k.as_str())) {
            Some(VehicleType::Car)
        } else if self.bike_keywords.iter().any(|k| name.contains(k.as_str())) {
            Some(VehicleType::Bike)
        } else {
            None
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Runs the detector and keeps only recognised vehicle classes.
#[derive(Clone)]
pub struct VehiclePipeline {
    detector: Arc<dyn VehicleDetector>,
    classifier: VehicleClassifier,
    min_confidence: f32,
}

impl VehiclePipeline {
    pub fn new(detector: Arc<dyn VehicleDetector>, classifier: VehicleClassifier, min_confidence: f32) -> Self {
        Self {
            detector,
            classifier,
            min_confidence,
        }
    }

    /// Vehicles in `frame`. Detector errors are logged and yield no detections.
    pub fn detect_vehicles(&self, frame: &Frame) -> Vec<Detection> {
        let raw = match self.detector.detect(frame.image()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(detector = self.detector.name(), error = %e, "Vehicle detection failed");
                metrics::record_detection_failure();
                return Vec::new();
            }
        };

        let detections: Vec<Detection> = raw
            .into_iter()
            .filter(|d| d.confidence >= self.min_confidence)
            .filter_map(|d| {
                let vehicle_type = self.classifier.classify(&d.class_name)?;
                let bbox = d.bbox.clamp_to(frame.width(), frame.height())?;
                Some(Detection::new(vehicle_type, d.confidence, bbox, frame.captured_at()))
            })
            .collect();

        for detection in &detections {
            metrics::record_vehicle(detection.vehicle_type.as_str());
        }
        debug!(count = detections.len(), "Vehicle detection completed");

        detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VisionError;

    struct FixedDetector(Vec<RawDetection>);

    impl VehicleDetector for FixedDetector {
        fn detect(&self, _image: &RgbImage) -> VisionResult<Vec<RawDetection>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct FailingDetector;

    impl VehicleDetector for FailingDetector {
        fn detect(&self, _image: &RgbImage) -> VisionResult<Vec<RawDetection>> {
            Err(VisionError::detection_failed("inference crashed"))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn frame() -> Frame {
        Frame::new(RgbImage::new(640, 480))
    }

    #[test]
    fn test_classifier_default_table() {
        let classifier = VehicleClassifier::default();
        assert_eq!(classifier.classify("car"), Some(VehicleType::Car));
        assert_eq!(classifier.classify("Pickup Truck"), Some(VehicleType::Car));
        assert_eq!(classifier.classify("motorcycle"), Some(VehicleType::Bike));
        assert_eq!(classifier.classify("SCOOTER"), Some(VehicleType::Bike));
        assert_eq!(classifier.classify("person"), None);
        assert_eq!(classifier.classify("bus"), None);
    }

    #[test]
    fn test_classifier_checks_car_first() {
        // "minivan-scooter" matches both tables; cars win.
        let classifier = VehicleClassifier::default();
        assert_eq!(classifier.classify("minivan-scooter"), Some(VehicleType::Car));
    }

    #[test]
    fn test_unmapped_and_weak_detections_dropped() {
        let detector = FixedDetector(vec![
            RawDetection::new("car", 0.9, BoundingBox::new(10, 10, 100, 80)),
            RawDetection::new("person", 0.95, BoundingBox::new(200, 10, 40, 120)),
            RawDetection::new("motorcycle", 0.3, BoundingBox::new(300, 10, 60, 60)),
            RawDetection::new("bicycle", 0.6, BoundingBox::new(600, 400, 100, 100)),
        ]);
        let pipeline = VehiclePipeline::new(Arc::new(detector), VehicleClassifier::default(), 0.5);

        let detections = pipeline.detect_vehicles(&frame());
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].vehicle_type, VehicleType::Car);
        assert_eq!(detections[1].vehicle_type, VehicleType::Bike);
        // Clamped to the frame.
        assert_eq!(detections[1].bbox, BoundingBox::new(600, 400, 40, 80));
    }

    #[test]
    fn test_detector_failure_yields_empty() {
        let pipeline = VehiclePipeline::new(Arc::new(FailingDetector), VehicleClassifier::default(), 0.5);
        assert!(pipeline.detect_vehicles(&frame()).is_empty());
    }
}
