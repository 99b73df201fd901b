//! Plate extraction and reading.

use std::sync::Arc;

use image::RgbImage;
use parkwatch_models::{BoundingBox, PlateReading};
use tracing::{debug, warn};

use super::ocr::{select_best_candidate, PlateOcr, PlateRegionDetector};
use super::preprocess::{enhance_contrast, standard_preprocess};
use super::text::{clean_plate_text, PlateValidator};
use crate::detection::RawDetection;
use crate::frame::{crop_rgb, Frame};
use crate::metrics;

#[derive(Debug, Clone)]
pub struct PlateReaderConfig {
    /// Padding around the vehicle box before searching for a plate.
    pub vehicle_padding: i32,
    /// Padding around a detected plate region.
    pub plate_padding: i32,
    /// OCR candidates at or below this confidence are ignored.
    pub min_candidate_confidence: f32,
    /// Height plate crops are resized to by standard preprocessing.
    pub preprocess_height: u32,
    pub blur_sigma: f32,
    /// Channel gain for the contrast-enhanced attempt.
    pub contrast_gain: f32,
}

impl Default for PlateReaderConfig {
    fn default() -> Self {
        Self {
            vehicle_padding: 20,
            plate_padding: 5,
            min_candidate_confidence: 0.5,
            preprocess_height: 64,
            blur_sigma: 1.0,
            contrast_gain: 1.5,
        }
    }
}

/// Validated OCR result for one crop.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRead {
    pub raw_text: String,
    pub text: String,
    pub confidence: f32,
}

/// Finds and reads plates inside vehicle boxes.
#[derive(Clone)]
pub struct PlateReader {
    ocr: Arc<dyn PlateOcr>,
    region_detector: Option<Arc<dyn PlateRegionDetector>>,
    validator: PlateValidator,
    config: PlateReaderConfig,
}

impl PlateReader {
    pub fn new(ocr: Arc<dyn PlateOcr>, validator: PlateValidator, config: PlateReaderConfig) -> Self {
        Self {
            ocr,
            region_detector: None,
            validator,
            config,
        }
    }

    /// Narrow vehicle crops to the best detected plate before OCR.
    pub fn with_region_detector(mut self, detector: Arc<dyn PlateRegionDetector>) -> Self {
        self.region_detector = Some(detector);
        self
    }

    pub fn config(&self) -> &PlateReaderConfig {
        &self.config
    }

    /// Crop the plate image for a vehicle.
    ///
    /// Returns the crop and its region in frame coordinates.
    pub fn locate_plate(&self, frame: &Frame, vehicle_bbox: &BoundingBox) -> Option<(BoundingBox, RgbImage)> {
        let (vehicle_region, vehicle_crop) = frame.crop(&vehicle_bbox.padded(self.config.vehicle_padding))?;

        let Some(detector) = &self.region_detector else {
            return Some((vehicle_region, vehicle_crop));
        };

        let plates = match detector.detect_plates(&vehicle_crop) {
            Ok(plates) => plates,
            Err(e) => {
                warn!(error = %e, "Plate region detection failed");
                metrics::record_detection_failure();
                return None;
            }
        };

        let best = plates
            .into_iter()
            .fold(None, |best: Option<RawDetection>, p| match best {
                Some(b) if b.confidence >= p.confidence => Some(b),
                _ => Some(p),
            })?;

        let (plate_region, plate_crop) = crop_rgb(&vehicle_crop, &best.bbox.padded(self.config.plate_padding))?;
        Some((vehicle_region.offset_child(&plate_region), plate_crop))
    }

    /// Single OCR pass over a plate crop.
    pub fn read_text(&self, image: &RgbImage, preprocess: bool) -> Option<TextRead> {
        let input = if preprocess {
            standard_preprocess(image, self.config.preprocess_height, self.config.blur_sigma)
        } else {
            image.clone()
        };

        let candidates = match self.ocr.read(&input) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(ocr = self.ocr.name(), error = %e, "OCR failed");
                metrics::record_plate_read("error");
                return None;
            }
        };

        let Some(best) = select_best_candidate(candidates, self.config.min_candidate_confidence) else {
            debug!("No OCR candidate met confidence threshold");
            metrics::record_plate_read("empty");
            return None;
        };

        let text = clean_plate_text(&best.text);
        if !self.validator.is_valid(&text) {
            debug!(raw = %best.text, cleaned = %text, "OCR text rejected by plate validator");
            metrics::record_plate_read("rejected");
            return None;
        }

        metrics::record_plate_read("accepted");
        Some(TextRead {
            raw_text: best.text,
            text,
            confidence: best.confidence,
        })
    }

    /// Standard, raw and contrast-enhanced passes; the longest text wins.
    ///
    /// Ties keep the earliest pass. Confidence does not break ties.
    pub fn read_with_multiple_attempts(&self, image: &RgbImage) -> Option<TextRead> {
        let enhanced = enhance_contrast(image, self.config.contrast_gain);
        let attempts = [
            self.read_text(image, true),
            self.read_text(image, false),
            self.read_text(&enhanced, true),
        ];

        attempts.into_iter().flatten().fold(None, |best: Option<TextRead>, read| match best {
            Some(b) if b.text.chars().count() >= read.text.chars().count() => Some(b),
            _ => Some(read),
        })
    }

    /// Single-pass plate read for a vehicle.
    pub fn extract_plate(&self, frame: &Frame, vehicle_bbox: &BoundingBox) -> Option<PlateReading> {
        let (region, crop) = self.locate_plate(frame, vehicle_bbox)?;
        let read = self.read_text(&crop, true)?;
        Some(to_reading(read, region, frame))
    }

    /// Multi-attempt plate read for a vehicle.
    pub fn extract_plate_thorough(&self, frame: &Frame, vehicle_bbox: &BoundingBox) -> Option<PlateReading> {
        let (region, crop) = self.locate_plate(frame, vehicle_bbox)?;
        let read = self.read_with_multiple_attempts(&crop)?;
        Some(to_reading(read, region, frame))
    }
}

fn to_reading(read: TextRead, bbox: BoundingBox, frame: &Frame) -> PlateReading {
    PlateReading {
        raw_text: read.raw_text,
        text: read.text,
        confidence: read.confidence,
        bbox,
        timestamp: frame.captured_at(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{VisionError, VisionResult};
    use crate::plate::OcrCandidate;
    use image::Rgb;
    use std::sync::Mutex;

    /// Returns queued responses in call order and records input sizes.
    struct ScriptedOcr {
        responses: Mutex<Vec<Vec<OcrCandidate>>>,
        seen: Mutex<Vec<(u32, u32)>>,
    }

    impl ScriptedOcr {
        fn new(responses: Vec<Vec<OcrCandidate>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl PlateOcr for ScriptedOcr {
        fn read(&self, image: &RgbImage) -> VisionResult<Vec<OcrCandidate>> {
            self.seen.lock().unwrap().push(image.dimensions());
            Ok(self.responses.lock().unwrap().pop().unwrap_or_default())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct BrokenOcr;

    impl PlateOcr for BrokenOcr {
        fn read(&self, _image: &RgbImage) -> VisionResult<Vec<OcrCandidate>> {
            Err(VisionError::ocr_failed("sidecar down"))
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    struct FixedPlates(Vec<RawDetection>);

    impl PlateRegionDetector for FixedPlates {
        fn detect_plates(&self, _image: &RgbImage) -> VisionResult<Vec<RawDetection>> {
            Ok(self.0.clone())
        }
    }

    fn candidate(text: &str, confidence: f32) -> Vec<OcrCandidate> {
        vec![OcrCandidate::new(vec![(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)], text, confidence)]
    }

    fn reader(ocr: Arc<dyn PlateOcr>) -> PlateReader {
        PlateReader::new(ocr, PlateValidator::default(), PlateReaderConfig::default())
    }

    fn frame() -> Frame {
        Frame::new(RgbImage::from_pixel(640, 480, Rgb([90, 90, 90])))
    }

    #[test]
    fn test_read_text_cleans_and_validates() {
        let ocr = Arc::new(ScriptedOcr::new(vec![candidate("ka-01 ab 1234", 0.9)]));
        let read = reader(ocr).read_text(&RgbImage::new(100, 30), false).unwrap();
        assert_eq!(read.text, "KA01 AB 1234");
        assert_eq!(read.raw_text, "ka-01 ab 1234");
    }

    #[test]
    fn test_read_text_rejects_invalid_plate() {
        let ocr = Arc::new(ScriptedOcr::new(vec![candidate("EXIT", 0.95)]));
        assert!(reader(ocr).read_text(&RgbImage::new(100, 30), false).is_none());
    }

    #[test]
    fn test_read_text_ocr_error_is_none() {
        assert!(reader(Arc::new(BrokenOcr)).read_text(&RgbImage::new(100, 30), true).is_none());
    }

    #[test]
    fn test_multiple_attempts_longest_wins() {
        let ocr = Arc::new(ScriptedOcr::new(vec![
            candidate("AB12", 0.99),
            candidate("AB1234", 0.6),
            candidate("AB123", 0.9),
        ]));
        let read = reader(ocr).read_with_multiple_attempts(&RgbImage::new(100, 30)).unwrap();
        assert_eq!(read.text, "AB1234");
    }

    #[test]
    fn test_multiple_attempts_tie_keeps_first() {
        let ocr = Arc::new(ScriptedOcr::new(vec![
            candidate("AB1234", 0.6),
            candidate("CD5678", 0.99),
            vec![],
        ]));
        let read = reader(ocr).read_with_multiple_attempts(&RgbImage::new(100, 30)).unwrap();
        assert_eq!(read.text, "AB1234");
    }

    #[test]
    fn test_multiple_attempts_preprocessed_inputs() {
        let ocr = Arc::new(ScriptedOcr::new(vec![]));
        let plate_reader = reader(ocr.clone());
        assert!(plate_reader.read_with_multiple_attempts(&RgbImage::new(100, 32)).is_none());

        let seen = ocr.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![(200, 64), (100, 32), (200, 64)]);
    }

    #[test]
    fn test_locate_plate_pads_and_clamps_vehicle() {
        let ocr = Arc::new(ScriptedOcr::new(vec![]));
        let (region, crop) = reader(ocr)
            .locate_plate(&frame(), &BoundingBox::new(10, 100, 200, 100))
            .unwrap();
        assert_eq!(region, BoundingBox::new(0, 80, 230, 140));
        assert_eq!(crop.dimensions(), (230, 140));
    }

    #[test]
    fn test_locate_plate_outside_frame_is_none() {
        let ocr = Arc::new(ScriptedOcr::new(vec![]));
        assert!(reader(ocr)
            .locate_plate(&frame(), &BoundingBox::new(700, 500, 50, 50))
            .is_none());
    }

    #[test]
    fn test_locate_plate_uses_best_region() {
        let ocr = Arc::new(ScriptedOcr::new(vec![]));
        let plates = FixedPlates(vec![
            RawDetection::new("license_plate", 0.4, BoundingBox::new(5, 5, 20, 10)),
            RawDetection::new("license_plate", 0.8, BoundingBox::new(50, 60, 40, 12)),
        ]);
        let (region, crop) = reader(ocr)
            .with_region_detector(Arc::new(plates))
            .locate_plate(&frame(), &BoundingBox::new(100, 100, 200, 100))
            .unwrap();
        // Vehicle crop starts at (80, 80); plate padded by 5.
        assert_eq!(region, BoundingBox::new(125, 135, 50, 22));
        assert_eq!(crop.dimensions(), (50, 22));
    }

    #[test]
    fn test_extract_plate_thorough_reading() {
        let ocr = Arc::new(ScriptedOcr::new(vec![candidate("KA01AB1234", 0.9)]));
        let reading = reader(ocr)
            .extract_plate_thorough(&frame(), &BoundingBox::new(100, 100, 200, 100))
            .unwrap();
        assert_eq!(reading.text, "KA01AB1234");
        assert!((reading.confidence - 0.9).abs() < f32::EPSILON);
    }
}
