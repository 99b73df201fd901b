//! OCR and plate-region capability contracts.

use image::RgbImage;
use parkwatch_models::BoundingBox;

use crate::detection::RawDetection;
use crate::error::VisionResult;

/// One text region returned by an OCR engine.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrCandidate {
    /// Corner points of the text region, in input image pixels.
    pub polygon: Vec<(f32, f32)>,
    pub text: String,
    pub confidence: f32,
}

impl OcrCandidate {
    pub fn new(polygon: Vec<(f32, f32)>, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            polygon,
            text: text.into(),
            confidence,
        }
    }

    /// Axis-aligned rectangle around the polygon.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::enclosing(&self.polygon)
    }
}

/// Text recognition over a plate crop.
pub trait PlateOcr: Send + Sync {
    fn read(&self, image: &RgbImage) -> VisionResult<Vec<OcrCandidate>>;

    fn name(&self) -> &'static str;
}

/// Locates plates inside a vehicle crop.
pub trait PlateRegionDetector: Send + Sync {
    fn detect_plates(&self, image: &RgbImage) -> VisionResult<Vec<RawDetection>>;
}

/// Highest-confidence candidate strictly above `min_confidence`.
///
/// The earliest candidate wins a confidence tie.
pub fn select_best_candidate(candidates: Vec<OcrCandidate>, min_confidence: f32) -> Option<OcrCandidate> {
    candidates
        .into_iter()
        .filter(|c| c.confidence > min_confidence)
        .fold(None, |best: Option<OcrCandidate>, c| match best {
            Some(b) if b.confidence >= c.confidence => Some(b),
            _ => Some(c),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Vec<(f32, f32)> {
        vec![(2.0, 3.0), (40.0, 3.0), (40.0, 15.0), (2.0, 15.0)]
    }

    #[test]
    fn test_select_highest_confidence_above_threshold() {
        let best = select_best_candidate(
            vec![
                OcrCandidate::new(quad(), "KA01", 0.55),
                OcrCandidate::new(quad(), "KA01AB", 0.8),
                OcrCandidate::new(quad(), "NOISE", 0.5),
            ],
            0.5,
        )
        .unwrap();
        assert_eq!(best.text, "KA01AB");
    }

    #[test]
    fn test_select_none_when_all_weak() {
        let weak = vec![OcrCandidate::new(quad(), "AB12", 0.5), OcrCandidate::new(quad(), "CD34", 0.1)];
        assert!(select_best_candidate(weak, 0.5).is_none());
    }

    #[test]
    fn test_select_keeps_first_on_tie() {
        let best = select_best_candidate(
            vec![OcrCandidate::new(quad(), "FIRST", 0.7), OcrCandidate::new(quad(), "SECOND", 0.7)],
            0.5,
        )
        .unwrap();
        assert_eq!(best.text, "FIRST");
    }

    #[test]
    fn test_polygon_to_rectangle() {
        let candidate = OcrCandidate::new(quad(), "X", 0.9);
        assert_eq!(candidate.bounding_box(), Some(BoundingBox::new(2, 3, 38, 12)));
    }
}
