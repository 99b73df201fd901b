//! Per-slot occupancy score.

use image::{GrayImage, RgbImage};
use imageproc::edges::canny;
use parkwatch_models::BoundingBox;

use crate::frame::{crop_gray, crop_rgb};

/// Weights of the three ROI features in the occupancy score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccupancyWeights {
    pub foreground: f32,
    pub edge: f32,
    pub variance: f32,
    /// Pixel variance that saturates the variance term.
    pub variance_scale: f32,
}

impl Default for OccupancyWeights {
    fn default() -> Self {
        Self {
            foreground: 0.4,
            edge: 0.3,
            variance: 0.3,
            variance_scale: 1000.0,
        }
    }
}

/// Features measured inside one ROI.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RoiFeatures {
    /// Fraction of ROI pixels in the cleaned foreground mask.
    pub foreground_ratio: f32,
    /// Fraction of ROI pixels marked as edges.
    pub edge_ratio: f32,
    /// Population variance over all RGB channel values.
    pub pixel_variance: f32,
}

impl OccupancyWeights {
    /// Weighted score in [0, 1]. Non-decreasing in every feature.
    pub fn score(&self, features: &RoiFeatures) -> f32 {
        let variance_term = if self.variance_scale > 0.0 {
            (features.pixel_variance / self.variance_scale).min(1.0)
        } else {
            1.0
        };
        let score = self.foreground * features.foreground_ratio
            + self.edge * features.edge_ratio
            + self.variance * variance_term;
        score.clamp(0.0, 1.0)
    }
}

/// Canny hysteresis thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeThresholds {
    pub low: f32,
    pub high: f32,
}

impl Default for EdgeThresholds {
    fn default() -> Self {
        Self { low: 50.0, high: 150.0 }
    }
}

/// Measure ROI features. `None` when the ROI lies outside the frame.
pub fn measure_roi(
    rgb: &RgbImage,
    gray: &GrayImage,
    foreground: &GrayImage,
    roi: &BoundingBox,
    edges: EdgeThresholds,
) -> Option<RoiFeatures> {
    let (_, rgb_roi) = crop_rgb(rgb, roi)?;
    let gray_roi = crop_gray(gray, roi)?;
    let mask_roi = crop_gray(foreground, roi)?;

    let area = (gray_roi.width() * gray_roi.height()) as f32;
    let foreground_ratio = count_set(&mask_roi) as f32 / area;
    let edge_ratio = count_set(&canny(&gray_roi, edges.low, edges.high)) as f32 / area;

    Some(RoiFeatures {
        foreground_ratio,
        edge_ratio,
        pixel_variance: channel_variance(rgb_roi.as_raw()),
    })
}

fn count_set(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] > 0).count()
}

/// Population variance of a byte slice.
pub fn channel_variance(values: &[u8]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    var as f32
}
