//! Decoded RGB frames.

use chrono::{DateTime, Utc};
use image::{GrayImage, RgbImage};
use parkwatch_models::BoundingBox;

use crate::error::{VisionError, VisionResult};

/// One decoded frame and the time it was captured.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    pub fn with_timestamp(image: RgbImage, captured_at: DateTime<Utc>) -> Self {
        Self { image, captured_at }
    }

    /// Build a frame from packed RGB24 bytes.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> VisionResult<Self> {
        let expected_len = (width as usize) * (height as usize) * 3;
        if data.len() != expected_len {
            return Err(VisionError::frame_read(format!(
                "Invalid frame data length: expected {}, got {}",
                expected_len,
                data.len()
            )));
        }

        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| VisionError::internal("Failed to create image buffer"))?;
        Ok(Self::new(image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn to_gray(&self) -> GrayImage {
        image::imageops::grayscale(&self.image)
    }

    /// Crop `region`, clamped to the frame. `None` when the clamped region is empty.
    pub fn crop(&self, region: &BoundingBox) -> Option<(BoundingBox, RgbImage)> {
        crop_rgb(&self.image, region)
    }
}

/// Crop a region out of an RGB image, clamped to its bounds.
///
/// Returns the clamped region alongside the pixels.
pub fn crop_rgb(image: &RgbImage, region: &BoundingBox) -> Option<(BoundingBox, RgbImage)> {
    let clamped = region.clamp_to(image.width(), image.height())?;
    let view = image::imageops::crop_imm(
        image,
        clamped.x as u32,
        clamped.y as u32,
        clamped.width as u32,
        clamped.height as u32,
    );
    Some((clamped, view.to_image()))
}

/// Crop a region out of a grayscale image, clamped to its bounds.
pub fn crop_gray(image: &GrayImage, region: &BoundingBox) -> Option<GrayImage> {
    let clamped = region.clamp_to(image.width(), image.height())?;
    Some(
        image::imageops::crop_imm(
            image,
            clamped.x as u32,
            clamped.y as u32,
            clamped.width as u32,
            clamped.height as u32,
        )
        .to_image(),
    )
}
