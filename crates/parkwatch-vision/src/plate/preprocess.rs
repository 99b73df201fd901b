//! Plate crop preprocessing for OCR.

use image::{imageops::FilterType, DynamicImage, GrayImage, Luma, RgbImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;

/// Grayscale, Gaussian blur, Otsu binarization, then resize to `target_height`.
pub fn standard_preprocess(image: &RgbImage, target_height: u32, blur_sigma: f32) -> RgbImage {
    let gray = image::imageops::grayscale(image);
    let blurred = if blur_sigma > 0.0 {
        gaussian_blur_f32(&gray, blur_sigma)
    } else {
        gray
    };

    let level = otsu_level(&blurred);
    let binary = GrayImage::from_fn(blurred.width(), blurred.height(), |x, y| {
        if blurred.get_pixel(x, y)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    });

    DynamicImage::ImageLuma8(resize_to_height(&binary, target_height)).to_rgb8()
}

/// Scale every channel by `gain`, saturating at 255.
pub fn enhance_contrast(image: &RgbImage, gain: f32) -> RgbImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = (*channel as f32 * gain).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Resize keeping aspect ratio so the height is `target_height`.
pub fn resize_to_height(image: &GrayImage, target_height: u32) -> GrayImage {
    if image.height() == 0 || target_height == 0 || image.height() == target_height {
        return image.clone();
    }
    let scale = target_height as f32 / image.height() as f32;
    let width = ((image.width() as f32 * scale) as u32).max(1);
    image::imageops::resize(image, width, target_height, FilterType::CatmullRom)
}
