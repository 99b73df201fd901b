//! Running per-pixel background model.
//!
//! Each pixel keeps a running Gaussian (mean, variance) of its grayscale
//! intensity. A pixel is foreground when its squared deviation from the mean
//! exceeds `var_threshold` times the variance.

use image::{imageops, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{close, open};

#[derive(Debug, Clone)]
pub struct BackgroundModelConfig {
    /// Weight of the newest frame in the running estimates.
    pub learning_rate: f32,
    /// Squared Mahalanobis distance above which a pixel is foreground.
    pub var_threshold: f32,
    pub initial_variance: f32,
    pub min_variance: f32,
    pub max_variance: f32,
}

impl Default for BackgroundModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1.0 / 500.0,
            var_threshold: 16.0,
            initial_variance: 15.0 * 15.0,
            min_variance: 4.0,
            max_variance: 75.0 * 75.0,
        }
    }
}

/// Background model for one camera.
#[derive(Debug, Clone)]
pub struct BackgroundModel {
    config: BackgroundModelConfig,
    width: u32,
    height: u32,
    mean: Vec<f32>,
    variance: Vec<f32>,
    frames_seen: u64,
}

impl BackgroundModel {
    pub fn new(config: BackgroundModelConfig) -> Self {
        Self {
            config,
            width: 0,
            height: 0,
            mean: Vec::new(),
            variance: Vec::new(),
            frames_seen: 0,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.frames_seen > 0
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn reset(&mut self) {
        self.width = 0;
        self.height = 0;
        self.mean.clear();
        self.variance.clear();
        self.frames_seen = 0;
    }

    /// Update the model with `gray` and return the raw foreground mask.
    ///
    /// The first frame, or a frame of a different size, (re)initialises the
    /// model and yields an empty mask.
    pub fn apply(&mut self, gray: &GrayImage) -> GrayImage {
        let (width, height) = gray.dimensions();
        if !self.is_initialized() || width != self.width || height != self.height {
            self.initialise(gray);
            return GrayImage::new(width, height);
        }

        let cfg = &self.config;
        let mut mask = GrayImage::new(width, height);
        for (i, (pixel, out)) in gray.pixels().zip(mask.pixels_mut()).enumerate() {
            let value = pixel[0] as f32;
            let delta = value - self.mean[i];
            let dist_sq = delta * delta;

            if dist_sq > cfg.var_threshold * self.variance[i] {
                *out = Luma([255]);
            }

            self.mean[i] += cfg.learning_rate * delta;
            self.variance[i] = (self.variance[i] + cfg.learning_rate * (dist_sq - self.variance[i]))
                .clamp(cfg.min_variance, cfg.max_variance);
        }

        self.frames_seen += 1;
        mask
    }

    fn initialise(&mut self, gray: &GrayImage) {
        self.width = gray.width();
        self.height = gray.height();
        self.mean = gray.pixels().map(|p| p[0] as f32).collect();
        self.variance = vec![self.config.initial_variance; self.mean.len()];
        self.frames_seen = 1;
    }
}

impl Default for BackgroundModel {
    fn default() -> Self {
        Self::new(BackgroundModelConfig::default())
    }
}

/// Kernel radius of the mask cleanup; 2 gives a 5x5 square.
const CLEAN_RADIUS: u8 = 2;

/// Morphological close then open with a 5x5 square kernel.
///
/// The mask is padded with background first so pixels outside the frame
/// never count as foreground. The border must cover both passes of the
/// close, hence twice the radius.
pub fn clean_mask(mask: &GrayImage) -> GrayImage {
    let pad = 2 * u32::from(CLEAN_RADIUS);
    let (width, height) = mask.dimensions();

    let mut padded = GrayImage::new(width + 2 * pad, height + 2 * pad);
    imageops::replace(&mut padded, mask, i64::from(pad), i64::from(pad));

    let cleaned = open(
        &close(&padded, Norm::LInf, CLEAN_RADIUS),
        Norm::LInf,
        CLEAN_RADIUS,
    );
    imageops::crop_imm(&cleaned, pad, pad, width, height).to_image()
}
