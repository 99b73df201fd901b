//! OpenCV `VideoCapture` frame source.

use std::sync::{Arc, Mutex};

use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{VideoCapture, CAP_ANY};
use parkwatch_models::{CameraStream, SourceLocator};
use tracing::info;

use super::{CaptureReleaser, FrameSource, FrameSourceFactory};
use crate::error::{VisionError, VisionResult};
use crate::frame::Frame;

/// Frame source backed by an OpenCV capture.
///
/// Releasing takes the capture lock, so it waits for an in-flight read.
pub struct OpenCvFrameSource {
    capture: Arc<Mutex<VideoCapture>>,
    releaser: CaptureReleaser,
}

impl OpenCvFrameSource {
    pub fn open(locator: &SourceLocator) -> VisionResult<Self> {
        let capture = match locator {
            SourceLocator::Url(url) => VideoCapture::from_file(url, CAP_ANY),
            SourceLocator::Device(index) => VideoCapture::new(*index as i32, CAP_ANY),
        }
        .map_err(|e| VisionError::camera_open(locator.redacted(), e.to_string()))?;

        let opened = capture
            .is_opened()
            .map_err(|e| VisionError::camera_open(locator.redacted(), e.to_string()))?;
        if !opened {
            return Err(VisionError::camera_open(locator.redacted(), "VideoCapture did not open"));
        }

        let capture = Arc::new(Mutex::new(capture));
        let handle = capture.clone();
        let releaser = CaptureReleaser::new(move || {
            if let Ok(mut cap) = handle.lock() {
                let _ = cap.release();
            }
        });

        info!(source = %locator.redacted(), "OpenCV frame source opened");
        Ok(Self { capture, releaser })
    }
}

impl FrameSource for OpenCvFrameSource {
    fn read_frame(&mut self) -> VisionResult<Frame> {
        if self.releaser.is_released() {
            return Err(VisionError::Released);
        }

        let mut cap = self
            .capture
            .lock()
            .map_err(|_| VisionError::internal("Capture lock poisoned"))?;

        let mut bgr = Mat::default();
        let ok = cap
            .read(&mut bgr)
            .map_err(|e| VisionError::frame_read(e.to_string()))?;
        if !ok || bgr.empty() {
            return Err(VisionError::frame_read("Empty frame from VideoCapture"));
        }

        let mut rgb = Mat::default();
        opencv::imgproc::cvt_color_def(&bgr, &mut rgb, opencv::imgproc::COLOR_BGR2RGB)
            .map_err(|e| VisionError::frame_read(format!("Color conversion failed: {}", e)))?;

        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let data = rgb
            .data_bytes()
            .map_err(|e| VisionError::frame_read(format!("Failed to get frame data: {}", e)))?;

        Frame::from_raw(width, height, data.to_vec())
    }

    fn releaser(&self) -> CaptureReleaser {
        self.releaser.clone()
    }
}

impl Drop for OpenCvFrameSource {
    fn drop(&mut self) {
        self.releaser.release();
    }
}

/// Opens an [`OpenCvFrameSource`] per camera.
#[derive(Debug, Clone, Default)]
pub struct OpenCvSourceFactory;

impl FrameSourceFactory for OpenCvSourceFactory {
    fn open(&self, camera: &CameraStream) -> VisionResult<Box<dyn FrameSource>> {
        Ok(Box::new(OpenCvFrameSource::open(&camera.source)?))
    }
}
