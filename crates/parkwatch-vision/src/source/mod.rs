//! Frame sources.
//!
//! A [`FrameSource`] is read by exactly one camera worker. Its
//! [`CaptureReleaser`] can be cloned out before the source moves into the
//! worker, so the supervisor can free the capture even while the worker is
//! blocked in a read.

mod ffmpeg;
#[cfg(feature = "opencv")]
mod opencv;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parkwatch_models::CameraStream;

use crate::error::VisionResult;
use crate::frame::Frame;

pub use ffmpeg::{FfmpegFrameSource, FfmpegSourceConfig, FfmpegSourceFactory};
#[cfg(feature = "opencv")]
pub use self::opencv::{OpenCvFrameSource, OpenCvSourceFactory};

/// Blocking producer of decoded frames.
pub trait FrameSource: Send {
    /// Read the next frame, blocking until one is available.
    fn read_frame(&mut self) -> VisionResult<Frame>;

    /// Handle that releases the underlying capture from any thread.
    fn releaser(&self) -> CaptureReleaser;
}

/// Opens frame sources for cameras.
pub trait FrameSourceFactory: Send + Sync {
    fn open(&self, camera: &CameraStream) -> VisionResult<Box<dyn FrameSource>>;
}

struct ReleaserInner {
    released: AtomicBool,
    release_fn: Box<dyn Fn() + Send + Sync>,
}

/// Idempotent, thread-safe release handle for a capture resource.
#[derive(Clone)]
pub struct CaptureReleaser {
    inner: Arc<ReleaserInner>,
}

impl CaptureReleaser {
    pub fn new(release_fn: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(ReleaserInner {
                released: AtomicBool::new(false),
                release_fn: Box::new(release_fn),
            }),
        }
    }

    /// Release handle with no underlying resource.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Release the capture. Returns `true` only for the call that released it.
    pub fn release(&self) -> bool {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return false;
        }
        (self.inner.release_fn)();
        true
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CaptureReleaser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureReleaser")
            .field("released", &self.is_released())
            .finish()
    }
}
