//! Test doubles shared by the worker integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use parkwatch_gateway::{
    BackendGateway, EntryRequest, EntryResponse, ExitRequest, ExitResponse, GatewayResult, OccupancyAck,
    OccupancyUpdateRequest,
};
use parkwatch_models::{BoundingBox, CameraStream};
use parkwatch_vision::{
    CaptureReleaser, Frame, FrameSource, FrameSourceFactory, OcrCandidate, PlateOcr, RawDetection, VehicleDetector,
    VisionError, VisionResult,
};
use parkwatch_worker::{DetectionStats, DispatcherConfig, EventDispatcher};
use tokio::runtime::Handle;

// ============================================================================
// Backend
// ============================================================================

#[derive(Default)]
pub struct RecordingGateway {
    pub entries: Mutex<Vec<EntryRequest>>,
    pub exits: Mutex<Vec<String>>,
    pub occupancy: Mutex<Vec<OccupancyUpdateRequest>>,
}

impl RecordingGateway {
    pub fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn occupancy_count(&self) -> usize {
        self.occupancy.lock().unwrap().len()
    }
}

#[async_trait]
impl BackendGateway for RecordingGateway {
    async fn register_entry(&self, request: &EntryRequest) -> GatewayResult<EntryResponse> {
        self.entries.lock().unwrap().push(request.clone());
        Ok(EntryResponse {
            assigned_slot: "A-C-01".to_string(),
            ticket_id: None,
        })
    }

    async fn register_exit(&self, plate: &str, _request: &ExitRequest) -> GatewayResult<ExitResponse> {
        self.exits.lock().unwrap().push(plate.to_string());
        Ok(ExitResponse {
            parking_duration_minutes: 45,
        })
    }

    async fn update_occupancy(&self, request: &OccupancyUpdateRequest) -> GatewayResult<OccupancyAck> {
        self.occupancy.lock().unwrap().push(request.clone());
        Ok(OccupancyAck::default())
    }
}

pub fn dispatcher_for(gateway: Arc<RecordingGateway>) -> Arc<EventDispatcher> {
    Arc::new(EventDispatcher::new(
        gateway,
        Handle::current(),
        Arc::new(DetectionStats::new()),
        DispatcherConfig::default(),
    ))
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

// ============================================================================
// Frames
// ============================================================================

pub fn empty_lot() -> Frame {
    Frame::new(RgbImage::from_pixel(128, 64, Rgb([128, 128, 128])))
}

/// High-contrast checkerboard over x 8..40, y 16..48.
pub fn parked_lot() -> Frame {
    let mut img = RgbImage::from_pixel(128, 64, Rgb([128, 128, 128]));
    for x in 8..40 {
        for y in 16..48 {
            let v = if ((x / 8) + (y / 8)) % 2 == 0 { 255 } else { 0 };
            img.put_pixel(x, y, Rgb([v, v, v]));
        }
    }
    Frame::new(img)
}

// ============================================================================
// Sources
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SourceKind {
    /// Endless uniform frames.
    Endless,
    /// Blocks in every read until released.
    Stalled,
    /// Fails to open.
    Broken,
    /// Fails its first reads, then yields endless frames.
    Flaky,
}

/// Reads a `Flaky` source fails before it recovers.
pub const FLAKY_FAILURES: usize = 5;

struct TestSource {
    kind: SourceKind,
    reads: Arc<AtomicUsize>,
    script: VecDeque<Frame>,
    scripted: bool,
    released: Arc<AtomicBool>,
    releaser: CaptureReleaser,
}

impl FrameSource for TestSource {
    fn read_frame(&mut self) -> VisionResult<Frame> {
        let attempt = self.reads.fetch_add(1, Ordering::SeqCst);
        if self.released.load(Ordering::SeqCst) {
            return Err(VisionError::Released);
        }
        if self.scripted {
            // Scripted sources end once their frames are consumed.
            return self.script.pop_front().ok_or(VisionError::Released);
        }
        match self.kind {
            SourceKind::Stalled => loop {
                if self.released.load(Ordering::SeqCst) {
                    return Err(VisionError::Released);
                }
                std::thread::sleep(Duration::from_millis(5));
            },
            SourceKind::Flaky if attempt < FLAKY_FAILURES => {
                Err(VisionError::frame_read(format!("decode error on read {}", attempt + 1)))
            }
            _ => Ok(Frame::new(RgbImage::from_pixel(16, 16, Rgb([100, 100, 100])))),
        }
    }

    fn releaser(&self) -> CaptureReleaser {
        self.releaser.clone()
    }
}

/// Opens test sources keyed by camera code prefix:
/// `STALL*` stalls, `BROKEN*` fails, `FLAKY*` fails its first reads, and
/// anything else is endless unless a script was registered for the code.
#[derive(Default)]
pub struct TestSourceFactory {
    scripts: Mutex<Vec<(String, Vec<Frame>)>>,
    pub releasers: Mutex<Vec<(String, CaptureReleaser)>>,
    pub opens: AtomicUsize,
    /// Read attempts across all sources, counted when a read starts.
    pub reads: Arc<AtomicUsize>,
}

impl TestSourceFactory {
    pub fn with_script(self, code: &str, frames: Vec<Frame>) -> Self {
        self.scripts.lock().unwrap().push((code.to_string(), frames));
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn releaser_for(&self, code: &str) -> Option<CaptureReleaser> {
        self.releasers
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(c, _)| c == code)
            .map(|(_, r)| r.clone())
    }
}

impl FrameSourceFactory for TestSourceFactory {
    fn open(&self, camera: &CameraStream) -> VisionResult<Box<dyn FrameSource>> {
        let kind = if camera.code.starts_with("STALL") {
            SourceKind::Stalled
        } else if camera.code.starts_with("BROKEN") {
            SourceKind::Broken
        } else if camera.code.starts_with("FLAKY") {
            SourceKind::Flaky
        } else {
            SourceKind::Endless
        };
        if kind == SourceKind::Broken {
            return Err(VisionError::camera_open(camera.code.clone(), "connection refused"));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .unwrap()
            .iter()
            .find(|(code, _)| code == &camera.code)
            .map(|(_, frames)| frames.clone());

        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();
        let releaser = CaptureReleaser::new(move || flag.store(true, Ordering::SeqCst));
        self.releasers
            .lock()
            .unwrap()
            .push((camera.code.clone(), releaser.clone()));

        Ok(Box::new(TestSource {
            kind,
            reads: self.reads.clone(),
            scripted: script.is_some(),
            script: script.unwrap_or_default().into(),
            released,
            releaser,
        }))
    }
}

// ============================================================================
// Inference
// ============================================================================

/// Reports one car in every frame.
pub struct OneCar;

impl VehicleDetector for OneCar {
    fn detect(&self, _image: &RgbImage) -> VisionResult<Vec<RawDetection>> {
        Ok(vec![RawDetection::new("car", 0.9, BoundingBox::new(30, 10, 60, 40))])
    }

    fn name(&self) -> &'static str {
        "one-car"
    }
}

/// Reads the same plate text from every crop.
pub struct FixedPlate(pub &'static str, pub f32);

impl PlateOcr for FixedPlate {
    fn read(&self, _image: &RgbImage) -> VisionResult<Vec<OcrCandidate>> {
        Ok(vec![OcrCandidate::new(
            vec![(1.0, 1.0), (40.0, 1.0), (40.0, 12.0), (1.0, 12.0)],
            self.0,
            self.1,
        )])
    }

    fn name(&self) -> &'static str {
        "fixed-plate"
    }
}
