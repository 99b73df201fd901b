//! Camera stream supervisor.
//!
//! Owns camera registrations and runs one dedicated OS thread per started
//! camera. Stopping is cooperative: the worker polls a cancellation flag
//! once per iteration, and the supervisor waits a bounded time for it
//! before releasing the capture resource regardless.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parkwatch_models::{CameraId, CameraRole, CameraStatus, CameraStream, SystemStats};
use parkwatch_vision::{CaptureReleaser, Frame, FrameSource, FrameSourceFactory, VisionError};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::dispatcher::EventDispatcher;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::CameraLogger;
use crate::metrics;
use crate::pipeline::{CameraPipeline, PipelineContext};

/// Worker loop timing.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How long `stop` waits for a worker before releasing its source.
    pub stop_timeout: Duration,
    /// Sleep between throttle checks.
    pub poll_interval: Duration,
    /// Sleep after each processed frame.
    pub yield_interval: Duration,
    /// Consecutive read failures before backing off.
    pub failure_threshold: u32,
    pub failure_backoff: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stop_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(1),
            yield_interval: Duration::from_millis(10),
            failure_threshold: 3,
            failure_backoff: Duration::from_secs(1),
        }
    }
}

/// Indoor scoring overview for the status surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyOverview {
    /// Registered indoor cameras.
    pub total_cameras: usize,
    pub total_slots: u32,
    /// Slots scored at least once.
    pub tracked_slots: usize,
    pub occupancy_threshold: f32,
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Default)]
struct CameraCounters {
    frames_processed: AtomicU64,
    /// Epoch milliseconds of the last frame with a detection; 0 when none.
    last_detection_ms: AtomicI64,
}

impl CameraCounters {
    fn last_detection_time(&self) -> Option<DateTime<Utc>> {
        match self.last_detection_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }
}

struct WorkerHandle {
    cancel: Arc<AtomicBool>,
    releaser: CaptureReleaser,
    done: oneshot::Receiver<()>,
    thread: JoinHandle<()>,
}

type SharedPipeline = Arc<Mutex<Box<dyn CameraPipeline>>>;

struct CameraEntry {
    camera: CameraStream,
    pipeline: SharedPipeline,
    counters: Arc<CameraCounters>,
    worker: Option<WorkerHandle>,
}

impl CameraEntry {
    fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.thread.is_finished())
    }

    fn status(&self) -> CameraStatus {
        CameraStatus {
            id: self.camera.id,
            code: self.camera.code.clone(),
            role: self.camera.role,
            active: self.camera.active,
            running: self.is_running(),
            frames_processed: self.counters.frames_processed.load(Ordering::Relaxed),
            last_detection_time: self.counters.last_detection_time(),
        }
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Supervisor
// ============================================================================

pub struct StreamSupervisor {
    cameras: Mutex<HashMap<CameraId, CameraEntry>>,
    sources: Arc<dyn FrameSourceFactory>,
    context: PipelineContext,
    dispatcher: Arc<EventDispatcher>,
    config: SupervisorConfig,
}

impl StreamSupervisor {
    pub fn new(
        sources: Arc<dyn FrameSourceFactory>,
        context: PipelineContext,
        dispatcher: Arc<EventDispatcher>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            cameras: Mutex::new(HashMap::new()),
            sources,
            context,
            dispatcher,
            config,
        }
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Register a camera and build its role pipeline.
    pub fn add_camera(&self, camera: CameraStream) -> WorkerResult<()> {
        let mut cameras = lock(&self.cameras);
        if cameras.contains_key(&camera.id) {
            return Err(WorkerError::AlreadyRegistered(camera.id));
        }

        let pipeline = self.context.build(&camera)?;
        info!(
            camera_id = %camera.id,
            camera_code = %camera.code,
            role = %camera.role,
            source = %camera.source.redacted(),
            "Camera registered"
        );

        cameras.insert(
            camera.id,
            CameraEntry {
                camera,
                pipeline: Arc::new(Mutex::new(pipeline)),
                counters: Arc::new(CameraCounters::default()),
                worker: None,
            },
        );
        Ok(())
    }

    /// Stop the camera if running, then drop its registration and pipeline.
    pub async fn remove_camera(&self, id: CameraId) -> WorkerResult<CameraStream> {
        self.stop(id).await?;
        let entry = lock(&self.cameras).remove(&id).ok_or(WorkerError::UnknownCamera(id))?;
        info!(camera_id = %id, camera_code = %entry.camera.code, "Camera removed");
        Ok(entry.camera)
    }

    /// Start a camera's worker. Returns whether a worker was started.
    pub fn start(&self, id: CameraId) -> WorkerResult<bool> {
        let camera = {
            let cameras = lock(&self.cameras);
            let entry = cameras.get(&id).ok_or(WorkerError::UnknownCamera(id))?;
            if !entry.camera.active {
                CameraLogger::new(&entry.camera).log_warning("camera is inactive, not starting");
                return Ok(false);
            }
            if entry.is_running() {
                debug!(camera_id = %id, "Camera already running");
                return Ok(false);
            }
            entry.camera.clone()
        };

        let logger = CameraLogger::new(&camera);
        let source = self.sources.open(&camera).map_err(|e| {
            logger.log_error(&format!("failed to open {}: {}", camera.source.redacted(), e));
            WorkerError::camera_open(camera.code.clone(), e)
        })?;
        let releaser = source.releaser();

        let mut cameras = lock(&self.cameras);
        let Some(entry) = cameras.get_mut(&id) else {
            releaser.release();
            return Err(WorkerError::UnknownCamera(id));
        };
        if entry.is_running() {
            releaser.release();
            return Ok(false);
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = oneshot::channel();
        let worker = CameraWorker {
            camera,
            source,
            pipeline: entry.pipeline.clone(),
            dispatcher: self.dispatcher.clone(),
            counters: entry.counters.clone(),
            cancel: cancel.clone(),
            config: self.config.clone(),
            logger,
        };

        let thread = thread::Builder::new()
            .name(format!("camera-{}", entry.camera.code))
            .spawn(move || worker.run(done_tx))?;

        entry.worker = Some(WorkerHandle {
            cancel,
            releaser,
            done: done_rx,
            thread,
        });
        metrics::set_cameras_running(cameras.values().filter(|e| e.is_running()).count());
        Ok(true)
    }

    /// Start every active camera. Open failures are logged and skipped.
    pub fn start_all(&self) -> usize {
        let mut ids: Vec<CameraId> = lock(&self.cameras)
            .values()
            .filter(|e| e.camera.active)
            .map(|e| e.camera.id)
            .collect();
        ids.sort();

        let mut started = 0;
        for id in ids {
            match self.start(id) {
                Ok(true) => started += 1,
                Ok(false) => {}
                Err(e) => warn!(camera_id = %id, error = %e, "Skipping camera"),
            }
        }

        info!(started, "Cameras started");
        started
    }

    /// Signal a camera's worker to stop and release its capture.
    ///
    /// Returns false when the camera had no worker.
    pub async fn stop(&self, id: CameraId) -> WorkerResult<bool> {
        let handle = {
            let mut cameras = lock(&self.cameras);
            let entry = cameras.get_mut(&id).ok_or(WorkerError::UnknownCamera(id))?;
            entry.worker.take()
        };
        let Some(handle) = handle else {
            return Ok(false);
        };

        handle.cancel.store(true, Ordering::Release);
        let deadline = tokio::time::Instant::now() + self.config.stop_timeout;
        self.finish(id, handle, deadline).await;
        self.update_running_gauge();
        Ok(true)
    }

    /// Stop every running camera, sharing one timeout across all of them.
    pub async fn stop_all(&self) -> usize {
        let handles: Vec<(CameraId, WorkerHandle)> = {
            let mut cameras = lock(&self.cameras);
            cameras
                .iter_mut()
                .filter_map(|(id, entry)| entry.worker.take().map(|h| (*id, h)))
                .collect()
        };

        for (_, handle) in &handles {
            handle.cancel.store(true, Ordering::Release);
        }

        let deadline = tokio::time::Instant::now() + self.config.stop_timeout;
        let stopped = handles.len();
        for (id, handle) in handles {
            self.finish(id, handle, deadline).await;
        }

        self.update_running_gauge();
        info!(stopped, "Cameras stopped");
        stopped
    }

    async fn finish(&self, id: CameraId, handle: WorkerHandle, deadline: tokio::time::Instant) {
        if tokio::time::timeout_at(deadline, handle.done).await.is_err() {
            warn!(camera_id = %id, "Camera worker did not exit in time, releasing capture");
        }
        handle.releaser.release();
    }

    fn update_running_gauge(&self) {
        let running = lock(&self.cameras).values().filter(|e| e.is_running()).count();
        metrics::set_cameras_running(running);
    }

    /// Per-camera status ordered by id.
    pub fn status(&self) -> Vec<CameraStatus> {
        let mut statuses: Vec<CameraStatus> = lock(&self.cameras).values().map(CameraEntry::status).collect();
        statuses.sort_by_key(|s| s.id);
        statuses
    }

    pub fn system_stats(&self) -> SystemStats {
        let cameras = lock(&self.cameras);
        SystemStats {
            total_cameras: cameras.len(),
            active_cameras: cameras.values().filter(|e| e.camera.active).count(),
            running_cameras: cameras.values().filter(|e| e.is_running()).count(),
            total_frames_processed: cameras
                .values()
                .map(|e| e.counters.frames_processed.load(Ordering::Relaxed))
                .sum(),
        }
    }

    pub fn occupancy_overview(&self) -> OccupancyOverview {
        let indoor = lock(&self.cameras)
            .values()
            .filter(|e| e.camera.role == CameraRole::Indoor)
            .count();
        OccupancyOverview {
            total_cameras: indoor,
            total_slots: self.context.total_slots(),
            tracked_slots: self.context.slot_table.len(),
            occupancy_threshold: self.context.scorer.threshold,
        }
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Counts consecutive read failures and rate-limits their log lines.
#[derive(Debug)]
struct FailureTracker {
    consecutive_failures: u32,
    threshold: u32,
}

impl FailureTracker {
    fn new(threshold: u32) -> Self {
        Self {
            consecutive_failures: 0,
            threshold,
        }
    }

    fn record_success(&mut self) {
        if self.consecutive_failures > self.threshold {
            debug!(failures = self.consecutive_failures, "Frame reads recovered");
        }
        self.consecutive_failures = 0;
    }

    /// Returns whether this failure should be logged.
    fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;
        if self.consecutive_failures == self.threshold + 1 {
            warn!(
                "Suppressing further read failure logs after {} consecutive failures",
                self.threshold
            );
        }
        self.consecutive_failures <= self.threshold
    }

    fn should_back_off(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }
}

struct CameraWorker {
    camera: CameraStream,
    source: Box<dyn FrameSource>,
    pipeline: SharedPipeline,
    dispatcher: Arc<EventDispatcher>,
    counters: Arc<CameraCounters>,
    cancel: Arc<AtomicBool>,
    config: SupervisorConfig,
    logger: CameraLogger,
}

impl CameraWorker {
    fn run(mut self, done: oneshot::Sender<()>) {
        let span = self.logger.create_span();
        let _guard = span.enter();

        self.logger.log_start(&format!(
            "{} at {} fps",
            self.camera.source.redacted(),
            self.camera.target_fps
        ));

        let interval = self.camera.frame_interval();
        let mut last_emit: Option<Instant> = None;
        let mut failures = FailureTracker::new(self.config.failure_threshold);

        while !self.cancel.load(Ordering::Acquire) {
            if let Some(last) = last_emit {
                if last.elapsed() < interval {
                    thread::sleep(self.config.poll_interval);
                    continue;
                }
            }

            match self.source.read_frame() {
                Ok(frame) => {
                    last_emit = Some(Instant::now());
                    failures.record_success();
                    self.handle_frame(&frame);
                }
                Err(VisionError::Released) => {
                    self.logger.log_warning("capture released");
                    break;
                }
                Err(e) => {
                    metrics::record_frame_read_failure(&self.camera.code);
                    if failures.record_failure() {
                        self.logger.log_warning(&format!("frame read failed: {}", e));
                    }
                    if failures.should_back_off() {
                        thread::sleep(self.config.failure_backoff);
                    }
                }
            }

            thread::sleep(self.config.yield_interval);
        }

        self.logger.log_stop(&format!(
            "{} frames processed",
            self.counters.frames_processed.load(Ordering::Relaxed)
        ));
        let _ = done.send(());
    }

    fn handle_frame(&self, frame: &Frame) {
        let output = lock(&self.pipeline).process(frame);

        self.counters.frames_processed.fetch_add(1, Ordering::Relaxed);
        metrics::record_frame(&self.camera.code);

        if output.detected {
            self.counters
                .last_detection_ms
                .store(frame.captured_at().timestamp_millis(), Ordering::Relaxed);
        }

        for event in output.events {
            let outcome = self.dispatcher.dispatch(event);
            debug!(outcome = outcome.as_str(), "Event dispatched");
        }
    }
}
