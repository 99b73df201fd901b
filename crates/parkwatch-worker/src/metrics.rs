//! Worker metrics and Prometheus exporter.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder. The handle renders `/metrics`.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Frames handed to a camera pipeline, by camera code.
    pub const FRAMES_PROCESSED_TOTAL: &str = "parkwatch_frames_processed_total";

    /// Failed frame reads, by camera code.
    pub const FRAME_READ_FAILURES_TOTAL: &str = "parkwatch_frame_read_failures_total";

    /// Dispatcher decisions, by event kind and outcome.
    pub const EVENTS_DISPATCHED_TOTAL: &str = "parkwatch_events_dispatched_total";

    /// Results of spawned backend calls, by event kind and status.
    pub const EVENTS_DELIVERED_TOTAL: &str = "parkwatch_events_delivered_total";

    /// Cameras with a live worker.
    pub const CAMERAS_RUNNING: &str = "parkwatch_cameras_running";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_frame(camera_code: &str) {
    counter!(names::FRAMES_PROCESSED_TOTAL, "camera" => camera_code.to_string()).increment(1);
}

pub fn record_frame_read_failure(camera_code: &str) {
    counter!(names::FRAME_READ_FAILURES_TOTAL, "camera" => camera_code.to_string()).increment(1);
}

pub fn record_dispatch(kind: &'static str, outcome: &'static str) {
    counter!(
        names::EVENTS_DISPATCHED_TOTAL,
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_delivery(kind: &'static str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        names::EVENTS_DELIVERED_TOTAL,
        "kind" => kind,
        "status" => status
    )
    .increment(1);
}

pub fn set_cameras_running(count: usize) {
    gauge!(names::CAMERAS_RUNNING).set(count as f64);
}
