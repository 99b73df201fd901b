//! Status and statistics HTTP surface.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use parkwatch_models::{CameraStatus, OccupancySummary, PerformanceStats, SlotState, SystemStats};
use parkwatch_vision::SlotStateTable;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::stats::DetectionStats;
use crate::supervisor::{OccupancyOverview, StreamSupervisor};

/// Shared state for the status handlers.
#[derive(Clone)]
pub struct StatusState {
    pub supervisor: Arc<StreamSupervisor>,
    pub stats: Arc<DetectionStats>,
    pub slot_table: Arc<SlotStateTable>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub cameras: Vec<CameraStatus>,
    pub system_stats: SystemStats,
    pub detection_performance: PerformanceStats,
    pub occupancy: OccupancyOverview,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    pub summary: OccupancySummary,
    pub slots: Vec<SlotState>,
}

/// Liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

pub async fn status(State(state): State<StatusState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        cameras: state.supervisor.status(),
        system_stats: state.supervisor.system_stats(),
        detection_performance: state.stats.snapshot(),
        occupancy: state.supervisor.occupancy_overview(),
    })
}

pub async fn stats(State(state): State<StatusState>) -> Json<PerformanceStats> {
    Json(state.stats.snapshot())
}

pub async fn reset_stats(State(state): State<StatusState>) -> Json<PerformanceStats> {
    state.stats.reset();
    Json(state.stats.snapshot())
}

pub async fn slots(State(state): State<StatusState>) -> Json<SlotsResponse> {
    let total = state.supervisor.occupancy_overview().total_slots;
    Json(SlotsResponse {
        summary: state.slot_table.summary(total),
        slots: state.slot_table.snapshot(),
    })
}

/// Create the status router.
pub fn create_router(state: StatusState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/stats", get(stats))
        .route("/stats/reset", post(reset_stats))
        .route("/slots", get(slots))
        .with_state(state)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
}
