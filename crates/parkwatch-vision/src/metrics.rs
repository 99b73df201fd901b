//! Vision metrics.
//!
//! Counters for detector output, OCR outcomes and slot transitions.

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Vehicles detected, by vehicle type.
    pub const VEHICLES_DETECTED_TOTAL: &str = "parkwatch_vehicles_detected_total";

    /// Detector invocations that failed.
    pub const DETECTION_FAILURES_TOTAL: &str = "parkwatch_detection_failures_total";

    /// Plate reads by outcome (accepted, rejected, empty).
    pub const PLATE_READS_TOTAL: &str = "parkwatch_plate_reads_total";

    /// Slot occupancy transitions, by direction.
    pub const SLOT_CHANGES_TOTAL: &str = "parkwatch_slot_changes_total";

    /// Time spent scoring one indoor frame.
    pub const OCCUPANCY_SCORING_SECONDS: &str = "parkwatch_occupancy_scoring_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_vehicle(vehicle_type: &str) {
    counter!(names::VEHICLES_DETECTED_TOTAL, "vehicle_type" => vehicle_type.to_string()).increment(1);
}

pub fn record_detection_failure() {
    counter!(names::DETECTION_FAILURES_TOTAL).increment(1);
}

pub fn record_plate_read(outcome: &'static str) {
    counter!(names::PLATE_READS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_slot_change(occupied: bool) {
    let direction = if occupied { "occupied" } else { "freed" };
    counter!(names::SLOT_CHANGES_TOTAL, "direction" => direction).increment(1);
}

pub fn record_scoring_latency(elapsed_ms: f64) {
    histogram!(names::OCCUPANCY_SCORING_SECONDS).record(elapsed_ms / 1000.0);
}
