//! Backend request metrics.

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Backend requests by operation and status (0 = no response).
    pub const REQUESTS_TOTAL: &str = "parkwatch_backend_requests_total";

    /// Backend retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "parkwatch_backend_retries_total";

    /// Backend request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "parkwatch_backend_latency_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}
