//! Detection performance counters.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parkwatch_models::PerformanceStats;
use tracing::info;

/// Lock-free counters shared by the dispatcher and the status server.
#[derive(Debug)]
pub struct DetectionStats {
    total_detections: AtomicU64,
    successful_entries: AtomicU64,
    successful_exits: AtomicU64,
    failed_detections: AtomicU64,
    /// Reset time in epoch milliseconds.
    since_reset: AtomicI64,
}

impl Default for DetectionStats {
    fn default() -> Self {
        Self {
            total_detections: AtomicU64::new(0),
            successful_entries: AtomicU64::new(0),
            successful_exits: AtomicU64::new(0),
            failed_detections: AtomicU64::new(0),
            since_reset: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }
}

impl DetectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_detection(&self) {
        self.total_detections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entry(&self) {
        self.successful_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exit(&self) {
        self.successful_exits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_detections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PerformanceStats {
        PerformanceStats {
            total_detections: self.total_detections.load(Ordering::Relaxed),
            successful_entries: self.successful_entries.load(Ordering::Relaxed),
            successful_exits: self.successful_exits.load(Ordering::Relaxed),
            failed_detections: self.failed_detections.load(Ordering::Relaxed),
            since_reset: DateTime::from_timestamp_millis(self.since_reset.load(Ordering::Relaxed))
                .unwrap_or_else(Utc::now),
        }
    }

    pub fn reset(&self) {
        self.total_detections.store(0, Ordering::Relaxed);
        self.successful_entries.store(0, Ordering::Relaxed);
        self.successful_exits.store(0, Ordering::Relaxed);
        self.failed_detections.store(0, Ordering::Relaxed);
        self.since_reset.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        info!("Detection statistics reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_reset() {
        let stats = DetectionStats::new();
        stats.record_detection();
        stats.record_detection();
        stats.record_entry();
        stats.record_exit();
        stats.record_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_detections, 2);
        assert_eq!(snapshot.successful_entries, 1);
        assert_eq!(snapshot.successful_exits, 1);
        assert_eq!(snapshot.failed_detections, 1);

        let before = snapshot.since_reset;
        stats.reset();
        let after = stats.snapshot();
        assert_eq!(after.total_detections, 0);
        assert_eq!(after.failed_detections, 0);
        assert!(after.since_reset >= before);
    }
}
