//! Event dispatcher and rate limiter.
//!
//! Decides synchronously whether an event becomes a backend call, then
//! spawns the call on the async runtime so the camera worker never waits
//! on the network.

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use image::{DynamicImage, ImageFormat, RgbImage};
use parkwatch_gateway::{BackendGateway, EntryRequest, ExitRequest, OccupancyUpdateRequest};
use parkwatch_models::{CameraRole, DetectionEvent, EventPayload, OccupancyUpdate, VehicleSighting};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::stats::DetectionStats;

/// Rate-limit entries are pruned once the table grows past this.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Window in which a repeated (role, plate) is dropped.
    pub cooldown: Duration,
    /// Minimum plate confidence for entry events.
    pub plate_confidence_threshold: f32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(5),
            plate_confidence_threshold: 0.7,
        }
    }
}

/// What the dispatcher did with an event.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Backend call spawned.
    Sent(JoinHandle<()>),
    /// Same role and plate seen within the cooldown.
    RateLimited,
    /// Entry plate confidence under the threshold.
    LowConfidence,
    /// Gate event without plate text.
    MissingPlate,
    /// Occupancy event with no slot changes.
    NoChanges,
    /// Payload does not fit the camera role.
    Mismatched,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchOutcome::Sent(_) => "sent",
            DispatchOutcome::RateLimited => "rate_limited",
            DispatchOutcome::LowConfidence => "low_confidence",
            DispatchOutcome::MissingPlate => "missing_plate",
            DispatchOutcome::NoChanges => "no_changes",
            DispatchOutcome::Mismatched => "mismatched",
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, DispatchOutcome::Sent(_))
    }

    /// Consume the outcome, returning the spawned call if there is one.
    pub fn into_handle(self) -> Option<JoinHandle<()>> {
        match self {
            DispatchOutcome::Sent(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Routes detection events to the backend by camera role.
pub struct EventDispatcher {
    gateway: Arc<dyn BackendGateway>,
    runtime: Handle,
    stats: Arc<DetectionStats>,
    last_calls: DashMap<(CameraRole, String), Instant>,
    config: DispatcherConfig,
}

impl EventDispatcher {
    pub fn new(
        gateway: Arc<dyn BackendGateway>,
        runtime: Handle,
        stats: Arc<DetectionStats>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            gateway,
            runtime,
            stats,
            last_calls: DashMap::new(),
            config,
        }
    }

    pub fn stats(&self) -> &Arc<DetectionStats> {
        &self.stats
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn dispatch(&self, event: DetectionEvent) -> DispatchOutcome {
        self.dispatch_at(event, Instant::now())
    }

    /// Dispatch with an explicit clock reading for the rate limiter.
    pub fn dispatch_at(&self, event: DetectionEvent, now: Instant) -> DispatchOutcome {
        self.stats.record_detection();
        let role = event.role;

        let outcome = match (role, event.payload) {
            (CameraRole::Entry | CameraRole::Exit, EventPayload::Vehicle(sighting)) => {
                self.dispatch_vehicle(role, sighting, event.timestamp, now)
            }
            (CameraRole::Indoor, EventPayload::Occupancy(update)) => self.dispatch_occupancy(update),
            (role, _) => {
                warn!(camera_id = %event.camera_id, role = %role, "Event payload does not match camera role");
                DispatchOutcome::Mismatched
            }
        };

        metrics::record_dispatch(role.as_str(), outcome.as_str());
        outcome
    }

    fn dispatch_vehicle(
        &self,
        role: CameraRole,
        sighting: VehicleSighting,
        timestamp: chrono::DateTime<Utc>,
        now: Instant,
    ) -> DispatchOutcome {
        let Some(plate) = sighting.plate.clone().filter(|p| !p.is_empty()) else {
            warn!(role = %role, "Gate detection without license plate");
            return DispatchOutcome::MissingPlate;
        };

        if role == CameraRole::Entry && sighting.plate_confidence < self.config.plate_confidence_threshold {
            warn!(
                plate = %plate,
                confidence = sighting.plate_confidence,
                "Low confidence plate detection"
            );
            self.stats.record_failure();
            return DispatchOutcome::LowConfidence;
        }

        if !self.try_acquire(role, &plate, now) {
            debug!(plate = %plate, role = %role, "Rate limited");
            return DispatchOutcome::RateLimited;
        }

        let gateway = self.gateway.clone();
        let stats = self.stats.clone();

        let handle = match role {
            CameraRole::Entry => {
                let mut request = EntryRequest::new(
                    plate.clone(),
                    sighting.vehicle_type,
                    timestamp,
                    sighting.plate_confidence,
                );
                if let Some(snapshot) = &sighting.snapshot {
                    request = request.with_image(base64::engine::general_purpose::STANDARD.encode(snapshot));
                }

                self.runtime.spawn(async move {
                    match gateway.register_entry(&request).await {
                        Ok(response) => {
                            info!(plate = %plate, slot = %response.assigned_slot, "Entry processed");
                            stats.record_entry();
                            metrics::record_delivery(CameraRole::Entry.as_str(), true);
                        }
                        Err(e) => {
                            warn!(plate = %plate, error = %e, "Entry API call failed");
                            stats.record_failure();
                            metrics::record_delivery(CameraRole::Entry.as_str(), false);
                        }
                    }
                })
            }
            _ => {
                let request = ExitRequest { timestamp };

                self.runtime.spawn(async move {
                    match gateway.register_exit(&plate, &request).await {
                        Ok(response) => {
                            info!(
                                plate = %plate,
                                duration_minutes = response.parking_duration_minutes,
                                "Exit processed"
                            );
                            stats.record_exit();
                            metrics::record_delivery(CameraRole::Exit.as_str(), true);
                        }
                        Err(e) => {
                            warn!(plate = %plate, error = %e, "Exit API call failed");
                            stats.record_failure();
                            metrics::record_delivery(CameraRole::Exit.as_str(), false);
                        }
                    }
                })
            }
        };

        DispatchOutcome::Sent(handle)
    }

    fn dispatch_occupancy(&self, update: OccupancyUpdate) -> DispatchOutcome {
        if update.changes.is_empty() {
            return DispatchOutcome::NoChanges;
        }

        let request = OccupancyUpdateRequest {
            total_spots: update.total,
            occupied_spots: update.occupied,
            available_spots: update.available,
            changes: update.changes,
            timestamp: Utc::now(),
        };
        let gateway = self.gateway.clone();
        let stats = self.stats.clone();

        DispatchOutcome::Sent(self.runtime.spawn(async move {
            match gateway.update_occupancy(&request).await {
                Ok(_) => {
                    debug!(
                        occupied = request.occupied_spots,
                        changes = request.changes.len(),
                        "Occupancy update acknowledged"
                    );
                    metrics::record_delivery(CameraRole::Indoor.as_str(), true);
                }
                Err(e) => {
                    warn!(error = %e, "Occupancy update failed");
                    stats.record_failure();
                    metrics::record_delivery(CameraRole::Indoor.as_str(), false);
                }
            }
        }))
    }

    /// Claim the (role, plate) key unless it was claimed within the cooldown.
    fn try_acquire(&self, role: CameraRole, plate: &str, now: Instant) -> bool {
        if self.last_calls.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }

        match self.last_calls.entry((role, plate.to_string())) {
            Entry::Occupied(mut entry) => {
                if now.saturating_duration_since(*entry.get()) < self.config.cooldown {
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    fn prune(&self, now: Instant) {
        let cooldown = self.config.cooldown;
        self.last_calls
            .retain(|_, last| now.saturating_duration_since(*last) < cooldown);
    }
}

/// JPEG-encode a vehicle crop for an entry snapshot.
pub fn encode_snapshot(image: &RgbImage) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    match DynamicImage::ImageRgb8(image.clone()).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg) {
        Ok(()) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "Snapshot encoding failed");
            None
        }
    }
}
