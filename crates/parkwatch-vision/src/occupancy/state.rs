//! Shared slot state table.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parkwatch_models::{OccupancySummary, SlotId, SlotState};

/// Live state of every observed slot.
///
/// Updates are atomic per slot; writers on different slots never contend on
/// a shared lock. Later writes win.
#[derive(Debug, Default)]
pub struct SlotStateTable {
    states: DashMap<SlotId, SlotState>,
}

impl SlotStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a scoring result. Returns whether the occupied flag changed.
    ///
    /// Unobserved slots count as free, so a first observation is a change
    /// only when the slot is occupied.
    pub fn update(&self, slot_id: SlotId, occupied: bool, confidence: f32, at: DateTime<Utc>) -> bool {
        match self.states.entry(slot_id) {
            Entry::Occupied(mut entry) => {
                let state = entry.get_mut();
                let changed = state.occupied != occupied;
                state.occupied = occupied;
                state.confidence = confidence;
                state.updated_at = at;
                if changed && !occupied {
                    state.plate = None;
                }
                changed
            }
            Entry::Vacant(entry) => {
                entry.insert(SlotState {
                    slot_id,
                    occupied,
                    confidence,
                    plate: None,
                    updated_at: at,
                });
                occupied
            }
        }
    }

    /// Associate a plate with an observed slot.
    pub fn set_plate(&self, slot_id: SlotId, plate: Option<String>) -> bool {
        match self.states.get_mut(&slot_id) {
            Some(mut state) => {
                state.plate = plate;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, slot_id: SlotId) -> Option<SlotState> {
        self.states.get(&slot_id).map(|s| s.clone())
    }

    /// All states ordered by slot id.
    pub fn snapshot(&self) -> Vec<SlotState> {
        let mut states: Vec<SlotState> = self.states.iter().map(|s| s.value().clone()).collect();
        states.sort_by_key(|s| s.slot_id);
        states
    }

    pub fn occupied_count(&self) -> u32 {
        self.states.iter().filter(|s| s.occupied).count() as u32
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Counts against a facility of `total` slots.
    pub fn summary(&self, total: u32) -> OccupancySummary {
        OccupancySummary::new(total, self.occupied_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_observation() {
        let table = SlotStateTable::new();
        assert!(!table.update(SlotId(1), false, 0.1, Utc::now()));
        assert!(table.update(SlotId(2), true, 0.7, Utc::now()));
        assert_eq!(table.len(), 2);
        assert_eq!(table.occupied_count(), 1);
    }

    #[test]
    fn test_change_only_on_flip() {
        let table = SlotStateTable::new();
        table.update(SlotId(7), false, 0.1, Utc::now());
        assert!(table.update(SlotId(7), true, 0.6, Utc::now()));
        assert!(!table.update(SlotId(7), true, 0.8, Utc::now()));
        assert!(table.update(SlotId(7), false, 0.2, Utc::now()));
        assert!((table.get(SlotId(7)).unwrap().confidence - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_plate_cleared_when_freed() {
        let table = SlotStateTable::new();
        table.update(SlotId(3), true, 0.9, Utc::now());
        assert!(table.set_plate(SlotId(3), Some("KA01AB1234".to_string())));
        assert!(!table.set_plate(SlotId(99), None));
        table.update(SlotId(3), false, 0.1, Utc::now());
        assert_eq!(table.get(SlotId(3)).unwrap().plate, None);
    }

    #[test]
    fn test_summary() {
        let table = SlotStateTable::new();
        for id in 1..=5 {
            table.update(SlotId(id), id % 2 == 0, 0.5, Utc::now());
        }
        let summary = table.summary(72);
        assert_eq!((summary.total, summary.occupied, summary.available), (72, 2, 70));
    }

    #[test]
    fn test_concurrent_writers_keep_one_entry_per_slot() {
        let table = Arc::new(SlotStateTable::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let table = table.clone();
                std::thread::spawn(move || {
                    for round in 0..200u32 {
                        table.update(SlotId(round % 10), (round + worker) % 2 == 0, 0.5, Utc::now());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(table.len(), 10);
        assert_eq!(table.snapshot().len(), 10);
    }
}
