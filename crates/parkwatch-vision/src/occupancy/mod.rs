//! Slot occupancy scoring for indoor cameras.
//!
//! Each indoor camera owns a fixed set of slot ROIs and a persistent
//! [`BackgroundModel`]. Every frame updates the model, and each ROI is scored
//! from its foreground, edge and pixel-variance content. Results land in the
//! shared [`SlotStateTable`].

mod background;
mod layout;
mod score;
mod scorer;
mod state;

pub use background::{clean_mask, BackgroundModel, BackgroundModelConfig};
pub use layout::{load_roi_config, rois_for_camera, save_roi_config, RoiLayout, SlotGrid};
pub use score::{channel_variance, measure_roi, EdgeThresholds, OccupancyWeights, RoiFeatures};
pub use scorer::{OccupancyScorer, OccupancyScorerConfig, SlotReading};
pub use state::SlotStateTable;
