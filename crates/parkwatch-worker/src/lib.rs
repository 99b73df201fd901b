//! Camera supervision and event dispatch for the parkwatch service.
//!
//! The [`StreamSupervisor`] runs one worker thread per active camera. Each
//! worker throttles its source, hands frames to the camera's role pipeline
//! and passes the resulting events to the [`EventDispatcher`], which
//! deduplicates them and calls the backend off the camera thread.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod startup;
pub mod stats;
pub mod status;
pub mod supervisor;

pub use config::{load_cameras_config, CameraConfigDocument, ServiceConfig};
pub use dispatcher::{DispatchOutcome, DispatcherConfig, EventDispatcher};
pub use error::{WorkerError, WorkerResult};
pub use logging::CameraLogger;
pub use pipeline::{CameraPipeline, FrameOutput, GatePipeline, IndoorPipeline, PipelineContext};
pub use stats::DetectionStats;
pub use status::{create_router, StatusState};
pub use supervisor::{OccupancyOverview, StreamSupervisor, SupervisorConfig};
