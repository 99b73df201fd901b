//! Client for the parking management backend.
//!
//! The backend owns tickets, slot assignment and persistence. This crate
//! exposes its three write operations behind [`BackendGateway`]:
//! entry registration, exit registration and occupancy updates.

pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod types;

pub use client::{BackendClientConfig, BackendGateway, HttpBackendClient};
pub use error::{GatewayError, GatewayResult};
pub use retry::{RetryConfig, RetryingGateway};
pub use types::{EntryRequest, EntryResponse, ExitRequest, ExitResponse, OccupancyAck, OccupancyUpdateRequest};
