//! Client for the OCR sidecar service.
//!
//! Plate text recognition runs in a separate inference service. This crate
//! talks to it over HTTP and adapts it to the synchronous
//! [`parkwatch_vision::PlateOcr`] contract used on camera threads.

pub mod client;
pub mod error;
pub mod types;

pub use client::{BlockingOcr, OcrClient, OcrClientConfig};
pub use error::{OcrError, OcrResult};
pub use types::{OcrRequest, OcrResponse, OcrTextResult};
