//! OCR service request/response types.

use serde::{Deserialize, Serialize};

/// Plate crop to recognise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrRequest {
    /// Base64-encoded PNG
    pub image: String,
}

/// One recognised text region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrTextResult {
    /// Region corners as `[x, y]` pairs
    pub bbox: Vec<[f32; 2]>,
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub results: Vec<OcrTextResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
