//! OCR service HTTP client.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbImage};
use parkwatch_vision::{OcrCandidate, PlateOcr, VisionError, VisionResult};
use reqwest::Client;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::error::{OcrError, OcrResult};
use crate::types::{HealthResponse, OcrRequest, OcrResponse};

/// Configuration for the OCR client.
#[derive(Debug, Clone)]
pub struct OcrClientConfig {
    /// Base URL of the OCR service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
}

impl Default for OcrClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 1,
        }
    }
}

impl OcrClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OCR_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            timeout: Duration::from_secs(
                std::env::var("OCR_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            max_retries: std::env::var("OCR_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1),
        }
    }
}

/// Client for the OCR service.
pub struct OcrClient {
    http: Client,
    config: OcrClientConfig,
}

impl OcrClient {
    pub fn new(config: OcrClientConfig) -> OcrResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(OcrError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> OcrResult<Self> {
        Self::new(OcrClientConfig::from_env())
    }

    pub fn config(&self) -> &OcrClientConfig {
        &self.config
    }

    /// Check if the OCR service is healthy.
    pub async fn health_check(&self) -> OcrResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.json::<HealthResponse>().await {
                Ok(health) => Ok(health.status == "healthy" || health.status == "ok"),
                Err(e) => {
                    warn!("OCR service health response unreadable: {}", e);
                    Ok(false)
                }
            },
            Ok(response) => {
                warn!("OCR service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("OCR service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Recognise text in a plate crop.
    pub async fn recognize(&self, image: &RgbImage) -> OcrResult<Vec<OcrCandidate>> {
        let url = format!("{}/ocr", self.config.base_url);
        let request = OcrRequest {
            image: encode_png_base64(image)?,
        };

        debug!(width = image.width(), height = image.height(), "Sending OCR request");

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(OcrError::Network)?;

                if response.status().is_server_error() {
                    return Err(OcrError::ServiceUnavailable(format!(
                        "OCR service returned {}",
                        response.status()
                    )));
                }
                Ok(response)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::RequestFailed(format!(
                "OCR service returned {}: {}",
                status, body
            )));
        }

        let body: OcrResponse = response.json().await?;
        Ok(body
            .results
            .into_iter()
            .map(|r| {
                OcrCandidate::new(
                    r.bbox.into_iter().map(|[x, y]| (x, y)).collect(),
                    r.text,
                    r.confidence,
                )
            })
            .collect())
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> OcrResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = OcrResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(100 * 2u64.pow(attempt));
                    warn!(
                        "OCR request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn encode_png_base64(image: &RgbImage) -> OcrResult<String> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone()).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// [`PlateOcr`] adapter that drives [`OcrClient`] from a blocking thread.
///
/// Must be called from outside the async runtime, e.g. a camera worker
/// thread or `spawn_blocking`.
#[derive(Clone)]
pub struct BlockingOcr {
    client: Arc<OcrClient>,
    handle: Handle,
}

impl BlockingOcr {
    pub fn new(client: Arc<OcrClient>, handle: Handle) -> Self {
        Self { client, handle }
    }
}

impl PlateOcr for BlockingOcr {
    fn read(&self, image: &RgbImage) -> VisionResult<Vec<OcrCandidate>> {
        self.handle
            .block_on(self.client.recognize(image))
            .map_err(|e| VisionError::ocr_failed(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "ocr-service"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = OcrClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn test_png_encoding_is_base64() {
        let encoded = encode_png_base64(&RgbImage::new(4, 2)).unwrap();
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn test_health_check_unreachable_is_false() {
        let client = OcrClient::new(OcrClientConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(1),
            max_retries: 0,
        })
        .unwrap();
        let healthy = tokio_test::block_on(client.health_check()).unwrap();
        assert!(!healthy);
    }
}
