//! HTTP backend client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::types::{
    EntryRequest, EntryResponse, ExitRequest, ExitResponse, HealthResponse, OccupancyAck, OccupancyUpdateRequest,
};

/// The backend's write operations.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Register a vehicle entering the facility.
    async fn register_entry(&self, request: &EntryRequest) -> GatewayResult<EntryResponse>;

    /// Register a vehicle leaving the facility.
    async fn register_exit(&self, plate: &str, request: &ExitRequest) -> GatewayResult<ExitResponse>;

    /// Push slot occupancy counts and changes.
    async fn update_occupancy(&self, request: &OccupancyUpdateRequest) -> GatewayResult<OccupancyAck>;
}

/// Configuration for the backend client.
#[derive(Debug, Clone)]
pub struct BackendClientConfig {
    pub base_url: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    pub timeout: Duration,
    /// Retries applied by [`crate::RetryingGateway`]; 0 disables it.
    pub max_retries: u32,
}

impl Default for BackendClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
            max_retries: 0,
        }
    }
}

impl BackendClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:8000".to_string()),
            api_key: std::env::var("BACKEND_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(
                std::env::var("BACKEND_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            max_retries: std::env::var("BACKEND_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        }
    }
}

/// [`BackendGateway`] over HTTP/JSON.
pub struct HttpBackendClient {
    http: Client,
    config: BackendClientConfig,
}

impl HttpBackendClient {
    pub fn new(config: BackendClientConfig) -> GatewayResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> GatewayResult<Self> {
        Self::new(BackendClientConfig::from_env())
    }

    pub fn config(&self) -> &BackendClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Check if the backend is reachable.
    pub async fn health_check(&self) -> bool {
        let request = self
            .authorize(self.http.get(self.url("/health")))
            .timeout(Duration::from_secs(5));

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                let status = response
                    .json::<HealthResponse>()
                    .await
                    .map(|h| h.status)
                    .unwrap_or_default();
                info!(status = %status, "Backend is reachable");
                true
            }
            Ok(response) => {
                warn!("Backend health check failed: {}", response.status());
                false
            }
            Err(e) => {
                warn!("Backend health check error: {}", e);
                false
            }
        }
    }

    /// Send a request, recording metrics and mapping failures.
    async fn send(&self, operation: &'static str, builder: RequestBuilder) -> GatewayResult<Response> {
        let started = Instant::now();
        let result = self.authorize(builder).send().await;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(response) if response.status().is_success() => {
                metrics::record_request(operation, response.status().as_u16(), latency_ms);
                Ok(response)
            }
            Ok(response) => {
                let status = response.status();
                metrics::record_request(operation, status.as_u16(), latency_ms);
                let body = response.text().await.unwrap_or_default();
                Err(GatewayError::from_http_status(status.as_u16(), body))
            }
            Err(e) => {
                metrics::record_request(operation, 0, latency_ms);
                if e.is_timeout() {
                    Err(GatewayError::Timeout(self.config.timeout))
                } else {
                    Err(GatewayError::Network(e))
                }
            }
        }
    }
}

#[async_trait]
impl BackendGateway for HttpBackendClient {
    async fn register_entry(&self, request: &EntryRequest) -> GatewayResult<EntryResponse> {
        debug!(plate = %request.plate, vehicle_type = %request.vehicle_type, "Registering entry");

        let response = self
            .send("register_entry", self.http.post(self.url("/entry")).json(request))
            .await?;
        if response.status() != StatusCode::CREATED {
            debug!(status = %response.status(), "Entry accepted with non-201 success status");
        }
        decode(response).await
    }

    async fn register_exit(&self, plate: &str, request: &ExitRequest) -> GatewayResult<ExitResponse> {
        debug!(plate = %plate, "Registering exit");

        let path = format!("/exit/{}", urlencoding::encode(plate));
        let response = self
            .send("register_exit", self.http.post(self.url(&path)).json(request))
            .await?;
        decode(response).await
    }

    async fn update_occupancy(&self, request: &OccupancyUpdateRequest) -> GatewayResult<OccupancyAck> {
        debug!(
            occupied = request.occupied_spots,
            available = request.available_spots,
            changes = request.changes.len(),
            "Updating occupancy"
        );

        let response = self
            .send("update_occupancy", self.http.post(self.url("/occupancy-update")).json(request))
            .await?;
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(OccupancyAck::default());
        }
        Ok(serde_json::from_str(&body)?)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| GatewayError::invalid_response(format!("{}: {}", e, body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = BackendClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, 0);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = HttpBackendClient::new(BackendClientConfig {
            base_url: "http://backend:8000/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.url("/entry"), "http://backend:8000/entry");
    }
}
