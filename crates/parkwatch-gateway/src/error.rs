//! Backend gateway error types.

use std::time::Duration;
use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Backend rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GatewayError {
    /// Build from a non-success HTTP status.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            body: body.into(),
        }
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Timeouts, connection failures, 429 and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Timeout(_) => true,
            GatewayError::Network(e) => e.is_timeout() || e.is_connect(),
            GatewayError::Rejected { status, .. } => *status == 429 || *status >= 500,
            GatewayError::InvalidResponse(_) | GatewayError::Json(_) => false,
        }
    }

    /// HTTP status to report in metrics; 0 when no response was received.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Rejected { status, .. } => *status,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(GatewayError::from_http_status(503, "").is_retryable());
        assert!(GatewayError::from_http_status(429, "slow down").is_retryable());
        assert!(!GatewayError::from_http_status(409, "already inside").is_retryable());
        assert!(!GatewayError::from_http_status(404, "no ticket").is_retryable());
        assert!(GatewayError::Timeout(Duration::from_secs(10)).is_retryable());
        assert!(!GatewayError::invalid_response("missing field").is_retryable());
    }
}
