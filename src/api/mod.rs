//! Prompting network abstraction and request/response types

mod client;
mod request;
mod response;

pub use client::{HttpPromptingNetwork, NetworkConfig};
pub use request::{
    normalize_roles, ChatCompletionRequest, DispatchMode, Message, NetworkRequest, Role,
};
pub use response::{CompletionResult, NetworkReply};

use crate::metrics::UsageError;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network did not answer within {timeout_secs:.1} seconds")]
    Timeout { timeout_secs: f64 },

    #[error("Network returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Usage accounting failed: {0}")]
    Usage(#[from] UsageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether a retry of the same dispatch might succeed.
    ///
    /// Timeouts, transport failures, 5xx and 429 statuses qualify. Client
    /// errors and malformed replies would fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(e) => !e.is_decode() && !e.is_builder(),
            ApiError::Timeout { .. } => true,
            ApiError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// The external network of language-model responders
#[async_trait]
pub trait PromptingNetwork: Send + Sync {
    /// Send the normalized messages and wait for the network's reply
    async fn prompt(&self, request: NetworkRequest) -> Result<NetworkReply, ApiError>;

    /// Name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16) -> ApiError {
        ApiError::Status {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_transient_errors() {
        assert!(ApiError::Timeout { timeout_secs: 24.0 }.is_transient());
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!status(400).is_transient());
        assert!(!status(401).is_transient());
        assert!(!status(404).is_transient());
        assert!(!ApiError::Network("Unrecognized response".into()).is_transient());
        assert!(!ApiError::InvalidRequest("empty".into()).is_transient());
        assert!(!ApiError::Usage(UsageError::UnknownModel("x".into())).is_transient());
    }

    #[test]
    fn test_status_message() {
        let err = ApiError::Status {
            status: 503,
            body: "no validators".into(),
        };
        assert_eq!(err.to_string(), "Network returned 503: no validators");
    }
}
