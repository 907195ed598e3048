//! Type definitions for the proxy module

use nutype::nutype;
use std::time::Duration;
use thiserror::Error;

/// Maximum size for inbound request bodies in bytes
#[nutype(
    derive(Clone, Copy, Debug, Display, Deserialize, Serialize, TryFrom, AsRef, PartialEq, Eq),
    validate(predicate = |size: &usize| *size > 0)
)]
pub struct RequestSizeLimit(usize);

/// Maximum size for buffered backend response bodies in bytes
#[nutype(
    derive(Clone, Copy, Debug, Display, Deserialize, Serialize, TryFrom, AsRef, PartialEq, Eq),
    validate(predicate = |size: &usize| *size > 0)
)]
pub struct ResponseSizeLimit(usize);

/// Timeout applied to the backend call
#[nutype(
    derive(Clone, Copy, Debug, Display, Deserialize, Serialize, TryFrom, AsRef, PartialEq, Eq),
    validate(predicate = |secs: &u64| *secs > 0 && *secs <= 3600)
)]
pub struct TimeoutSecs(u64);

impl TimeoutSecs {
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.into_inner())
    }
}

/// Default limit for request and response bodies
pub const DEFAULT_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// Default backend timeout; local models can take a while to load
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Timeout of the liveness probe made by `/health`
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Proxy configuration
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub max_request_size: RequestSizeLimit,
    pub max_response_size: ResponseSizeLimit,
    /// Bounds connect plus response head, the buffered body read, and each
    /// idle gap between streamed frames
    pub request_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            max_request_size: RequestSizeLimit::try_new(DEFAULT_BODY_LIMIT)
                .expect("10MB is valid"),
            max_response_size: ResponseSizeLimit::try_new(DEFAULT_BODY_LIMIT)
                .expect("10MB is valid"),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Errors that abort a proxied call
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Backend unavailable: {message}")]
    BackendUnavailable {
        /// Upstream status when the backend answered at all
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid backend URL: {0}")]
    InvalidBackendUrl(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            status: None,
            message: message.into(),
        }
    }

    pub fn backend_status(status: u16, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            status: Some(status),
            message: format!("backend returned {status}: {}", message.into()),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::backend(format!("backend timed out after {}s", after.as_secs()))
    }
}

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;
