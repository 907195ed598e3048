//! Unified error response handling
//!
//! Calls on the OpenAI-compatible surface fail with the OpenAI error envelope
//! so that existing client libraries surface the message. The admin API uses
//! the `{code, message, request_id}` body.

use crate::proxy::headers::X_REQUEST_ID;
use crate::proxy::types::ProxyError;
use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard error response format for the admin API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Unique error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Request ID for correlation
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Convert to HTTP response with proper headers
    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        let request_id = self.request_id.clone();
        let mut response = (status, Json(self)).into_response();

        if let Some(id) = request_id {
            if let Ok(header_value) = HeaderValue::from_str(&id) {
                response.headers_mut().insert(X_REQUEST_ID, header_value);
            }
        }

        response
    }
}

/// Body of an OpenAI-style error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiError {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub param: Option<String>,
    pub code: Option<String>,
}

/// `{"error": {...}}` envelope returned on `/v1` routes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiErrorEnvelope {
    pub error: OpenAiError,
}

impl OpenAiErrorEnvelope {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: OpenAiError {
                message: message.into(),
                kind: kind.into(),
                param: None,
                code: None,
            },
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error.code = Some(code.into());
        self
    }
}

/// Extension trait for consistent error formatting
pub trait ErrorResponseExt {
    /// Convert to standardized error response
    fn to_error_response(&self) -> ErrorResponse;

    /// Get the appropriate HTTP status code
    fn status_code(&self) -> StatusCode;
}

impl ProxyError {
    /// OpenAI error `type` for this failure
    pub fn openai_type(&self) -> &'static str {
        match self {
            ProxyError::MalformedRequest(_) => "invalid_request_error",
            ProxyError::BackendUnavailable { .. } => "backend_error",
            _ => "internal_error",
        }
    }

    pub fn to_openai_error(&self) -> OpenAiErrorEnvelope {
        let envelope = OpenAiErrorEnvelope::new(self.openai_type(), self.to_string());
        match self {
            ProxyError::BackendUnavailable {
                status: Some(status),
                ..
            } => envelope.with_code(status.to_string()),
            _ => envelope,
        }
    }
}

impl ErrorResponseExt for ProxyError {
    fn to_error_response(&self) -> ErrorResponse {
        use ProxyError::*;

        match self {
            MalformedRequest(msg) => ErrorResponse::new("MALFORMED_REQUEST", msg.clone()),
            BackendUnavailable { message, .. } => {
                ErrorResponse::new("BACKEND_UNAVAILABLE", message.clone())
            }
            InvalidBackendUrl(msg) => {
                ErrorResponse::new("INVALID_BACKEND_URL", format!("Invalid backend URL: {msg}"))
            }
            Serialization(e) => {
                ErrorResponse::new("SERIALIZATION_ERROR", format!("Serialization error: {e}"))
            }
            Internal(msg) => ErrorResponse::new("INTERNAL_ERROR", msg.clone()),
        }
    }

    fn status_code(&self) -> StatusCode {
        use ProxyError::*;

        match self {
            MalformedRequest(_) => StatusCode::BAD_REQUEST,
            BackendUnavailable { .. } => StatusCode::BAD_GATEWAY,
            InvalidBackendUrl(_) | Serialization(_) | Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error conversion for the OpenAI-compatible routes
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_openai_error())).into_response()
    }
}

/// Render any error as an admin API response correlated with the request
pub fn admin_error_response(
    error: &impl ErrorResponseExt,
    request_id: Option<String>,
) -> Response {
    let mut body = error.to_error_response();
    if let Some(id) = request_id {
        body = body.with_request_id(id);
    }
    body.into_response_with_status(error.status_code())
}

/// Helper to extract request ID from headers
pub fn extract_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}
