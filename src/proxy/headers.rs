//! HTTP header constants and utilities for the proxy service
//!
//! This module centralizes the header names, paths and content types used by
//! the gateway and the admin API.

use ::http::header;

/// Header name for request ID used for tracing and correlation
pub const X_REQUEST_ID: &str = "x-request-id";

/// Authorization header prefix for bearer tokens
pub const BEARER_PREFIX: &str = "Bearer ";

/// Standard header re-exports for convenience
pub use header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};

/// Routes served by the gateway
pub mod paths {
    pub const HEALTH: &str = "/health";
    pub const CHAT_COMPLETIONS: &str = "/v1/chat/completions";
    pub const MODELS: &str = "/v1/models";

    pub const ADMIN_MODULES: &str = "/api/modules";
    pub const ADMIN_MODULE: &str = "/api/modules/{name}";
    pub const ADMIN_BACKEND: &str = "/api/backend";
    pub const ADMIN_RESPONSE_FILTERING: &str = "/api/response_filtering";
    pub const ADMIN_TRAFFIC: &str = "/api/traffic";
    pub const ADMIN_TRAFFIC_RECORD: &str = "/api/traffic/{id}";
    pub const INSPECTOR: &str = "/";
}

/// Content types the proxy produces or inspects
pub mod content_types {
    pub const JSON: &str = "application/json";
    pub const EVENT_STREAM: &str = "text/event-stream";
    pub const HTML: &str = "text/html; charset=utf-8";
}

/// True when a `content-type` value names an SSE stream
pub fn is_event_stream(headers: &::http::HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start().starts_with(content_types::EVENT_STREAM))
        .unwrap_or(false)
}
