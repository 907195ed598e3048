//! Middleware stack builder for clean composition

use crate::proxy::middleware::{logging_middleware, request_id_middleware};
use crate::proxy::types::RequestSizeLimit;
use axum::{extract::DefaultBodyLimit, middleware::from_fn, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// Builder for composing the tower middleware stack
pub struct ProxyMiddlewareStack {
    max_request_size: RequestSizeLimit,
}

impl ProxyMiddlewareStack {
    pub fn new(max_request_size: RequestSizeLimit) -> Self {
        Self { max_request_size }
    }

    /// Plain 413 body limit for routes that do not speak the OpenAI protocol
    ///
    /// The `/v1` handlers read their bodies through the same limit themselves
    /// so that the rejection carries the OpenAI error envelope.
    pub fn limit_body<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(RequestBodyLimitLayer::new(self.max_request_size.into_inner()))
    }

    /// Apply the complete middleware stack to a router
    ///
    /// Outer to inner:
    /// 1. Request ID generation/propagation
    /// 2. Logging (with request ID)
    pub fn apply_to_router<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            // Limits come from `limit_body` and the handlers, not axum's 2MB default
            .layer(DefaultBodyLimit::disable())
            .layer(from_fn(logging_middleware))
            .layer(from_fn(request_id_middleware))
    }
}
