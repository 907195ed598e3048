//! Proxy gateway for OpenAI-compatible backends
//!
//! Every call is recorded, run through the enabled module chain on the way
//! out and on the way back, and relayed to the client. Streamed replies are
//! transformed chunk by chunk as they arrive.

pub mod backend;
pub mod error_response;
pub mod handlers;
pub mod headers;
pub mod middleware;
pub mod middleware_stack;
pub mod service;
pub mod streaming;
pub mod types;
pub mod url_resolver;

pub use service::{build_router, AppState};
pub use types::{ProxyConfig, ProxyError, ProxyResult};
