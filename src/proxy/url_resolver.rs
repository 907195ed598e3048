//! Backend URL resolution

use crate::domain::BackendUrl;
use crate::proxy::types::{ProxyError, ProxyResult};
use hyper::Uri;

/// Backend routes the gateway forwards to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendEndpoint {
    ChatCompletions,
    Models,
}

impl BackendEndpoint {
    /// Path relative to the backend base URL
    pub fn path(self) -> &'static str {
        match self {
            BackendEndpoint::ChatCompletions => "chat/completions",
            BackendEndpoint::Models => "models",
        }
    }
}

/// Strategy for composing backend URIs
pub struct UrlResolver;

impl UrlResolver {
    /// Join the base URL, which already carries the API version prefix, with
    /// the endpoint path
    pub fn resolve(base_url: &BackendUrl, endpoint: BackendEndpoint) -> ProxyResult<Uri> {
        let joined = format!(
            "{}/{}",
            base_url.as_ref().trim_end_matches('/'),
            endpoint.path()
        );

        joined
            .parse::<Uri>()
            .map_err(|e| ProxyError::InvalidBackendUrl(format!("'{joined}': {e}")))
    }
}
