//! HTTP client for the OpenAI-compatible backend

use crate::proxy::headers::{content_types, ACCEPT, AUTHORIZATION, BEARER_PREFIX, CONTENT_TYPE};
use crate::proxy::types::{ProxyConfig, ProxyError, ProxyResult, HEALTH_PROBE_TIMEOUT};
use crate::proxy::url_resolver::{BackendEndpoint, UrlResolver};
use crate::settings::BackendSettings;
use bytes::Bytes;
use http::{HeaderValue, Method, Request, Response};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest upstream error text quoted back to the client
const MAX_UPSTREAM_MESSAGE_CHARS: usize = 500;

type HttpsClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// One outbound call
#[derive(Debug)]
pub struct BackendRequest<'a> {
    pub backend: &'a BackendSettings,
    pub endpoint: BackendEndpoint,
    pub method: Method,
    pub body: Option<Bytes>,
    /// Inbound `Authorization`, forwarded only when no key is configured
    pub inbound_authorization: Option<HeaderValue>,
    pub expect_stream: bool,
}

/// Pooled HTTP/HTTPS client with the proxy's timeout and size limits
#[derive(Clone)]
pub struct BackendClient {
    client: HttpsClient,
    config: ProxyConfig,
}

impl BackendClient {
    pub fn new(config: ProxyConfig) -> Self {
        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_nodelay(true);
        http_connector.set_connect_timeout(Some(config.request_timeout));

        let https_connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .build(https_connector);

        Self { client, config }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Send a request and return the response once its head arrived
    ///
    /// Non-2xx replies are drained and turned into `BackendUnavailable`.
    pub async fn send(&self, request: BackendRequest<'_>) -> ProxyResult<Response<Incoming>> {
        let uri = UrlResolver::resolve(&request.backend.base_url, request.endpoint)?;
        debug!(%uri, method = %request.method, "Calling backend");

        let accept = if request.expect_stream {
            content_types::EVENT_STREAM
        } else {
            content_types::JSON
        };
        let mut builder = Request::builder()
            .method(request.method)
            .uri(uri)
            .header(ACCEPT, accept);

        if request.body.is_some() {
            builder = builder.header(CONTENT_TYPE, content_types::JSON);
        }

        if let Some(authorization) =
            Self::authorization(request.backend, request.inbound_authorization)?
        {
            builder = builder.header(AUTHORIZATION, authorization);
        }

        let outgoing = builder
            .body(Full::new(request.body.unwrap_or_default()))
            .map_err(|e| ProxyError::Internal(format!("Failed to build backend request: {e}")))?;

        let timeout = self.config.request_timeout;
        let response = tokio::time::timeout(timeout, self.client.request(outgoing))
            .await
            .map_err(|_| ProxyError::timeout(timeout))?
            .map_err(|e| ProxyError::backend(format!("connection error: {}", error_chain(&e))))?;

        let status = response.status();
        if !status.is_success() {
            let body = self.read_body(response).await.unwrap_or_default();
            let message = upstream_message(&body);
            warn!(status = status.as_u16(), message, "Backend returned an error");
            return Err(ProxyError::backend_status(status.as_u16(), message));
        }

        Ok(response)
    }

    /// Buffer a whole response body within the size and time limits
    pub async fn read_body(&self, response: Response<Incoming>) -> ProxyResult<Bytes> {
        let limit = *self.config.max_response_size.as_ref();
        let timeout = self.config.request_timeout;

        let collected = tokio::time::timeout(
            timeout,
            Limited::new(response.into_body(), limit).collect(),
        )
        .await
        .map_err(|_| ProxyError::timeout(timeout))?
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                ProxyError::backend(format!("backend response exceeded {limit} bytes"))
            } else {
                ProxyError::backend(format!("failed to read backend response: {e}"))
            }
        })?;

        Ok(collected.to_bytes())
    }

    /// Buffer a response body and parse it as JSON
    pub async fn read_json(&self, response: Response<Incoming>) -> ProxyResult<Value> {
        let bytes = self.read_body(response).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ProxyError::backend(format!("backend returned invalid JSON: {e}")))
    }

    /// Short liveness check against the model listing
    pub async fn probe(&self, backend: &BackendSettings) -> Result<(), String> {
        let call = async {
            let response = self
                .send(BackendRequest {
                    backend,
                    endpoint: BackendEndpoint::Models,
                    method: Method::GET,
                    body: None,
                    inbound_authorization: None,
                    expect_stream: false,
                })
                .await?;
            self.read_body(response).await.map(|_| ())
        };

        match tokio::time::timeout(HEALTH_PROBE_TIMEOUT, call).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "backend did not answer within {}s",
                HEALTH_PROBE_TIMEOUT.as_secs()
            )),
        }
    }

    fn authorization(
        backend: &BackendSettings,
        inbound: Option<HeaderValue>,
    ) -> ProxyResult<Option<HeaderValue>> {
        match &backend.api_key {
            Some(key) => {
                let mut value = HeaderValue::from_str(&format!("{BEARER_PREFIX}{}", key.as_ref()))
                    .map_err(|_| {
                        ProxyError::Internal("configured API key is not a valid header".into())
                    })?;
                value.set_sensitive(true);
                Ok(Some(value))
            }
            None => Ok(inbound),
        }
    }
}

/// Best-effort human readable message out of an upstream error body
pub fn upstream_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.get("error").filter(|v| v.is_string()))
            .or_else(|| value.get("message"))
            .or_else(|| value.get("detail"))
            .and_then(Value::as_str);
        if let Some(message) = message {
            return truncate(message);
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        "no response body".to_string()
    } else {
        truncate(text)
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_UPSTREAM_MESSAGE_CHARS).collect()
}

/// `Display` of an error followed by its sources
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApiKey, BackendUrl};
    use rstest::rstest;

    fn backend(url: &str, key: Option<&str>) -> BackendSettings {
        BackendSettings {
            base_url: BackendUrl::try_new(url.to_string()).unwrap(),
            api_key: key.map(|k| ApiKey::try_new(k.to_string()).unwrap()),
        }
    }

    fn models_request(backend: &BackendSettings) -> BackendRequest<'_> {
        BackendRequest {
            backend,
            endpoint: BackendEndpoint::Models,
            method: Method::GET,
            body: None,
            inbound_authorization: Some(HeaderValue::from_static("Bearer client-token")),
            expect_stream: false,
        }
    }

    #[rstest]
    #[case(br#"{"error": {"message": "model not found"}}"#.as_slice(), "model not found")]
    #[case(br#"{"error": "rate limited"}"#.as_slice(), "rate limited")]
    #[case(br#"{"detail": "bad gateway"}"#.as_slice(), "bad gateway")]
    #[case(b"upstream exploded".as_slice(), "upstream exploded")]
    #[case(b"".as_slice(), "no response body")]
    fn test_upstream_message(#[case] body: &[u8], #[case] expected: &str) {
        assert_eq!(upstream_message(body), expected);
    }

    #[test]
    fn test_upstream_message_is_truncated() {
        let body = "x".repeat(2000);
        assert_eq!(upstream_message(body.as_bytes()).len(), MAX_UPSTREAM_MESSAGE_CHARS);
    }

    #[tokio::test]
    async fn test_configured_key_replaces_inbound_authorization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/models")
            .match_header("authorization", "Bearer sk-configured")
            .with_status(200)
            .with_body(r#"{"object":"list","data":[]}"#)
            .create_async()
            .await;

        let settings = backend(&format!("{}/v1", server.url()), Some("sk-configured"));
        let client = BackendClient::new(ProxyConfig::default());
        let response = client.send(models_request(&settings)).await.unwrap();
        let body = client.read_json(response).await.unwrap();

        assert_eq!(body["object"], "list");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_inbound_authorization_is_forwarded_without_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/models")
            .match_header("authorization", "Bearer client-token")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let settings = backend(&format!("{}/v1", server.url()), None);
        let client = BackendClient::new(ProxyConfig::default());
        client.send(models_request(&settings)).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_backend_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/models")
            .with_status(503)
            .with_body(r#"{"error": {"message": "model is loading"}}"#)
            .create_async()
            .await;

        let settings = backend(&format!("{}/v1", server.url()), None);
        let client = BackendClient::new(ProxyConfig::default());
        let error = client.send(models_request(&settings)).await.unwrap_err();

        match error {
            ProxyError::BackendUnavailable { status, message } => {
                assert_eq!(status, Some(503));
                assert!(message.contains("model is loading"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_backend_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/models")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let settings = backend(&format!("{}/v1", server.url()), None);
        let client = BackendClient::new(ProxyConfig::default());
        let response = client.send(models_request(&settings)).await.unwrap();

        assert!(matches!(
            client.read_json(response).await,
            Err(ProxyError::BackendUnavailable { status: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_probe_reports_unreachable_backend() {
        let settings = backend("http://127.0.0.1:1/v1", None);
        let client = BackendClient::new(ProxyConfig::default());

        let error = client.probe(&settings).await.unwrap_err();
        assert!(error.contains("Backend unavailable"));
    }
}
