//! Handlers for the OpenAI-compatible surface
//!
//! Each call walks `received -> request_transformed -> backend_called ->
//! response_transformed -> sent`, updating its traffic record at every step.
//! Any error finalizes the record as `error` with the stages reached so far.
//! A body over the request limit is answered with the OpenAI error envelope
//! like any other malformed request.

use crate::domain::{ChatRequest, ChatResponse, ModelList};
use crate::proxy::backend::BackendRequest;
use crate::proxy::headers::{content_types, paths, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use crate::proxy::service::AppState;
use crate::proxy::streaming::{transform_stream, StreamContext};
use crate::proxy::types::{ProxyError, ProxyResult};
use crate::proxy::url_resolver::BackendEndpoint;
use crate::traffic::RecordId;
use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{Extensions, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// `POST /v1/chat/completions`
pub async fn chat_completions(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let client_ip = client_ip(&parts.extensions);
    let authorization = parts.headers.get(AUTHORIZATION).cloned();

    let body = match read_request_body(&state, body).await {
        Ok(body) => body,
        Err(error) => {
            let record_id = state.recorder.begin(
                Method::POST.as_str(),
                paths::CHAT_COMPLETIONS,
                client_ip,
                None,
                false,
            );
            return fail(&state, record_id, error);
        }
    };

    let parsed = serde_json::from_slice::<Value>(&body);
    let streamed = parsed
        .as_ref()
        .ok()
        .and_then(|v| v.get("stream"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let request_before = match &parsed {
        Ok(value) => value.clone(),
        Err(_) => Value::String(String::from_utf8_lossy(&body).into_owned()),
    };

    let record_id = state.recorder.begin(
        Method::POST.as_str(),
        paths::CHAT_COMPLETIONS,
        client_ip,
        Some(request_before),
        streamed,
    );

    let parsed =
        parsed.map_err(|e| ProxyError::MalformedRequest(format!("body is not valid JSON: {e}")));

    match forward_chat(&state, record_id, parsed, authorization).await {
        Ok(response) => response,
        Err(error) => fail(&state, record_id, error),
    }
}

async fn forward_chat(
    state: &AppState,
    record_id: RecordId,
    parsed: ProxyResult<Value>,
    authorization: Option<HeaderValue>,
) -> ProxyResult<Response> {
    let request: ChatRequest = serde_json::from_value(parsed?)
        .map_err(|e| ProxyError::MalformedRequest(e.to_string()))?;
    request.validate().map_err(ProxyError::MalformedRequest)?;

    // One snapshot for the whole call
    let modules = state.registry.enabled_modules();

    let outcome = state.executor.apply_request(request, &modules);
    state
        .recorder
        .record_module_chain(record_id, outcome.applied);
    state.recorder.record_skipped(record_id, &outcome.skipped);
    let request = outcome.value;
    let request_after = serde_json::to_value(&request)?;
    state
        .recorder
        .record_request_after(record_id, request_after.clone());

    let backend = state.config.backend();
    let response = state
        .backend
        .send(BackendRequest {
            backend: &backend,
            endpoint: BackendEndpoint::ChatCompletions,
            method: Method::POST,
            body: Some(Bytes::from(serde_json::to_vec(&request_after)?)),
            inbound_authorization: authorization,
            expect_stream: request.is_streaming(),
        })
        .await?;

    if request.is_streaming() && crate::proxy::headers::is_event_stream(response.headers()) {
        state.recorder.mark_backend_called(record_id);
        let context = StreamContext::new(Arc::clone(&state.recorder), record_id, modules);
        let relay = transform_stream(
            response.into_body(),
            state.backend.config().request_timeout,
            context,
        );

        return Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, content_types::EVENT_STREAM)
            .header(CACHE_CONTROL, "no-cache")
            .body(Body::from_stream(relay))
            .map_err(|e| ProxyError::Internal(format!("Failed to build stream response: {e}")));
    }

    if request.is_streaming() {
        debug!(%record_id, "Backend answered a stream request with JSON, relaying buffered");
    }

    let response_before = state.backend.read_json(response).await?;
    state
        .recorder
        .record_response_before(record_id, response_before.clone());

    let reply: ChatResponse = serde_json::from_value(response_before).map_err(|e| {
        ProxyError::backend(format!("backend returned an unexpected reply: {e}"))
    })?;
    let outcome = state.executor.apply_response(reply, &modules);
    state.recorder.record_skipped(record_id, &outcome.skipped);

    let response_after = serde_json::to_value(&outcome.value)?;
    state
        .recorder
        .record_response_after(record_id, response_after.clone());
    state.recorder.complete(record_id);

    Ok(Json(response_after).into_response())
}

/// `GET /v1/models`
pub async fn list_models(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let record_id = state.recorder.begin(
        Method::GET.as_str(),
        paths::MODELS,
        client_ip(request.extensions()),
        None,
        false,
    );
    let authorization = request.headers().get(AUTHORIZATION).cloned();

    match forward_models(&state, record_id, authorization).await {
        Ok(response) => response,
        Err(error) => fail(&state, record_id, error),
    }
}

async fn forward_models(
    state: &AppState,
    record_id: RecordId,
    authorization: Option<HeaderValue>,
) -> ProxyResult<Response> {
    let modules = state.registry.enabled_modules();

    let backend = state.config.backend();
    let response = state
        .backend
        .send(BackendRequest {
            backend: &backend,
            endpoint: BackendEndpoint::Models,
            method: Method::GET,
            body: None,
            inbound_authorization: authorization,
            expect_stream: false,
        })
        .await?;

    let response_before = state.backend.read_json(response).await?;
    state
        .recorder
        .record_response_before(record_id, response_before.clone());

    let models: ModelList = serde_json::from_value(response_before).map_err(|e| {
        ProxyError::backend(format!("backend returned an unexpected model list: {e}"))
    })?;
    let outcome = state.executor.apply_models(models, &modules);
    state
        .recorder
        .record_module_chain(record_id, outcome.applied);
    state.recorder.record_skipped(record_id, &outcome.skipped);

    let response_after = serde_json::to_value(&outcome.value)?;
    state
        .recorder
        .record_response_after(record_id, response_after.clone());
    state.recorder.complete(record_id);

    Ok(Json(response_after).into_response())
}

/// Liveness report
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub modules_loaded: usize,
    pub backend_url: String,
    pub backend_alive: bool,
    pub backend_error: Option<String>,
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let backend = state.config.backend();
    let probe = state.backend.probe(&backend).await;

    Json(HealthStatus {
        status: if probe.is_ok() { "healthy" } else { "degraded" },
        modules_loaded: state.registry.len(),
        backend_url: backend.base_url.into_inner(),
        backend_alive: probe.is_ok(),
        backend_error: probe.err(),
    })
}

/// Buffer the inbound body, refusing anything over the request limit
async fn read_request_body(state: &AppState, body: Body) -> ProxyResult<Bytes> {
    let limit = state.backend.config().max_request_size.into_inner();

    Limited::new(body, limit)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                ProxyError::MalformedRequest(format!("request body exceeds {limit} bytes"))
            } else {
                ProxyError::MalformedRequest(format!("failed to read request body: {e}"))
            }
        })
}

/// Set when the server runs with connect info; absent under `oneshot`
fn client_ip(extensions: &Extensions) -> Option<String> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.ip().to_string())
}

fn fail(state: &AppState, record_id: RecordId, error: ProxyError) -> Response {
    warn!(%record_id, error = %error, "Proxied call failed");
    state.recorder.fail(record_id, error.to_string());
    error.into_response()
}
