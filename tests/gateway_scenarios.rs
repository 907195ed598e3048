//! End-to-end behaviour of the gateway against a fake backend
//!
//! The router is driven in-process with `oneshot`; the backend is either a
//! mockito server or a small axum app when the test needs to hold a reply.

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use llm_interceptor::config::{OpenAiEnv, Settings};
use llm_interceptor::domain::ChatRequest;
use llm_interceptor::modules::pirate_mode::{PIRATE_INSTRUCTION, PIRATE_MARKER};
use llm_interceptor::modules::{Module, ModuleError, ModuleResult};
use llm_interceptor::proxy::types::RequestSizeLimit;
use llm_interceptor::settings::MemoryStore;
use llm_interceptor::traffic::{RecordStage, TrafficRecord};
use llm_interceptor::Application;
use mockito::{Matcher, Server};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower::ServiceExt;

async fn gateway(backend_url: &str, api_key: Option<&str>) -> Application {
    gateway_with(backend_url, api_key, |_| {}).await
}

async fn gateway_with(
    backend_url: &str,
    api_key: Option<&str>,
    configure: impl FnOnce(&mut Settings),
) -> Application {
    let dir = TempDir::new().unwrap();
    let mut settings = Settings::load(
        dir.path(),
        "test",
        OpenAiEnv {
            base_url: Some(backend_url.to_string()),
            api_key: api_key.map(str::to_string),
        },
    )
    .unwrap();
    configure(&mut settings);

    Application::with_store(settings, Arc::new(MemoryStore::new()))
        .await
        .unwrap()
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn hello() -> Value {
    json!({
        "model": "llama3.1",
        "messages": [{"role": "user", "content": "Hello!"}]
    })
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "llama3.1",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 5, "completion_tokens": 3, "total_tokens": 8}
    })
}

async fn call(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn latest(app: &Application) -> TrafficRecord {
    app.state().recorder.list(1, 0).into_iter().next().unwrap()
}

#[tokio::test]
async fn test_pirate_mode_rewrites_request_and_reply() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::Regex(PIRATE_INSTRUCTION.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("Ahoy").to_string())
        .create_async()
        .await;

    let app = gateway(&format!("{}/v1", server.url()), None).await;
    app.state()
        .config
        .set_module_enabled("pirate_mode", true)
        .await
        .unwrap();

    let (status, body) = call(app.router(), chat_request(hello())).await;

    assert_eq!(status, StatusCode::OK);
    let content = body["choices"][0]["message"]["content"].as_str().unwrap();
    assert!(content.ends_with(PIRATE_MARKER));
    mock.assert_async().await;

    let record = latest(&app);
    assert_eq!(record.stage, RecordStage::Sent);
    assert!(record.module_chain.contains(&"pirate_mode".to_string()));
    assert_ne!(record.request_after, record.request_before);
    let sent = record.request_after.unwrap();
    assert!(sent["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains(PIRATE_INSTRUCTION));
    assert_ne!(record.response_after, record.response_before);
}

#[tokio::test]
async fn test_disabled_pirate_mode_leaves_traffic_untouched() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("Hi there").to_string())
        .create_async()
        .await;

    let app = gateway(&format!("{}/v1", server.url()), None).await;
    let (status, body) = call(app.router(), chat_request(hello())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, completion("Hi there"));

    let record = latest(&app);
    assert!(!record.module_chain.contains(&"pirate_mode".to_string()));
    assert_eq!(record.request_before, record.request_after);
    assert_eq!(record.response_before, record.response_after);
    assert!(record.duration_ms.is_some());
}

#[tokio::test]
async fn test_unreachable_backend_yields_openai_error() {
    let app = gateway("http://127.0.0.1:1/v1", None).await;

    let (status, body) = call(app.router(), chat_request(hello())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["type"], "backend_error");
    assert!(body["error"]["message"].is_string());

    let record = latest(&app);
    assert_eq!(record.stage, RecordStage::Error);
    assert!(record.request_after.is_some());
    assert!(record.response_after.is_none());
    assert!(record.error.is_some());
}

#[tokio::test]
async fn test_upstream_error_status_is_reported() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(503)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"message":"model is loading"}}"#)
        .create_async()
        .await;

    let app = gateway(&format!("{}/v1", server.url()), None).await;
    let (status, body) = call(app.router(), chat_request(hello())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("503"));
    assert!(message.contains("model is loading"));
    assert_eq!(body["error"]["code"], "503");
}

#[derive(Default)]
struct Gate {
    arrived: Notify,
    release: Notify,
}

async fn held_completion(State(gate): State<Arc<Gate>>) -> Json<Value> {
    gate.arrived.notify_one();
    gate.release.notified().await;
    Json(completion("Ahoy"))
}

async fn spawn_backend(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{address}/v1")
}

#[tokio::test]
async fn test_toggle_mid_flight_does_not_affect_call_in_progress() {
    let gate = Arc::new(Gate::default());
    let backend = Router::new()
        .route("/v1/chat/completions", post(held_completion))
        .with_state(Arc::clone(&gate));
    let url = spawn_backend(backend).await;

    let app = gateway(&url, None).await;
    app.state()
        .config
        .set_module_enabled("pirate_mode", true)
        .await
        .unwrap();

    let router = app.router();
    let in_flight = tokio::spawn(call(router, chat_request(hello())));

    gate.arrived.notified().await;
    app.state()
        .config
        .set_module_enabled("pirate_mode", false)
        .await
        .unwrap();
    gate.release.notify_one();

    let (status, body) = in_flight.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(body["choices"][0]["message"]["content"]
        .as_str()
        .unwrap()
        .ends_with(PIRATE_MARKER));

    let record = latest(&app);
    assert!(record.module_chain.contains(&"pirate_mode".to_string()));
    assert!(!app.state().registry.is_enabled("pirate_mode").unwrap());
}

#[tokio::test]
async fn test_streaming_reply_is_transformed_per_chunk() {
    let stream_body = concat!(
        "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Ahoy\"},\"finish_reason\":null}]}\n\n",
        ": keep-alive\n\n",
        "data: {\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
    );

    let mut server = Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(stream_body)
        .create_async()
        .await;

    let app = gateway(&format!("{}/v1", server.url()), None).await;
    app.state()
        .config
        .set_module_enabled("pirate_mode", true)
        .await
        .unwrap();

    let mut request = hello();
    request["stream"] = json!(true);
    let response = app.router().oneshot(chat_request(request)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    let data: Vec<&str> = text
        .split("\n\n")
        .filter_map(|event| event.strip_prefix("data: "))
        .collect();
    assert_eq!(data.last(), Some(&"[DONE]"));
    assert_eq!(data.iter().filter(|d| **d == "[DONE]").count(), 1);

    let chunks: Vec<Value> = data[..data.len() - 1]
        .iter()
        .map(|d| serde_json::from_str(d).unwrap())
        .collect();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0]["choices"][0]["delta"]["content"], "Ahoy");
    assert!(chunks[1]["choices"][0]["delta"]["content"]
        .as_str()
        .unwrap()
        .ends_with(PIRATE_MARKER));
    assert!(text.contains(": keep-alive\n\n"));

    let record = latest(&app);
    assert!(record.streamed);
    assert_eq!(record.stage, RecordStage::Sent);
    assert_eq!(record.response_before.unwrap().as_array().unwrap().len(), 2);
    assert_eq!(record.response_after.unwrap().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_malformed_request_is_rejected_and_recorded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let app = gateway(&format!("{}/v1", server.url()), None).await;
    let request = Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = call(app.router(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request_error");
    mock.assert_async().await;

    let record = latest(&app);
    assert_eq!(record.stage, RecordStage::Error);
    assert_eq!(record.request_before, Some(json!("{not json")));
    assert!(record.request_after.is_none());
}

#[tokio::test]
async fn test_missing_messages_is_rejected() {
    let app = gateway("http://127.0.0.1:1/v1", None).await;

    let (status, body) = call(
        app.router(),
        chat_request(json!({"model": "llama3.1", "messages": []})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("messages"));
}

#[tokio::test]
async fn test_models_are_listed_with_configured_key() {
    let models = json!({
        "object": "list",
        "data": [{"id": "llama3.1", "object": "model", "owned_by": "library"}]
    });

    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/models")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(models.to_string())
        .create_async()
        .await;

    let app = gateway(&format!("{}/v1", server.url()), Some("sk-test")).await;
    let request = Request::builder()
        .uri("/v1/models")
        .header(header::AUTHORIZATION, "Bearer client-key")
        .body(Body::empty())
        .unwrap();

    let (status, body) = call(app.router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, models);
    mock.assert_async().await;
    assert_eq!(latest(&app).endpoint, "/v1/models");
}

#[tokio::test]
async fn test_health_reports_backend_liveness() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"object":"list","data":[]}"#)
        .create_async()
        .await;

    let app = gateway(&format!("{}/v1", server.url()), None).await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = call(app.router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["modules_loaded"], 4);
    assert_eq!(body["backend_alive"], true);

    let down = gateway("http://127.0.0.1:1/v1", None).await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = call(down.router(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert!(body["backend_error"].is_string());
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_admin_module_toggles() {
    let app = gateway("http://127.0.0.1:1/v1", None).await;

    let (status, body) = call(app.router(), get("/api/modules")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "request_logging",
            "content_moderation",
            "response_filtering",
            "pirate_mode"
        ]
    );

    let (status, body) = call(
        app.router(),
        json_request("PUT", "/api/modules/pirate_mode", json!({"enabled": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], true);
    assert!(app.state().registry.is_enabled("pirate_mode").unwrap());

    let (status, body) = call(
        app.router(),
        json_request("PUT", "/api/modules/translation", json!({"enabled": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_admin_backend_update() {
    let app = gateway("http://127.0.0.1:1/v1", Some("sk-old")).await;

    let (status, body) = call(app.router(), get("/api/backend")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["base_url"], "http://127.0.0.1:1/v1");
    assert_eq!(body["api_key_configured"], true);

    let (status, body) = call(
        app.router(),
        json_request("PUT", "/api/backend", json!({"base_url": "not a url"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = call(
        app.router(),
        json_request(
            "PUT",
            "/api/backend",
            json!({"base_url": "https://api.example.com/v1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["base_url"], "https://api.example.com/v1");
    assert_eq!(body["api_key_configured"], true);

    let (status, body) = call(
        app.router(),
        json_request(
            "PUT",
            "/api/backend",
            json!({"base_url": "https://api.example.com/v1", "api_key": ""}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api_key_configured"], false);
    assert!(app.state().config.backend().api_key.is_none());
}

#[tokio::test]
async fn test_admin_traffic_log() {
    let app = gateway("http://127.0.0.1:1/v1", None).await;
    for _ in 0..3 {
        call(app.router(), chat_request(hello())).await;
    }

    let (status, body) = call(app.router(), get("/api/traffic?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"], 3);
    assert_eq!(records[1]["id"], 2);
    assert_eq!(body["stats"]["total_recorded"], 3);

    let (status, body) = call(app.router(), get("/api/traffic/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "error");

    let (status, body) = call(app.router(), get("/api/traffic/999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/traffic")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(app.router(), request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.state().recorder.list(10, 0).is_empty());
}

#[tokio::test]
async fn test_inspector_page_is_served() {
    let app = gateway("http://127.0.0.1:1/v1", None).await;
    let response = app.router().oneshot(get("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("/api/traffic"));
}

#[tokio::test]
async fn test_empty_chain_forwards_the_request_verbatim() {
    let sent = json!({
        "model": "llama3.1",
        "messages": [
            {"role": "system", "content": "Be brief."},
            {"role": "assistant", "content": null, "tool_calls": []},
            {"role": "user"}
        ],
        "temperature": 0,
        "top_p": 1,
        "max_tokens": 64
    });

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::Json(sent.clone()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("Hi").to_string())
        .create_async()
        .await;

    let app = gateway(&format!("{}/v1", server.url()), None).await;
    for module in app.state().registry.describe() {
        app.state()
            .config
            .set_module_enabled(module.name.as_ref(), false)
            .await
            .unwrap();
    }

    let (status, body) = call(app.router(), chat_request(sent.clone())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, completion("Hi"));
    mock.assert_async().await;

    let record = latest(&app);
    assert!(record.module_chain.is_empty());
    assert_eq!(record.request_before, Some(sent.clone()));
    assert_eq!(record.request_after, Some(sent));
    assert_eq!(record.response_before, record.response_after);
}

#[tokio::test]
async fn test_oversized_chat_body_gets_openai_error_and_record() {
    let app = gateway_with("http://127.0.0.1:1/v1", None, |settings| {
        settings.proxy.max_request_bytes = RequestSizeLimit::try_new(64).unwrap();
    })
    .await;

    let mut body = hello();
    body["messages"][0]["content"] = json!("x".repeat(256));
    let (status, body) = call(app.router(), chat_request(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("exceeds 64 bytes"));

    let record = latest(&app);
    assert_eq!(record.stage, RecordStage::Error);
    assert_eq!(record.endpoint, "/v1/chat/completions");
    assert!(record.request_before.is_none());
}

#[tokio::test]
async fn test_admin_body_limit_still_applies() {
    let app = gateway_with("http://127.0.0.1:1/v1", None, |settings| {
        settings.proxy.max_request_bytes = RequestSizeLimit::try_new(64).unwrap();
    })
    .await;

    let request = json_request(
        "PUT",
        "/api/backend",
        json!({"base_url": format!("https://{}.example.com/v1", "a".repeat(128))}),
    );
    let response = app.router().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_response_filtering_options_change_the_next_call() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::PartialJson(
            json!({"temperature": 0.3, "max_tokens": 128}),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("Hi").to_string())
        .create_async()
        .await;

    let app = gateway(&format!("{}/v1", server.url()), None).await;

    let (status, body) = call(app.router(), get("/api/response_filtering")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));

    let (status, body) = call(
        app.router(),
        json_request(
            "PUT",
            "/api/response_filtering",
            json!({"temperature_override": 0.3, "max_tokens_limit": 128}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["temperature_override"], 0.3);

    let (status, _) = call(app.router(), chat_request(hello())).await;
    assert_eq!(status, StatusCode::OK);
    mock.assert_async().await;

    let (status, body) = call(
        app.router(),
        json_request(
            "PUT",
            "/api/response_filtering",
            json!({"temperature_override": 7.5}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
    assert_eq!(
        app.state().config.response_filtering().temperature_override,
        Some(0.3)
    );
}

struct Refusing;

impl Module for Refusing {
    fn name(&self) -> &str {
        "refusing"
    }

    fn description(&self) -> &str {
        "Fails every request transform"
    }

    fn transform_request(&self, mut request: ChatRequest) -> ModuleResult<ChatRequest> {
        request.model.push_str("-leaked");
        Err(ModuleError::new("refusing on purpose"))
    }
}

#[tokio::test]
async fn test_failing_module_is_skipped_and_recorded() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::PartialJson(json!({"model": "llama3.1"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("Hi").to_string())
        .create_async()
        .await;

    let app = gateway(&format!("{}/v1", server.url()), None).await;
    app.state().registry.register(Arc::new(Refusing)).unwrap();

    let (status, body) = call(app.router(), chat_request(hello())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, completion("Hi"));
    mock.assert_async().await;

    let record = latest(&app);
    assert_eq!(record.stage, RecordStage::Sent);
    assert_eq!(record.skipped_modules, vec!["refusing"]);
    assert!(!record.module_chain.contains(&"refusing".to_string()));
    assert!(record.module_chain.contains(&"request_logging".to_string()));
    assert_eq!(record.request_before, record.request_after);
}

#[tokio::test]
async fn test_client_address_is_recorded() {
    let app = gateway("http://127.0.0.1:1/v1", None).await;
    let mut request = chat_request(hello());
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 9], 40_000))));

    call(app.router(), request).await;
    assert_eq!(latest(&app).client_ip.as_deref(), Some("203.0.113.9"));

    call(app.router(), get("/v1/models")).await;
    assert_eq!(latest(&app).client_ip, None);
}
