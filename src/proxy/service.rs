//! Gateway state and router
//!
//! `AppState` is built once at startup and shared by every handler through
//! axum's `State` extractor.
//!
//! ```rust,ignore
//! let state = Arc::new(AppState::new(registry, config, recorder, ProxyConfig::default()));
//! let router = build_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, router).await?;
//! ```

use crate::admin;
use crate::modules::ModuleRegistry;
use crate::pipeline::PipelineExecutor;
use crate::proxy::backend::BackendClient;
use crate::proxy::handlers;
use crate::proxy::headers::paths;
use crate::proxy::middleware_stack::ProxyMiddlewareStack;
use crate::proxy::types::ProxyConfig;
use crate::settings::ConfigService;
use crate::traffic::TrafficRecorder;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Process-wide state shared by the gateway and the admin API
pub struct AppState {
    pub registry: Arc<ModuleRegistry>,
    pub config: Arc<ConfigService>,
    pub recorder: Arc<TrafficRecorder>,
    pub backend: BackendClient,
    pub executor: PipelineExecutor,
}

impl AppState {
    pub fn new(
        registry: Arc<ModuleRegistry>,
        config: Arc<ConfigService>,
        recorder: Arc<TrafficRecorder>,
        proxy_config: ProxyConfig,
    ) -> Self {
        Self {
            registry,
            config,
            recorder,
            backend: BackendClient::new(proxy_config),
            executor: PipelineExecutor::new(),
        }
    }
}

/// Router serving the OpenAI-compatible surface, the admin API and the
/// inspection page
pub fn build_router(state: Arc<AppState>) -> Router {
    let stack = ProxyMiddlewareStack::new(state.backend.config().max_request_size);

    let router = Router::new()
        .route(paths::CHAT_COMPLETIONS, post(handlers::chat_completions))
        .route(paths::MODELS, get(handlers::list_models))
        .route(paths::HEALTH, get(handlers::health))
        .merge(stack.limit_body(admin::routes()))
        .with_state(state);

    stack.apply_to_router(router)
}
