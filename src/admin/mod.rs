//! Admin API consumed by the inspection page
//!
//! Plain request/response endpoints over the module registry, the backend
//! settings, the response filtering overrides and the traffic log. Nothing
//! here touches the pipeline.

use crate::domain::{ApiKey, BackendUrl};
use crate::modules::{ModuleInfo, RegistryError, ResponseFilteringOptions};
use crate::proxy::error_response::{
    admin_error_response, extract_request_id, ErrorResponse, ErrorResponseExt,
};
use crate::proxy::headers::{content_types, paths, CONTENT_TYPE};
use crate::proxy::service::AppState;
use crate::settings::{BackendSettings, SettingsError};
use crate::traffic::{RecordId, RecorderError, RecorderStats, TrafficRecord};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const INSPECTOR_HTML: &str = include_str!("inspector.html");

/// Page size when the caller does not ask for one
pub const DEFAULT_TRAFFIC_LIMIT: usize = 50;

/// Largest page the traffic endpoint returns
pub const MAX_TRAFFIC_LIMIT: usize = 1000;

type AdminResult<T> = Result<T, AdminRejection>;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },
}

impl ErrorResponseExt for AdminError {
    fn to_error_response(&self) -> ErrorResponse {
        let code = match self.status_code() {
            StatusCode::NOT_FOUND => "NOT_FOUND",
            StatusCode::CONFLICT => "CONFLICT",
            StatusCode::BAD_REQUEST => "INVALID_INPUT",
            _ => "INTERNAL_ERROR",
        };
        ErrorResponse::new(code, self.to_string())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AdminError::Settings(SettingsError::Registry(e)) | AdminError::Registry(e) => match e {
                RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
                RegistryError::DuplicateName(_) => StatusCode::CONFLICT,
                RegistryError::InvalidName { .. } => StatusCode::BAD_REQUEST,
            },
            AdminError::Settings(SettingsError::InvalidValue { .. }) => StatusCode::BAD_REQUEST,
            AdminError::Settings(SettingsError::Io(_) | SettingsError::Serialization(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AdminError::Recorder(RecorderError::NotFound(_)) => StatusCode::NOT_FOUND,
            AdminError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

/// Admin failure bound to the request it answers
#[derive(Debug)]
pub struct AdminRejection {
    error: AdminError,
    request_id: Option<String>,
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        admin_error_response(&self.error, self.request_id)
    }
}

fn reject(error: impl Into<AdminError>, headers: &HeaderMap) -> AdminRejection {
    AdminRejection {
        error: error.into(),
        request_id: extract_request_id(headers),
    }
}

/// Routes mounted next to the OpenAI-compatible surface
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(paths::INSPECTOR, get(inspector))
        .route(paths::ADMIN_MODULES, get(list_modules))
        .route(paths::ADMIN_MODULE, put(set_module))
        .route(paths::ADMIN_BACKEND, get(get_backend).put(set_backend))
        .route(
            paths::ADMIN_RESPONSE_FILTERING,
            get(get_response_filtering).put(set_response_filtering),
        )
        .route(paths::ADMIN_TRAFFIC, get(list_traffic).delete(clear_traffic))
        .route(paths::ADMIN_TRAFFIC_RECORD, get(get_traffic_record))
}

async fn inspector() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, content_types::HTML)],
        INSPECTOR_HTML,
    )
}

async fn list_modules(State(state): State<Arc<AppState>>) -> Json<Vec<ModuleInfo>> {
    Json(state.registry.describe())
}

#[derive(Debug, Deserialize)]
pub struct ModuleToggle {
    pub enabled: bool,
}

async fn set_module(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(toggle): Json<ModuleToggle>,
) -> AdminResult<Json<ModuleInfo>> {
    state
        .config
        .set_module_enabled(&name, toggle.enabled)
        .await
        .map_err(|e| reject(e, &headers))?;

    info!(module = %name, enabled = toggle.enabled, "Module toggled via admin API");
    state
        .registry
        .describe_one(&name)
        .map(Json)
        .map_err(|e| reject(e, &headers))
}

/// Backend settings as shown to operators; the key itself never leaves
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendView {
    pub base_url: String,
    pub api_key_configured: bool,
}

impl From<&BackendSettings> for BackendView {
    fn from(settings: &BackendSettings) -> Self {
        Self {
            base_url: settings.base_url.to_string(),
            api_key_configured: settings.api_key.is_some(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BackendUpdate {
    pub base_url: String,
    /// Absent keeps the current key, an empty string clears it
    #[serde(default)]
    pub api_key: Option<String>,
}

async fn get_backend(State(state): State<Arc<AppState>>) -> Json<BackendView> {
    Json(BackendView::from(&state.config.backend()))
}

async fn set_backend(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(update): Json<BackendUpdate>,
) -> AdminResult<Json<BackendView>> {
    let base_url = BackendUrl::try_new(update.base_url).map_err(|e| {
        reject(
            AdminError::InvalidInput {
                field: "base_url",
                reason: e.to_string(),
            },
            &headers,
        )
    })?;

    let api_key = match update.api_key {
        None => state.config.backend().api_key,
        Some(key) if key.trim().is_empty() => None,
        Some(key) => Some(ApiKey::try_new(key).map_err(|e| {
            reject(
                AdminError::InvalidInput {
                    field: "api_key",
                    reason: e.to_string(),
                },
                &headers,
            )
        })?),
    };

    let backend = state
        .config
        .set_backend(base_url, api_key)
        .await
        .map_err(|e| reject(e, &headers))?;
    Ok(Json(BackendView::from(&backend)))
}

async fn get_response_filtering(
    State(state): State<Arc<AppState>>,
) -> Json<ResponseFilteringOptions> {
    Json(state.config.response_filtering())
}

/// Replaces all three overrides; omitted fields are cleared
async fn set_response_filtering(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(options): Json<ResponseFilteringOptions>,
) -> AdminResult<Json<ResponseFilteringOptions>> {
    state
        .config
        .set_response_filtering(options)
        .await
        .map(Json)
        .map_err(|e| reject(e, &headers))
}

#[derive(Debug, Default, Deserialize)]
pub struct TrafficQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TrafficPage {
    pub records: Vec<TrafficRecord>,
    pub stats: RecorderStats,
}

async fn list_traffic(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrafficQuery>,
) -> Json<TrafficPage> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRAFFIC_LIMIT)
        .min(MAX_TRAFFIC_LIMIT);
    let offset = query.offset.unwrap_or(0);

    Json(TrafficPage {
        records: state.recorder.list(limit, offset),
        stats: state.recorder.stats(),
    })
}

async fn get_traffic_record(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> AdminResult<Json<TrafficRecord>> {
    state
        .recorder
        .get(RecordId::new(id))
        .map(Json)
        .map_err(|e| reject(e, &headers))
}

async fn clear_traffic(State(state): State<Arc<AppState>>) -> StatusCode {
    state.recorder.clear();
    info!("Traffic log cleared via admin API");
    StatusCode::NO_CONTENT
}
