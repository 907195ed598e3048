use crate::config::Settings;
use crate::modules::{builtin_modules, ModuleRegistry, SharedFilteringOptions};
use crate::proxy::{build_router, AppState};
use crate::settings::{ConfigService, JsonFileStore, SettingsStore};
use crate::traffic::TrafficRecorder;
use crate::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    state: Arc<AppState>,
}

impl Application {
    #[instrument]
    pub async fn new() -> Result<Self> {
        Self::with_settings(Settings::new()?).await
    }

    #[instrument(skip_all)]
    pub async fn with_settings(settings: Settings) -> Result<Self> {
        let store: Arc<dyn SettingsStore> =
            Arc::new(JsonFileStore::new(&settings.storage.settings_path));
        Self::with_store(settings, store).await
    }

    /// Wire every component against an explicit settings store
    pub async fn with_store(settings: Settings, store: Arc<dyn SettingsStore>) -> Result<Self> {
        let filtering = SharedFilteringOptions::new(settings.modules.response_filtering.clone());
        let modules = builtin_modules(
            &settings.modules.content_moderation.banned_words,
            filtering.clone(),
        );
        let registry = Arc::new(ModuleRegistry::with_modules(modules)?);

        let config = Arc::new(
            ConfigService::bootstrap(
                Arc::clone(&registry),
                filtering,
                store,
                settings.backend_defaults(),
            )
            .await?,
        );
        let recorder = Arc::new(TrafficRecorder::new(settings.traffic.capacity));

        info!(
            modules = registry.len(),
            traffic_capacity = %settings.traffic.capacity,
            settings_path = %settings.storage.settings_path.display(),
            "Application initialized"
        );

        let state = Arc::new(AppState::new(
            registry,
            config,
            recorder,
            settings.proxy_config(),
        ));

        Ok(Self { settings, state })
    }

    pub fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }

    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let address = self.settings.bind_address();
        let listener = TcpListener::bind(&address).await?;

        info!(
            address = %address,
            backend = %self.state.config.backend().base_url,
            "Starting LLM Interceptor"
        );

        let service = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, service)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
