//! Owner of the live settings snapshot

use crate::domain::{ApiKey, BackendUrl};
use crate::modules::{
    ModuleRegistry, RegistryError, ResponseFilteringOptions, SharedFilteringOptions,
};
use crate::settings::{
    BackendSettings, ConfigSnapshot, SettingsError, SettingsResult, SettingsStore,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Serializes settings writes and publishes the latest snapshot to readers
///
/// Readers clone an `Arc` of the last fully saved snapshot. Writers hold an
/// async mutex across the store call; a failed save leaves the snapshot, the
/// registry and the filtering options as they were.
pub struct ConfigService {
    registry: Arc<ModuleRegistry>,
    filtering: SharedFilteringOptions,
    store: Arc<dyn SettingsStore>,
    current: RwLock<Arc<ConfigSnapshot>>,
    write_lock: Mutex<()>,
}

impl ConfigService {
    /// Merge the stored document over process defaults and apply module flags
    #[instrument(skip_all)]
    pub async fn bootstrap(
        registry: Arc<ModuleRegistry>,
        filtering: SharedFilteringOptions,
        store: Arc<dyn SettingsStore>,
        defaults: BackendSettings,
    ) -> SettingsResult<Self> {
        let stored = store.load().await?;

        let backend = match &stored {
            Some(snapshot) => snapshot.backend.clone(),
            None => defaults,
        };

        if let Some(snapshot) = &stored {
            for (name, enabled) in &snapshot.modules {
                match registry.set_enabled(name, *enabled) {
                    Ok(()) => {}
                    Err(RegistryError::NotFound(_)) => {
                        warn!(module = %name, "Ignoring stored flag for unknown module");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if let Some(options) = stored.as_ref().and_then(|s| s.response_filtering.clone()) {
            filtering.set(options);
        }

        let snapshot = ConfigSnapshot {
            backend,
            modules: Self::module_flags(&registry),
            response_filtering: Some(filtering.get()),
        };
        info!(
            backend = %snapshot.backend.base_url,
            api_key_configured = snapshot.backend.api_key.is_some(),
            stored = stored.is_some(),
            "Settings loaded"
        );

        Ok(Self {
            registry,
            filtering,
            store,
            current: RwLock::new(Arc::new(snapshot)),
            write_lock: Mutex::new(()),
        })
    }

    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.current.read().clone()
    }

    pub fn backend(&self) -> BackendSettings {
        self.current.read().backend.clone()
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn response_filtering(&self) -> ResponseFilteringOptions {
        self.filtering.get()
    }

    #[instrument(skip(self))]
    pub async fn set_module_enabled(&self, name: &str, enabled: bool) -> SettingsResult<()> {
        let _guard = self.write_lock.lock().await;

        let previous = self.registry.is_enabled(name)?;
        self.registry.set_enabled(name, enabled)?;

        let mut next = (*self.snapshot()).clone();
        next.modules = Self::module_flags(&self.registry);

        if let Err(e) = self.store.save(&next).await {
            warn!(module = name, error = %e, "Saving settings failed, reverting module flag");
            self.registry.set_enabled(name, previous)?;
            return Err(e);
        }

        *self.current.write() = Arc::new(next);
        Ok(())
    }

    #[instrument(skip(self, api_key))]
    pub async fn set_backend(
        &self,
        base_url: BackendUrl,
        api_key: Option<ApiKey>,
    ) -> SettingsResult<BackendSettings> {
        let _guard = self.write_lock.lock().await;

        let mut next = (*self.snapshot()).clone();
        next.backend = BackendSettings { base_url, api_key };
        self.store.save(&next).await?;

        info!(backend = %next.backend.base_url, "Backend updated");
        let backend = next.backend.clone();
        *self.current.write() = Arc::new(next);
        Ok(backend)
    }

    /// Replace the filtering overrides; the next request sees the new values
    #[instrument(skip(self))]
    pub async fn set_response_filtering(
        &self,
        options: ResponseFilteringOptions,
    ) -> SettingsResult<ResponseFilteringOptions> {
        options
            .validate()
            .map_err(|(field, reason)| SettingsError::invalid_value(field, reason))?;

        let _guard = self.write_lock.lock().await;

        let mut next = (*self.snapshot()).clone();
        next.response_filtering = Some(options.clone());
        self.store.save(&next).await?;

        self.filtering.set(options.clone());
        *self.current.write() = Arc::new(next);
        info!("Response filtering options updated");
        Ok(options)
    }

    fn module_flags(registry: &ModuleRegistry) -> BTreeMap<String, bool> {
        registry
            .flags()
            .into_iter()
            .map(|(name, enabled)| (name.into_inner(), enabled))
            .collect()
    }
}
