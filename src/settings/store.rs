//! Settings store adapters

use crate::settings::{ConfigSnapshot, SettingsResult, SettingsStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

/// Settings document stored as pretty-printed JSON on disk
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write never leaves a truncated document behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    async fn ensure_parent(&self) -> SettingsResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileStore {
    #[instrument(skip_all)]
    async fn load(&self) -> SettingsResult<Option<ConfigSnapshot>> {
        match fs::read(&self.path).await {
            Ok(bytes) => {
                let snapshot = serde_json::from_slice(&bytes)?;
                debug!(path = %self.path.display(), "Loaded settings document");
                Ok(Some(snapshot))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No settings document yet");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip_all)]
    async fn save(&self, snapshot: &ConfigSnapshot) -> SettingsResult<()> {
        self.ensure_parent().await?;
        let content = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = self.tmp_path();
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, &self.path).await?;
        debug!(path = %self.path.display(), "Saved settings document");
        Ok(())
    }
}

/// Settings kept in memory only; used for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<ConfigSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: ConfigSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    pub fn current(&self) -> Option<ConfigSnapshot> {
        self.snapshot.lock().clone()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn load(&self) -> SettingsResult<Option<ConfigSnapshot>> {
        Ok(self.snapshot.lock().clone())
    }

    async fn save(&self, snapshot: &ConfigSnapshot) -> SettingsResult<()> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }
}
