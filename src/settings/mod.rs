//! Persisted operator settings
//!
//! The settings document holds the backend target, the module flags and the
//! response filtering overrides. It is read once at startup and overwritten
//! wholesale on every change made through the admin API.

pub mod service;
pub mod store;

use crate::domain::{ApiKey, BackendUrl};
use crate::modules::{RegistryError, ResponseFilteringOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub use service::ConfigService;
pub use store::{JsonFileStore, MemoryStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub base_url: BackendUrl,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKey>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: BackendUrl::default(),
            api_key: None,
        }
    }
}

/// Whole settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub modules: BTreeMap<String, bool>,
    /// `None` until an operator saves overrides; startup settings apply meanwhile
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_filtering: Option<ResponseFilteringOptions>,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings document is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl SettingsError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Persistence port for the settings document
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// `None` when nothing has been saved yet
    async fn load(&self) -> SettingsResult<Option<ConfigSnapshot>>;

    /// Replace the stored document
    async fn save(&self, snapshot: &ConfigSnapshot) -> SettingsResult<()>;
}
