use crate::modules::RegistryError;
use crate::proxy::ProxyError;
use crate::settings::SettingsError;
use thiserror::Error;

/// LLM Interceptor application error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Module registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
