//! Process configuration
//!
//! Layered as: built-in defaults, then optional `config/default`,
//! `config/{ENVIRONMENT}` and `config/local` files, then `LLM_INTERCEPTOR__*`
//! environment variables, then `OPENAI_BASE_URL` / `OPENAI_API_KEY`.

use crate::domain::{ApiKey, BackendUrl, Host, LogLevel, Port, RecorderCapacity};
use crate::modules::ResponseFilteringOptions;
use crate::proxy::types::{
    ProxyConfig, RequestSizeLimit, ResponseSizeLimit, TimeoutSecs, DEFAULT_BODY_LIMIT,
    DEFAULT_TIMEOUT_SECS,
};
use crate::settings::BackendSettings;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

pub use config::ConfigError;

const ENV_PREFIX: &str = "LLM_INTERCEPTOR";
const BANNED_WORDS_KEY: &str = "modules.content_moderation.banned_words";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub backend: BackendConfig,
    pub proxy: ProxyLimits,
    pub traffic: TrafficSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
    #[serde(default)]
    pub modules: ModuleSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: Host,
    pub port: Port,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub base_url: BackendUrl,
    #[serde(default)]
    pub api_key: Option<ApiKey>,
    pub timeout_secs: TimeoutSecs,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxyLimits {
    pub max_request_bytes: RequestSizeLimit,
    pub max_response_bytes: ResponseSizeLimit,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrafficSettings {
    pub capacity: RecorderCapacity,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    /// JSON document holding the operator's backend and module choices
    pub settings_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: LogLevel,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModuleSettings {
    #[serde(default)]
    pub response_filtering: ResponseFilteringOptions,
    #[serde(default)]
    pub content_moderation: ContentModerationSettings,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ContentModerationSettings {
    /// Empty means the built-in list
    #[serde(default)]
    pub banned_words: Vec<String>,
}

/// Variables honoured for compatibility with OpenAI client tooling
#[derive(Debug, Clone, Default)]
pub struct OpenAiEnv {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl OpenAiEnv {
    pub fn from_env() -> Self {
        Self {
            base_url: non_blank(env::var("OPENAI_BASE_URL").ok()),
            api_key: non_blank(env::var("OPENAI_API_KEY").ok()),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        Self::load(Path::new("config"), &environment, OpenAiEnv::from_env())
    }

    /// Build settings from `config_dir` plus the process environment
    pub fn load(
        config_dir: &Path,
        environment: &str,
        openai: OpenAiEnv,
    ) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("backend.base_url", BackendUrl::default().into_inner())?
            .set_default("backend.timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("proxy.max_request_bytes", DEFAULT_BODY_LIMIT as u64)?
            .set_default("proxy.max_response_bytes", DEFAULT_BODY_LIMIT as u64)?
            .set_default(
                "traffic.capacity",
                RecorderCapacity::default().into_inner() as u64,
            )?
            .set_default("storage.settings_path", "config.json")?
            .set_default("logging.level", "info")?
            .add_source(File::from(config_dir.join("default")).required(false))
            .add_source(File::from(config_dir.join(environment)).required(false))
            .add_source(File::from(config_dir.join("local")).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key(BANNED_WORDS_KEY)
                    .try_parsing(true),
            )
            .set_override_option("backend.base_url", openai.base_url)?
            .set_override_option("backend.api_key", openai.api_key)?
            .build()?;

        config.try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            max_request_size: self.proxy.max_request_bytes,
            max_response_size: self.proxy.max_response_bytes,
            request_timeout: self.backend.timeout_secs.as_duration(),
        }
    }

    /// Backend used until the operator saves one through the admin API
    pub fn backend_defaults(&self) -> BackendSettings {
        BackendSettings {
            base_url: self.backend.base_url.clone(),
            api_key: self.backend.api_key.clone(),
        }
    }
}
