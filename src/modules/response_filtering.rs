//! Operator overrides for system prompts and sampling parameters

use crate::domain::{ChatRequest, ROLE_SYSTEM};
use crate::modules::{Module, ModuleResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Overrides applied to every outbound request; unset fields leave the request alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseFilteringOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_override: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens_limit: Option<u32>,
}

impl ResponseFilteringOptions {
    /// Range checks an OpenAI backend would reject the request for
    pub fn validate(&self) -> Result<(), (&'static str, String)> {
        if let Some(t) = self.temperature_override {
            if !(0.0..=2.0).contains(&t) {
                return Err(("temperature_override", format!("{t} is outside 0..=2")));
            }
        }
        if self.max_tokens_limit == Some(0) {
            return Err(("max_tokens_limit", "must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Options shared between the module and the settings service
///
/// Writers replace the whole value; each request reads one consistent copy.
#[derive(Debug, Clone, Default)]
pub struct SharedFilteringOptions(Arc<RwLock<ResponseFilteringOptions>>);

impl SharedFilteringOptions {
    pub fn new(options: ResponseFilteringOptions) -> Self {
        Self(Arc::new(RwLock::new(options)))
    }

    pub fn get(&self) -> ResponseFilteringOptions {
        self.0.read().clone()
    }

    pub fn set(&self, options: ResponseFilteringOptions) {
        *self.0.write() = options;
    }
}

pub struct ResponseFilteringModule {
    options: SharedFilteringOptions,
}

impl ResponseFilteringModule {
    pub fn new(options: SharedFilteringOptions) -> Self {
        Self { options }
    }
}

impl Module for ResponseFilteringModule {
    fn name(&self) -> &str {
        "response_filtering"
    }

    fn description(&self) -> &str {
        "Prefixes system prompts and overrides temperature and max tokens"
    }

    fn transform_request(&self, mut request: ChatRequest) -> ModuleResult<ChatRequest> {
        let options = self.options.get();

        if let Some(prefix) = options
            .system_prompt_prefix
            .as_deref()
            .filter(|p| !p.is_empty())
        {
            for message in request
                .messages
                .iter_mut()
                .filter(|m| m.role == ROLE_SYSTEM)
            {
                if let Some(text) = message.text_mut() {
                    *text = format!("{prefix}\n{text}");
                }
            }
        }

        if let Some(temperature) = options.temperature_override {
            request.set_temperature(temperature);
        }

        if let Some(limit) = options.max_tokens_limit.map(u64::from) {
            let capped = request.max_tokens().map_or(limit, |t| t.min(limit));
            request.set_max_tokens(capped);
        }

        Ok(request)
    }
}
