//! Transform modules and their registry
//!
//! A module is a named, independently toggleable unit that may rewrite the
//! outbound chat request and the inbound reply. Every hook defaults to the
//! identity, so a module only implements the stages it cares about.

pub mod content_moderation;
pub mod pirate_mode;
pub mod registry;
pub mod request_logging;
pub mod response_filtering;

use crate::domain::{ChatRequest, ChatResponse, ModelList};
use nutype::nutype;
use std::sync::Arc;
use thiserror::Error;

pub use content_moderation::ContentModerationModule;
pub use pirate_mode::PirateModeModule;
pub use registry::{ModuleInfo, ModuleRegistry, RegistryError};
pub use request_logging::RequestLoggingModule;
pub use response_filtering::{
    ResponseFilteringModule, ResponseFilteringOptions, SharedFilteringOptions,
};

/// Unique module identifier, also the key used in the settings document
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 64, regex = r"^[a-z][a-z0-9_]*$"),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display
    )
)]
pub struct ModuleName(String);

/// Failure inside a single module transform
///
/// The executor recovers from these locally; they never reach the client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("module transform failed: {message}")]
pub struct ModuleError {
    pub message: String,
}

impl ModuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type ModuleResult<T> = Result<T, ModuleError>;

/// Capability interface shared by every transform module
pub trait Module: Send + Sync {
    /// Stable identifier, `^[a-z][a-z0-9_]*$`
    fn name(&self) -> &str;

    /// One-line description shown to operators
    fn description(&self) -> &str;

    /// Flag used when the settings document has no entry for this module
    fn enabled_by_default(&self) -> bool {
        true
    }

    fn transform_request(&self, request: ChatRequest) -> ModuleResult<ChatRequest> {
        Ok(request)
    }

    fn transform_response(&self, response: ChatResponse) -> ModuleResult<ChatResponse> {
        Ok(response)
    }

    /// Called once per streamed chunk; terminal chunks carry a `finish_reason`
    fn transform_chunk(&self, chunk: ChatResponse) -> ModuleResult<ChatResponse> {
        Ok(chunk)
    }

    fn transform_models(&self, models: ModelList) -> ModuleResult<ModelList> {
        Ok(models)
    }
}

/// Ordered modules captured for the duration of one call
pub type ModuleChain = Vec<Arc<dyn Module>>;

/// Modules shipped with the proxy, in their canonical application order
pub fn builtin_modules(
    banned_words: &[String],
    filtering: SharedFilteringOptions,
) -> Vec<Arc<dyn Module>> {
    vec![
        Arc::new(RequestLoggingModule),
        Arc::new(ContentModerationModule::new(banned_words)),
        Arc::new(ResponseFilteringModule::new(filtering)),
        Arc::new(PirateModeModule),
    ]
}
