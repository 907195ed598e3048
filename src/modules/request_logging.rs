//! Logs a summary of every request and reply passing through

use crate::domain::{ChatRequest, ChatResponse};
use crate::modules::{Module, ModuleResult};
use tracing::info;

pub struct RequestLoggingModule;

impl Module for RequestLoggingModule {
    fn name(&self) -> &str {
        "request_logging"
    }

    fn description(&self) -> &str {
        "Logs incoming requests for debugging"
    }

    fn transform_request(&self, request: ChatRequest) -> ModuleResult<ChatRequest> {
        info!(
            model = %request.model,
            messages = request.messages.len(),
            stream = request.is_streaming(),
            "Incoming chat request"
        );
        Ok(request)
    }

    fn transform_response(&self, response: ChatResponse) -> ModuleResult<ChatResponse> {
        info!(
            model = response.model().unwrap_or("unknown"),
            usage = %response.usage().cloned().unwrap_or_default(),
            choices = response.choices().len(),
            "Outgoing chat response"
        );
        Ok(response)
    }
}
