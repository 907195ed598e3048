//! Pipeline executor
//!
//! Folds the enabled module chain over a request, a buffered response, a
//! single streamed chunk or a model list. Modules run strictly in
//! registration order for every pass. A module that fails is skipped: the
//! value as it stood before that module continues down the chain.

use crate::domain::{ChatRequest, ChatResponse, ModelList};
use crate::modules::{Module, ModuleResult};
use std::sync::Arc;
use tracing::warn;

/// Result of one pass through the chain
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome<T> {
    pub value: T,
    /// Modules whose transform succeeded, in application order
    pub applied: Vec<String>,
    /// Modules whose transform failed and was skipped
    pub skipped: Vec<String>,
}

impl<T> PipelineOutcome<T> {
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Which hook a pass invokes; used for logging only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Request,
    Response,
    Chunk,
    Models,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Request => "request",
            Stage::Response => "response",
            Stage::Chunk => "chunk",
            Stage::Models => "models",
        }
    }
}

/// Stateless executor; the chain is supplied per call
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineExecutor;

impl PipelineExecutor {
    pub fn new() -> Self {
        Self
    }

    pub fn apply_request(
        &self,
        request: ChatRequest,
        modules: &[Arc<dyn Module>],
    ) -> PipelineOutcome<ChatRequest> {
        fold(Stage::Request, request, modules, |m, v| m.transform_request(v))
    }

    pub fn apply_response(
        &self,
        response: ChatResponse,
        modules: &[Arc<dyn Module>],
    ) -> PipelineOutcome<ChatResponse> {
        fold(Stage::Response, response, modules, |m, v| {
            m.transform_response(v)
        })
    }

    pub fn apply_chunk(
        &self,
        chunk: ChatResponse,
        modules: &[Arc<dyn Module>],
    ) -> PipelineOutcome<ChatResponse> {
        fold(Stage::Chunk, chunk, modules, |m, v| m.transform_chunk(v))
    }

    pub fn apply_models(
        &self,
        models: ModelList,
        modules: &[Arc<dyn Module>],
    ) -> PipelineOutcome<ModelList> {
        fold(Stage::Models, models, modules, |m, v| m.transform_models(v))
    }
}

fn fold<T, F>(stage: Stage, initial: T, modules: &[Arc<dyn Module>], hook: F) -> PipelineOutcome<T>
where
    T: Clone,
    F: Fn(&dyn Module, T) -> ModuleResult<T>,
{
    let mut applied = Vec::with_capacity(modules.len());
    let mut skipped = Vec::new();

    let value = modules.iter().fold(initial, |value, module| {
        let before = value.clone();
        match hook(module.as_ref(), value) {
            Ok(next) => {
                applied.push(module.name().to_string());
                next
            }
            Err(e) => {
                warn!(
                    module = module.name(),
                    stage = stage.as_str(),
                    error = %e,
                    "Module transform failed, skipping"
                );
                skipped.push(module.name().to_string());
                before
            }
        }
    });

    PipelineOutcome {
        value,
        applied,
        skipped,
    }
}
