//! Makes the model answer like a pirate

use crate::domain::{ChatRequest, ChatResponse, MessageContent};
use crate::modules::{Module, ModuleResult};

pub const PIRATE_INSTRUCTION: &str = "Respond like a pirate.";
pub const PIRATE_MARKER: &str = "[Told to respond like a pirate]";

pub struct PirateModeModule;

impl Module for PirateModeModule {
    fn name(&self) -> &str {
        "pirate_mode"
    }

    fn description(&self) -> &str {
        "Makes the AI respond like a pirate (appends an instruction to the last user message)"
    }

    fn enabled_by_default(&self) -> bool {
        false
    }

    fn transform_request(&self, mut request: ChatRequest) -> ModuleResult<ChatRequest> {
        if let Some(message) = request.last_user_message_mut() {
            if message.has_no_content() {
                message.content = Some(MessageContent::Text(PIRATE_INSTRUCTION.to_string()));
            } else if let Some(text) = message.text_mut() {
                text.push_str("\n\n");
                text.push_str(PIRATE_INSTRUCTION);
            }
            // Multi-part content is left alone
        }
        Ok(request)
    }

    fn transform_response(&self, mut response: ChatResponse) -> ModuleResult<ChatResponse> {
        for choice in response.choices_mut() {
            if let Some(text) = choice.message.as_mut().and_then(|m| m.text_mut()) {
                text.push_str("\n\n");
                text.push_str(PIRATE_MARKER);
            }
        }
        Ok(response)
    }

    fn transform_chunk(&self, mut chunk: ChatResponse) -> ModuleResult<ChatResponse> {
        for choice in chunk.choices_mut() {
            if choice.finish_reason().is_none() {
                continue;
            }
            let delta = choice.delta.get_or_insert_with(Default::default);
            match &mut delta.content {
                Some(MessageContent::Text(content)) => {
                    content.push_str("\n\n");
                    content.push_str(PIRATE_MARKER);
                }
                Some(MessageContent::Parts(_)) => {}
                empty => *empty = Some(MessageContent::Text(format!("\n\n{PIRATE_MARKER}"))),
            }
        }
        Ok(chunk)
    }
}
