//! Masks banned words in outbound messages

use crate::domain::ChatRequest;
use crate::modules::{Module, ModuleResult};
use regex::Regex;
use tracing::{error, warn};

pub const FILTERED_PLACEHOLDER: &str = "[FILTERED]";

/// Words masked when no list is configured
pub const DEFAULT_BANNED_WORDS: &[&str] = &["hack", "exploit", "malware"];

pub struct ContentModerationModule {
    pattern: Option<Regex>,
}

impl ContentModerationModule {
    pub fn new(banned_words: &[String]) -> Self {
        let words: Vec<String> = if banned_words.is_empty() {
            DEFAULT_BANNED_WORDS.iter().map(|w| w.to_string()).collect()
        } else {
            banned_words
                .iter()
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .collect()
        };

        if words.is_empty() {
            return Self { pattern: None };
        }

        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = match Regex::new(&format!(r"(?i)\b(?:{alternation})\b")) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                error!(error = %e, "Invalid banned word list, moderation disabled");
                None
            }
        };
        Self { pattern }
    }
}

impl Module for ContentModerationModule {
    fn name(&self) -> &str {
        "content_moderation"
    }

    fn description(&self) -> &str {
        "Filters inappropriate content"
    }

    fn transform_request(&self, mut request: ChatRequest) -> ModuleResult<ChatRequest> {
        let Some(pattern) = &self.pattern else {
            return Ok(request);
        };

        for message in &mut request.messages {
            let Some(text) = message.text_mut() else {
                continue;
            };
            if let Some(found) = pattern.find(text.as_str()) {
                warn!(word = found.as_str(), "Masking banned word");
                *text = pattern.replace_all(text.as_str(), FILTERED_PLACEHOLDER).into_owned();
            }
        }
        Ok(request)
    }
}
