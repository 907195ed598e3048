//! OpenAI-compatible wire types
//!
//! Only the fields the pipeline needs are typed. Everything else a client or
//! backend sends is kept in a flattened `extra` map so that it survives every
//! transform pass untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// Object tag carried by streamed chat chunks
pub const CHUNK_OBJECT: &str = "chat.completion.chunk";

/// Role name for user turns
pub const ROLE_USER: &str = "user";

/// Role name for system turns
pub const ROLE_SYSTEM: &str = "system";

const STREAM_FIELD: &str = "stream";
const TEMPERATURE_FIELD: &str = "temperature";
const MAX_TOKENS_FIELD: &str = "max_tokens";

/// Keeps an explicit `null` apart from a missing field
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Content of a chat message
///
/// OpenAI accepts either plain text or an array of typed content parts.
/// Assistant turns carrying tool calls send an explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<Value>),
    Null,
}

/// One message of a chat conversation
///
/// `content: None` means the key was absent; it stays absent on the way out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<MessageContent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(MessageContent::Text(content.into())),
            extra: Map::new(),
        }
    }

    /// Plain-text content, if the message carries any
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(MessageContent::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Mutable plain-text content, if the message carries any
    pub fn text_mut(&mut self) -> Option<&mut String> {
        match &mut self.content {
            Some(MessageContent::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// True when `content` is missing or `null`
    pub fn has_no_content(&self) -> bool {
        matches!(self.content, None | Some(MessageContent::Null))
    }
}

/// Body of `POST /v1/chat/completions`
///
/// Sampling parameters (`stream`, `temperature`, `max_tokens`, ...) stay in
/// `extra` as the client wrote them, so `0` is never re-emitted as `0.0`.
/// The accessors below read and write them with types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            extra: Map::new(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.extra
            .get(STREAM_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_streaming(&mut self, stream: bool) {
        self.extra.insert(STREAM_FIELD.to_string(), Value::Bool(stream));
    }

    pub fn temperature(&self) -> Option<f64> {
        self.extra.get(TEMPERATURE_FIELD).and_then(Value::as_f64)
    }

    /// Non-finite values cannot be written as JSON and are ignored
    pub fn set_temperature(&mut self, temperature: f64) {
        if let Some(number) = Number::from_f64(temperature) {
            self.extra
                .insert(TEMPERATURE_FIELD.to_string(), Value::Number(number));
        }
    }

    pub fn max_tokens(&self) -> Option<u64> {
        self.extra.get(MAX_TOKENS_FIELD).and_then(Value::as_u64)
    }

    pub fn set_max_tokens(&mut self, max_tokens: u64) {
        self.extra
            .insert(MAX_TOKENS_FIELD.to_string(), Value::Number(max_tokens.into()));
    }

    /// Structural checks an OpenAI backend would reject anyway
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("'model' must be a non-empty string".to_string());
        }
        if self.messages.is_empty() {
            return Err("'messages' must contain at least one message".to_string());
        }
        if let Some(index) = self.messages.iter().position(|m| m.role.trim().is_empty()) {
            return Err(format!("'messages[{index}].role' must be a non-empty string"));
        }
        Ok(())
    }

    /// Last message sent by the user
    pub fn last_user_message_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages
            .iter_mut()
            .rev()
            .find(|message| message.role == ROLE_USER)
    }
}

/// Incremental message fragment of a streamed chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<MessageContent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Delta {
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Some(MessageContent::Text(text)) => Some(text),
            _ => None,
        }
    }
}

/// One completion alternative; `message` for buffered replies, `delta` for chunks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
    /// Outer `None` when the key is absent, inner `None` for `null`
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub finish_reason: Option<Option<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Choice {
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_ref().and_then(Option::as_deref)
    }
}

/// Body of a chat completion reply, or one chunk of a streamed reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Choice>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatResponse {
    pub fn choices(&self) -> &[Choice] {
        self.choices.as_deref().unwrap_or_default()
    }

    pub fn choices_mut(&mut self) -> impl Iterator<Item = &mut Choice> {
        self.choices.iter_mut().flatten()
    }

    /// A chunk is terminal once any choice reports why it finished
    pub fn is_terminal_chunk(&self) -> bool {
        self.choices()
            .iter()
            .any(|choice| choice.finish_reason().is_some())
    }

    pub fn model(&self) -> Option<&str> {
        self.extra.get("model").and_then(Value::as_str)
    }

    pub fn usage(&self) -> Option<&Value> {
        self.extra.get("usage")
    }
}

/// One entry of `GET /v1/models`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `GET /v1/models`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelList {
    #[serde(default = "default_list_object")]
    pub object: String,
    #[serde(default)]
    pub data: Vec<ModelEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_list_object() -> String {
    "list".to_string()
}
