use serde::{Deserialize, Serialize};

use crate::TripvarError;

pub const MAX_TOKENS_LIMIT: u32 = 4096;
const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const MAX_TEMPERATURE: f32 = 2.0;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A text generation request holding either a raw prompt or a chat history, never both.
///
/// Construction is the only place the prompt/messages exclusivity and the numeric bounds
/// are checked, so every value of this type is valid. Deserialization goes through the
/// same checks.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "GenerationRequestBuilder")]
pub struct GenerationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    model: String,
}

impl GenerationRequest {
    pub fn builder() -> GenerationRequestBuilder {
        GenerationRequestBuilder::default()
    }

    pub fn from_prompt(prompt: impl Into<String>) -> Result<Self, TripvarError> {
        Self::builder().prompt(prompt).build()
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Result<Self, TripvarError> {
        Self::builder().messages(messages).build()
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// The requested model id; empty means "use the configured default".
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn resolve_model<'a>(&'a self, default_model: &'a str) -> &'a str {
        if self.model.trim().is_empty() {
            default_model
        } else {
            self.model.as_str()
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GenerationRequestBuilder {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    model: Option<String>,
}

impl GenerationRequestBuilder {
    pub fn prompt(mut self, value: impl Into<String>) -> Self {
        self.prompt = Some(value.into());
        self
    }

    pub fn messages(mut self, value: Vec<ChatMessage>) -> Self {
        self.messages = value;
        self
    }

    pub fn message(mut self, value: ChatMessage) -> Self {
        self.messages.push(value);
        self
    }

    pub fn max_tokens(mut self, value: u32) -> Self {
        self.max_tokens = Some(value);
        self
    }

    pub fn temperature(mut self, value: f32) -> Self {
        self.temperature = Some(value);
        self
    }

    pub fn model(mut self, value: impl Into<String>) -> Self {
        self.model = Some(value.into());
        self
    }

    pub fn build(self) -> Result<GenerationRequest, TripvarError> {
        let prompt = self.prompt.filter(|prompt| !prompt.trim().is_empty());
        let has_messages = self
            .messages
            .iter()
            .any(|message| !message.content.trim().is_empty());

        let (prompt, messages) = match (prompt, has_messages) {
            (None, false) => {
                return Err(TripvarError::InvalidRequest(
                    "either a prompt or at least one non-empty message is required".to_string(),
                ))
            }
            (Some(_), true) => {
                return Err(TripvarError::InvalidRequest(
                    "prompt and messages are mutually exclusive".to_string(),
                ))
            }
            (Some(prompt), false) => (Some(prompt), Vec::new()),
            (None, true) => (None, self.messages),
        };

        let max_tokens = self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        if max_tokens == 0 || max_tokens > MAX_TOKENS_LIMIT {
            return Err(TripvarError::InvalidRequest(format!(
                "max_tokens must be between 1 and {MAX_TOKENS_LIMIT}, got {max_tokens}"
            )));
        }

        let temperature = self.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
            return Err(TripvarError::InvalidRequest(format!(
                "temperature must be between 0.0 and {MAX_TEMPERATURE}, got {temperature}"
            )));
        }

        Ok(GenerationRequest {
            prompt,
            messages,
            max_tokens,
            temperature,
            model: self.model.unwrap_or_default(),
        })
    }
}

impl TryFrom<GenerationRequestBuilder> for GenerationRequest {
    type Error = TripvarError;

    fn try_from(value: GenerationRequestBuilder) -> Result<Self, Self::Error> {
        value.build()
    }
}

/// Finish reasons this crate derives itself. Upstream-reported values pass through untouched.
pub mod finish_reason {
    /// The stream reached its `[DONE]` sentinel without an upstream finish reason.
    pub const DONE: &str = "done";
    /// The connection closed before the `[DONE]` sentinel.
    pub const INCOMPLETE: &str = "incomplete";
    /// A transport error cut the stream short after some text arrived.
    pub const INTERRUPTED: &str = "interrupted";
    pub const UNKNOWN: &str = "unknown";
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UsageSource {
    Reported,
    /// Whitespace word count of the generated text.
    Estimated,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct GenerationResult {
    pub text: String,
    pub tokens_used: u32,
    pub model: String,
    pub finish_reason: String,
    pub usage: UsageSource,
}

impl GenerationResult {
    pub fn estimate_tokens(text: &str) -> u32 {
        u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
    }

    pub fn is_estimated(&self) -> bool {
        self.usage == UsageSource::Estimated
    }
}
