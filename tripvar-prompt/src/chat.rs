use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tripvar_core::{ChatMessage, GenerationRequest, Role, Runnable, StreamEvent, TripvarError};

/// Inserted as the first chat message when the caller supplies none.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Provide detailed, well-structured responses.";

/// Which upstream endpoint the payload is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadStyle {
    /// `/v1/chat/completions`: a role-tagged message array.
    Chat,
    /// `/v1/completions`: a single flattened text prompt.
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "style", content = "payload", rename_all = "snake_case")]
pub enum OutboundPayload {
    Messages(Vec<ChatMessage>),
    Text(String),
}

impl OutboundPayload {
    pub fn style(&self) -> PayloadStyle {
        match self {
            OutboundPayload::Messages(_) => PayloadStyle::Chat,
            OutboundPayload::Text(_) => PayloadStyle::Completion,
        }
    }
}

/// Renders a request for the given endpoint style. Pure: the same request
/// always yields the same payload.
pub fn build_payload(
    request: &GenerationRequest,
    style: PayloadStyle,
) -> Result<OutboundPayload, TripvarError> {
    if let Some(prompt) = request.prompt() {
        return Ok(match style {
            PayloadStyle::Completion => OutboundPayload::Text(prompt.to_string()),
            PayloadStyle::Chat => OutboundPayload::Messages(vec![
                ChatMessage::system(DEFAULT_SYSTEM_PROMPT),
                ChatMessage::user(prompt),
            ]),
        });
    }

    let turns: Vec<&ChatMessage> = request
        .messages()
        .iter()
        .filter(|message| !message.content.trim().is_empty())
        .collect();

    let (context, turns) = match turns.split_first() {
        Some((first, rest)) if first.role == Role::System => (Some(first.content.as_str()), rest),
        _ => (None, turns.as_slice()),
    };
    if turns.is_empty() {
        return Err(TripvarError::InvalidRequest(
            "request has no conversational turns to send".to_string(),
        ));
    }

    match style {
        PayloadStyle::Chat => {
            let mut messages = Vec::with_capacity(turns.len() + 1);
            match context {
                Some(context) => messages.push(ChatMessage::system(context)),
                // A system turn later in the history replaces the default.
                None if turns.iter().any(|message| message.role == Role::System) => {}
                None => messages.push(ChatMessage::system(DEFAULT_SYSTEM_PROMPT)),
            }
            messages.extend(turns.iter().map(|message| (*message).clone()));
            Ok(OutboundPayload::Messages(messages))
        }
        PayloadStyle::Completion => Ok(OutboundPayload::Text(transcript(context, turns))),
    }
}

fn transcript(context: Option<&str>, turns: &[&ChatMessage]) -> String {
    let mut text = String::new();
    if let Some(context) = context {
        text.push_str(context);
        text.push_str("\n\n");
    }

    let lines: Vec<String> = turns
        .iter()
        .map(|message| {
            let speaker = match message.role {
                Role::User => "Human",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            format!("{speaker}: {}", message.content)
        })
        .collect();
    text.push_str(&lines.join("\n"));

    if turns.last().map(|message| message.role) == Some(Role::User) {
        text.push_str("\nAssistant: ");
    }
    text
}

#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    style: PayloadStyle,
}

impl PromptBuilder {
    pub fn new(style: PayloadStyle) -> Self {
        Self { style }
    }

    pub fn style(&self) -> PayloadStyle {
        self.style
    }

    pub fn build(&self, request: &GenerationRequest) -> Result<OutboundPayload, TripvarError> {
        build_payload(request, self.style)
    }
}

#[async_trait]
impl Runnable<GenerationRequest, OutboundPayload> for PromptBuilder {
    async fn invoke(&self, input: GenerationRequest) -> Result<OutboundPayload, TripvarError> {
        self.build(&input)
    }

    fn stream(&self, input: GenerationRequest) -> BoxStream<'_, Result<StreamEvent, TripvarError>> {
        futures::stream::once(async move {
            let payload = self.build(&input)?;
            Ok(StreamEvent::Metadata {
                key: "prompt".to_string(),
                value: serde_json::to_value(payload)?,
            })
        })
        .boxed()
    }
}
