use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde_json::Value;
use tokio::time::timeout;
use tracing::{info, Instrument};
use tripvar_core::{
    finish_reason, GenerationRequest, GenerationResult, RetryPolicy, Runnable, Settings,
    StreamEvent, TripvarError, UsageSource, UserContext,
};
use tripvar_prompt::{build_payload, PayloadStyle};

use crate::openai_compatible::{ChatCompletionResponse, CompletionResponse};
use crate::stream::{assemble_events, consume, AssembledText};
use crate::transport::{HttpTransport, OutboundRequest, Transport, TransportResponse};

/// Free-text generation against the completion service.
///
/// Each call builds the payload, sends it under the retry policy, assembles
/// streamed output when streaming is enabled, and trims the final text. Empty
/// text is an upstream failure, never an empty success.
#[derive(Clone)]
pub struct TextGenerationService {
    transport: Arc<dyn Transport>,
    settings: Settings,
    policy: RetryPolicy,
    style: PayloadStyle,
    streaming: bool,
}

impl TextGenerationService {
    pub fn new(transport: Arc<dyn Transport>, settings: Settings) -> Self {
        Self {
            transport,
            policy: RetryPolicy::from_settings(&settings),
            settings,
            style: PayloadStyle::Chat,
            streaming: false,
        }
    }

    pub fn from_settings(settings: Settings) -> Result<Self, TripvarError> {
        let transport = HttpTransport::new(settings.clone())?;
        Ok(Self::new(Arc::new(transport), settings))
    }

    pub fn with_style(mut self, style: PayloadStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn style(&self) -> PayloadStyle {
        self.style
    }

    /// Entry point for callers acting on behalf of a user.
    pub async fn generate(
        &self,
        user: &UserContext,
        request: GenerationRequest,
    ) -> Result<GenerationResult, TripvarError> {
        user.ensure_active()?;
        let span = tracing::info_span!(
            "generate_text",
            user_id = %user.id,
            user_verified = user.is_verified,
            model = %request.resolve_model(self.settings.default_model()),
            stream = self.streaming,
        );
        self.run(&request).instrument(span).await
    }

    async fn run(&self, request: &GenerationRequest) -> Result<GenerationResult, TripvarError> {
        let deadline = self.settings.request_timeout();
        let result = timeout(deadline, self.policy.execute(|| self.attempt(request)))
            .await
            .map_err(|_| TripvarError::Timeout(deadline))??;

        info!(
            tokens_used = result.tokens_used,
            finish_reason = %result.finish_reason,
            estimated = result.is_estimated(),
            "text generation finished"
        );
        Ok(result)
    }

    fn outbound(
        &self,
        request: &GenerationRequest,
        stream: bool,
    ) -> Result<OutboundRequest, TripvarError> {
        let payload = build_payload(request, self.style)?;
        let model = request.resolve_model(self.settings.default_model());
        Ok(OutboundRequest::new(payload, request, model, stream))
    }

    async fn open_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent, TripvarError>>, TripvarError> {
        let outbound = self.outbound(&request, true)?;
        let model = outbound.model().to_string();
        match self.transport.send(&outbound).await? {
            TransportResponse::Fragments(lines) => Ok(assemble_events(lines)),
            TransportResponse::Single(value) => {
                let result = decode_single(value, self.style, model)?;
                if result.text.is_empty() {
                    return Err(TripvarError::empty_output("completion service"));
                }
                Ok(stream::iter(vec![
                    Ok(StreamEvent::ContentChunk(result.text.clone())),
                    Ok(StreamEvent::FinalAnswer(result.text)),
                ])
                .boxed())
            }
        }
    }

    async fn attempt(&self, request: &GenerationRequest) -> Result<GenerationResult, TripvarError> {
        let outbound = self.outbound(request, self.streaming)?;
        let model = outbound.model().to_string();

        let result = match self.transport.send(&outbound).await? {
            TransportResponse::Single(value) => decode_single(value, self.style, model)?,
            TransportResponse::Fragments(lines) => from_assembled(consume(lines).await?, model),
        };

        if result.text.is_empty() {
            return Err(TripvarError::empty_output("completion service"));
        }
        Ok(result)
    }
}

fn decode_single(
    value: Value,
    style: PayloadStyle,
    model: String,
) -> Result<GenerationResult, TripvarError> {
    let parse_error = |err: serde_json::Error, value: &Value| TripvarError::Parse {
        output: value.to_string(),
        reason: err.to_string(),
    };

    let (text, upstream_finish, usage) = match style {
        PayloadStyle::Completion => {
            let response: CompletionResponse =
                serde_json::from_value(value.clone()).map_err(|err| parse_error(err, &value))?;
            let choice = response.choices.into_iter().next().unwrap_or_default();
            (choice.text, choice.finish_reason, response.usage)
        }
        PayloadStyle::Chat => {
            let response: ChatCompletionResponse =
                serde_json::from_value(value.clone()).map_err(|err| parse_error(err, &value))?;
            let choice = response.choices.into_iter().next().unwrap_or_default();
            (
                choice.message.content.unwrap_or_default(),
                choice.finish_reason,
                response.usage,
            )
        }
    };

    let text = text.trim().to_string();
    let (tokens_used, usage) = token_usage(&text, usage.and_then(|usage| usage.total_tokens));
    Ok(GenerationResult {
        text,
        tokens_used,
        model,
        finish_reason: upstream_finish.unwrap_or_else(|| finish_reason::UNKNOWN.to_string()),
        usage,
    })
}

fn from_assembled(assembled: AssembledText, model: String) -> GenerationResult {
    let text = assembled.text.trim().to_string();
    let (tokens_used, usage) = token_usage(&text, assembled.total_tokens);
    GenerationResult {
        text,
        tokens_used,
        model,
        finish_reason: assembled.finish_reason,
        usage,
    }
}

fn token_usage(text: &str, reported: Option<u32>) -> (u32, UsageSource) {
    match reported {
        Some(total) => (total, UsageSource::Reported),
        None => (
            GenerationResult::estimate_tokens(text),
            UsageSource::Estimated,
        ),
    }
}

#[async_trait]
impl Runnable<GenerationRequest, GenerationResult> for TextGenerationService {
    async fn invoke(&self, input: GenerationRequest) -> Result<GenerationResult, TripvarError> {
        let span = tracing::info_span!(
            "generate_text",
            model = %input.resolve_model(self.settings.default_model()),
            stream = self.streaming,
        );
        self.run(&input).instrument(span).await
    }

    /// Always requests a streamed response and is never retried.
    fn stream(&self, input: GenerationRequest) -> BoxStream<'_, Result<StreamEvent, TripvarError>> {
        stream::once(self.open_stream(input)).try_flatten().boxed()
    }
}
