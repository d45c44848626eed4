use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};
use tripvar_core::{GenerationRequest, Settings, TripvarError};
use tripvar_prompt::OutboundPayload;

use crate::openai_compatible::{
    ChatCompletionRequest, CompletionRequest, OpenAiError, CHAT_COMPLETIONS_PATH,
    CHAT_STOP_SEQUENCE, COMPLETIONS_PATH, FREQUENCY_PENALTY, PRESENCE_PENALTY,
};
use crate::stream::fragment_lines;

/// Raw response lines from a streaming call, in arrival order.
pub type FragmentStream = BoxStream<'static, Result<String, TripvarError>>;

const ERROR_BODY_PREVIEW: usize = 512;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutboundRequest {
    Chat(ChatCompletionRequest),
    Completion(CompletionRequest),
}

impl OutboundRequest {
    /// Applies the request's sampling settings and the fixed penalty constants.
    pub fn new(
        payload: OutboundPayload,
        request: &GenerationRequest,
        model: &str,
        stream: bool,
    ) -> Self {
        match payload {
            OutboundPayload::Messages(messages) => OutboundRequest::Chat(ChatCompletionRequest {
                model: model.to_string(),
                messages,
                temperature: request.temperature(),
                max_tokens: request.max_tokens(),
                stream,
                stop: Some(vec![CHAT_STOP_SEQUENCE.to_string()]),
                frequency_penalty: FREQUENCY_PENALTY,
                presence_penalty: PRESENCE_PENALTY,
            }),
            OutboundPayload::Text(prompt) => OutboundRequest::Completion(CompletionRequest {
                model: model.to_string(),
                prompt,
                max_tokens: request.max_tokens(),
                temperature: request.temperature(),
                stream,
            }),
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            OutboundRequest::Chat(_) => CHAT_COMPLETIONS_PATH,
            OutboundRequest::Completion(_) => COMPLETIONS_PATH,
        }
    }

    pub fn is_streaming(&self) -> bool {
        match self {
            OutboundRequest::Chat(request) => request.stream,
            OutboundRequest::Completion(request) => request.stream,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            OutboundRequest::Chat(request) => &request.model,
            OutboundRequest::Completion(request) => &request.model,
        }
    }
}

pub enum TransportResponse {
    Single(Value),
    Fragments(FragmentStream),
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportResponse::Single(value) => f.debug_tuple("Single").field(value).finish(),
            TransportResponse::Fragments(_) => f.write_str("Fragments(..)"),
        }
    }
}

/// One outbound call to the completion service.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TripvarError>;
}

/// reqwest-backed transport. The client, its pool and the auth header are built
/// once; clones share the pool and the connection limit.
///
/// At most `Settings::max_connections` requests are in flight at once. A
/// streamed response keeps its slot until the fragment stream is dropped.
#[derive(Clone)]
pub struct HttpTransport {
    settings: Settings,
    http: Client,
    permits: Arc<Semaphore>,
}

impl HttpTransport {
    pub fn new(settings: Settings) -> Result<Self, TripvarError> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = settings.api_key() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
                .map_err(|err| TripvarError::InvalidConfig(format!("invalid api key: {err}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .connect_timeout(settings.connect_timeout())
            .timeout(settings.request_timeout())
            .pool_max_idle_per_host(settings.max_connections())
            .default_headers(headers)
            .build()
            .map_err(|err| TripvarError::InvalidConfig(err.to_string()))?;

        let permits = Arc::new(Semaphore::new(settings.max_connections()));
        Ok(Self {
            settings,
            http,
            permits,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit, TripvarError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TripvarError::Network("connection limiter closed".to_string()))
    }

    async fn upstream_error(response: reqwest::Response) -> TripvarError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<OpenAiError>(&body)
            .map(|err| err.error.message)
            .unwrap_or_else(|_| preview(&body));
        TripvarError::Upstream {
            status: Some(status),
            message,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TripvarError> {
        let url = self.settings.endpoint(request.path());
        let timeout = self.settings.request_timeout();
        debug!(url = %url, stream = request.is_streaming(), model = request.model(), "sending completion request");

        let permit = self.acquire().await?;
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;

        if !response.status().is_success() {
            let err = Self::upstream_error(response).await;
            warn!(url = %url, error = %err, "completion service returned an error status");
            return Err(err);
        }

        if request.is_streaming() {
            let chunks = response
                .bytes_stream()
                .map(move |chunk| chunk.map_err(|err| map_reqwest_error(err, timeout)));
            return Ok(TransportResponse::Fragments(holding_permit(
                fragment_lines(chunks),
                permit,
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| map_reqwest_error(err, timeout))?;
        drop(permit);
        let value = serde_json::from_slice::<Value>(&body).map_err(|err| TripvarError::Parse {
            output: preview(&String::from_utf8_lossy(&body)),
            reason: err.to_string(),
        })?;
        Ok(TransportResponse::Single(value))
    }
}

fn holding_permit(lines: FragmentStream, permit: OwnedSemaphorePermit) -> FragmentStream {
    stream::unfold((lines, permit), |(mut lines, permit)| async move {
        let line = lines.next().await?;
        Some((line, (lines, permit)))
    })
    .boxed()
}

fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> TripvarError {
    if err.is_timeout() {
        TripvarError::Timeout(timeout)
    } else {
        TripvarError::Network(err.to_string())
    }
}

fn preview(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_PREVIEW) {
        Some((index, _)) => format!("{}...", &body[..index]),
        None => body.to_string(),
    }
}
