// ABOUTME: OpenAI-backed completion and embedding provider over reqwest
// ABOUTME: Streams chat completions via SSE and retries only the initial request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! # OpenAI Provider
//!
//! One client implements both [`LlmProvider`] and [`EmbeddingProvider`]
//! against the OpenAI HTTP API, or any endpoint speaking the same protocol.
//!
//! Transient failures are retried with backoff, but only while establishing
//! the request. A streaming completion is never retried once bytes have
//! flowed: the caller may already hold partial output.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

use super::sse_parser::sse_chunk_stream;
use super::{
    ChatMessage, ChatRequest, ChatResponse, ChatStream, EmbeddingProvider, LlmCapabilities,
    LlmProvider, StreamChunk, TokenUsage,
};
use crate::config::environment::OpenAiConfig;
use crate::errors::{AppError, ErrorCode};

/// How long to wait for a TCP connection to the provider
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Overall request deadline, long enough to cover a full streamed answer
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Backoff policy for the initial provider request
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first failure; zero disables retrying
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Ceiling the exponential backoff never exceeds, in milliseconds
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Three retries, half a second doubling up to five seconds
    #[must_use]
    pub const fn default_config() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }

    /// Delay before the given retry attempt, doubling and capped
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let doubled = self
            .initial_delay_ms
            .saturating_mul(1_u64 << attempt.min(16));
        Duration::from_millis(doubled.min(self.max_delay_ms))
    }
}

/// Statuses worth retrying: throttling and transient gateway failures
const fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503)
}

/// Transport failures worth retrying: never got a response to begin with
fn is_retryable_request_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

// Wire types for the chat/completions and embeddings endpoints.

#[derive(Debug, Serialize)]
struct WireChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireStreamChunk {
    choices: Vec<WireStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct WireStreamChoice {
    delta: WireDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct WireEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingResponse {
    data: Vec<WireEmbedding>,
}

#[derive(Debug, Deserialize)]
struct WireEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

/// Chat completion and embeddings over the OpenAI API
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
    retry: RetryConfig,
}

impl OpenAiProvider {
    /// Build a provider from its configuration
    ///
    /// # Errors
    ///
    /// Fails on an empty API key or if the HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self, AppError> {
        if config.api_key.trim().is_empty() {
            return Err(AppError::config("OpenAI API key must not be empty"));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            retry: RetryConfig::default_config(),
        })
    }

    fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint
        )
    }

    /// Map a non-success response body onto our error taxonomy
    ///
    /// Provider-side failures land on 5xx-class codes without exception, so a
    /// rejected provider key never reads as a caller authentication failure.
    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> AppError {
        let detail = serde_json::from_str::<WireErrorResponse>(body)
            .map(|r| {
                let kind = r.error.error_type.unwrap_or_else(|| "unknown".to_owned());
                format!("{kind} - {}", r.error.message)
            })
            .unwrap_or_else(|_| body.chars().take(200).collect::<String>());

        match status.as_u16() {
            401 | 403 => AppError::new(
                ErrorCode::ExternalAuthFailed,
                format!("OpenAI rejected the API key: {detail}"),
            ),
            429 => AppError::new(
                ErrorCode::ExternalRateLimited,
                "OpenAI rate limit reached. Please wait a moment and try again.",
            ),
            _ => AppError::external_service("OpenAI", format!("API error ({status}): {detail}")),
        }
    }

    fn transport_error(e: &reqwest::Error) -> AppError {
        if e.is_connect() {
            AppError::external_service("OpenAI", "Cannot connect to the provider endpoint")
        } else {
            AppError::external_service("OpenAI", format!("Request failed: {e}"))
        }
    }

    /// Issue the request, backing off on transient failures
    ///
    /// Only a success status comes back as `Ok`; once retries are exhausted,
    /// the last error body is mapped through [`Self::parse_error_response`].
    async fn send_with_retry(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, AppError> {
        let mut attempt = 0;
        loop {
            let req = request
                .try_clone()
                .ok_or_else(|| AppError::internal("Request body is not replayable"))?;

            match req.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    if is_retryable_status(status.as_u16()) && attempt < self.retry.max_retries {
                        attempt += 1;
                        let delay = self.retry.delay_for_attempt(attempt);
                        warn!("OpenAI returned {status}, retry {attempt} in {delay:?}");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    let body = response.text().await.unwrap_or_default();
                    return Err(Self::parse_error_response(status, &body));
                }
                Err(e) => {
                    if is_retryable_request_error(&e) && attempt < self.retry.max_retries {
                        attempt += 1;
                        let delay = self.retry.delay_for_attempt(attempt);
                        warn!("OpenAI request error ({e}), retry {attempt} in {delay:?}");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    error!("OpenAI request failed: {e}");
                    return Err(Self::transport_error(&e));
                }
            }
        }
    }

    /// Decode one streamed payload; `None` for frames carrying no choice
    fn parse_stream_data(json_str: &str) -> Option<Result<StreamChunk, AppError>> {
        match serde_json::from_str::<WireStreamChunk>(json_str) {
            Ok(chunk) => {
                let choice = chunk.choices.into_iter().next()?;
                Some(Ok(StreamChunk {
                    delta: choice.delta.content.unwrap_or_default(),
                    is_final: choice.finish_reason.is_some(),
                    finish_reason: choice.finish_reason,
                }))
            }
            Err(e) => {
                warn!("Failed to parse stream chunk: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::STREAMING | LlmCapabilities::SYSTEM_MESSAGES | LlmCapabilities::EMBEDDINGS
    }

    fn default_model(&self) -> &str {
        &self.config.chat_model
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.chat_model)))]
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError> {
        let model = request.model.as_deref().unwrap_or(&self.config.chat_model);

        let body = WireChatRequest {
            model: model.to_owned(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            stream: false,
        };

        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body);

        let response = self.send_with_retry(http_request).await?;
        let parsed: WireChatResponse = response.json().await.map_err(|e| {
            AppError::external_service("OpenAI", format!("Failed to parse response: {e}"))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::external_service("OpenAI", "API returned no choices"))?;

        let content = choice.message.content.unwrap_or_default();
        debug!(
            "Completion finished: {} chars, finish_reason: {:?}",
            content.len(),
            choice.finish_reason
        );

        Ok(ChatResponse {
            content,
            model: parsed.model,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason,
        })
    }

    #[instrument(skip(self, request), fields(model = %request.model.as_deref().unwrap_or(&self.config.chat_model)))]
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError> {
        let model = request.model.as_deref().unwrap_or(&self.config.chat_model);

        let body = WireChatRequest {
            model: model.to_owned(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            temperature: request.temperature,
            stream: true,
        };

        let http_request = self
            .client
            .post(self.api_url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body);

        let response = self.send_with_retry(http_request).await?;
        debug!("Streaming completion accepted by provider");

        Ok(sse_chunk_stream(
            response.bytes_stream(),
            Self::parse_stream_data,
            "OpenAI",
        ))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn model(&self) -> &str {
        &self.config.embedding_model
    }

    #[instrument(skip(self, input), fields(model = %self.config.embedding_model, input_len = input.len()))]
    async fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        if input.trim().is_empty() {
            return Err(AppError::invalid_input(
                "embedding input must be non-empty text",
            ));
        }

        let body = WireEmbeddingRequest {
            model: &self.config.embedding_model,
            input,
        };

        let http_request = self
            .client
            .post(self.api_url("embeddings"))
            .bearer_auth(&self.config.api_key)
            .json(&body);

        let response = self.send_with_retry(http_request).await?;
        let mut parsed: WireEmbeddingResponse = response.json().await.map_err(|e| {
            AppError::external_service("OpenAI", format!("Failed to parse embedding response: {e}"))
        })?;

        parsed.data.sort_by_key(|entry| entry.index);
        parsed
            .data
            .into_iter()
            .next()
            .map(|entry| entry.embedding)
            .ok_or_else(|| AppError::external_service("OpenAI", "API returned no embedding"))
    }
}
