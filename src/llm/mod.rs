// ABOUTME: Provider contracts for chat completion and text embedding
// ABOUTME: Shared message types plus the streaming chunk type the routes consume
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! # Completion and Embedding Providers
//!
//! The pipeline talks to its language-model backends through two narrow
//! traits: [`LlmProvider`] for chat completion (streaming and one-shot) and
//! [`EmbeddingProvider`] for turning query text into a similarity-search key.
//! Production wiring implements both over the OpenAI HTTP API; the test suite
//! substitutes scripted doubles.

mod openai;
pub mod prompts;
pub mod sse_parser;

pub use openai::OpenAiProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

use crate::errors::AppError;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One entry of a conversation transcript
///
/// Transcripts are ordered and replayed verbatim to the completion model, so
/// this type round-trips through the conversation store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Parameters of one completion call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Ordered message sequence sent to the model
    pub messages: Vec<ChatMessage>,
    /// Model override; the provider's default applies when absent
    pub model: Option<String>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Ask the provider to stream tokens as they are generated
    pub stream: bool,
}

impl ChatRequest {
    #[must_use]
    pub const fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: None,
            stream: false,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub const fn with_streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Result of a one-shot (non-streaming) completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The generated assistant message
    pub content: String,
    /// Model that produced it
    pub model: String,
    /// Token accounting when the provider reports it
    pub usage: Option<TokenUsage>,
    /// Why generation stopped
    pub finish_reason: Option<String>,
}

/// Token counts reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// One increment of a streamed completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Text to append to the answer so far
    pub delta: String,
    /// Set on the last chunk of the stream
    pub is_final: bool,
    /// Why generation stopped, when final
    pub finish_reason: Option<String>,
}

impl StreamChunk {
    /// The terminal chunk of a normally completed stream
    #[must_use]
    pub fn done() -> Self {
        Self {
            delta: String::new(),
            is_final: true,
            finish_reason: Some("stop".to_owned()),
        }
    }
}

/// Streamed completion: chunks arrive until a final chunk or an error
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, AppError>> + Send>>;

bitflags::bitflags! {
    /// What a completion provider can do
    ///
    /// Consulted by the turn pipeline, which prefers streaming when the
    /// provider offers it and falls back to one-shot completion otherwise.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct LlmCapabilities: u8 {
        /// Tokens can be streamed as they are generated
        const STREAMING = 1;
        /// System-role messages are honored
        const SYSTEM_MESSAGES = 1 << 1;
        /// An embeddings endpoint is available
        const EMBEDDINGS = 1 << 2;
    }
}

impl LlmCapabilities {
    /// Whether the provider can stream tokens
    #[must_use]
    pub const fn supports_streaming(self) -> bool {
        self.contains(Self::STREAMING)
    }
}

/// Chat completion backend
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider identifier, e.g. `"openai"`
    fn name(&self) -> &'static str;

    /// Feature set of this provider
    fn capabilities(&self) -> LlmCapabilities;

    /// Model used when the request names none
    fn default_model(&self) -> &str;

    /// One-shot completion
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, AppError>;

    /// Streaming completion; chunks arrive as the provider emits them
    async fn complete_stream(&self, request: &ChatRequest) -> Result<ChatStream, AppError>;
}

/// Text embedding backend
///
/// Input must be non-empty; implementations reject empty text before spending
/// a network call.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embedding model identifier
    fn model(&self) -> &str;

    /// Embed one input text into a fixed-length vector
    async fn embed(&self, input: &str) -> Result<Vec<f32>, AppError>;
}
