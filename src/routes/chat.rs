// ABOUTME: Chat route handlers for the retrieval-augmented turn pipeline
// ABOUTME: Streams grounded completions and manages persisted conversations
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! Chat routes
//!
//! `POST /api/chat` runs one turn of the pipeline: resolve the session, embed
//! the latest user message, retrieve similar reviews, assemble the grounding
//! prompt, stream the completion back, and persist the finished transcript.
//! The conversation management endpoints expose the store to the web client.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::SessionUser,
    context::ServerResources,
    errors::AppError,
    llm::{ChatMessage, ChatRequest, ChatStream, StreamChunk},
    models::Conversation,
    security::cookies::get_cookie_value,
};

/// Maximum number of characters of the first message used as the title
const TITLE_MAX_CHARS: usize = 100;

// ============================================================================
// Request Types
// ============================================================================

/// Request body for one chat turn
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    /// Full caller-side message history, oldest first
    pub messages: Vec<ChatMessage>,
    /// Per-request provider key override
    #[serde(default)]
    pub preview_token: Option<String>,
    /// Conversation id; generated when absent
    #[serde(default)]
    pub id: Option<String>,
}

// ============================================================================
// Chat Routes
// ============================================================================

/// Chat routes handler
pub struct ChatRoutes;

impl ChatRoutes {
    /// Create all chat routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/chat", post(Self::chat_turn))
            .route("/api/chat/conversations", get(Self::list_conversations))
            .route("/api/chat/conversations", delete(Self::clear_conversations))
            .route(
                "/api/chat/conversations/:conversation_id",
                get(Self::get_conversation),
            )
            .route(
                "/api/chat/conversations/:conversation_id",
                delete(Self::delete_conversation),
            )
            .route(
                "/api/chat/conversations/:conversation_id/share",
                post(Self::share_conversation),
            )
            .route("/api/shared/:conversation_id", get(Self::get_shared))
            .with_state(resources)
    }

    /// Resolve the caller's session from the bearer header or session cookie
    ///
    /// Runs before any provider call; an unauthenticated request never spends
    /// provider budget.
    async fn authenticate(
        headers: &HeaderMap,
        resources: &Arc<ServerResources>,
    ) -> Result<SessionUser, AppError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(ToOwned::to_owned)
            .or_else(|| get_cookie_value(headers, &resources.config.platform.session_cookie));

        let Some(token) = token else {
            return Err(AppError::auth_required());
        };

        resources
            .sessions
            .resolve(Some(&token))
            .await
            .ok_or_else(|| AppError::auth_invalid("No session for the provided token"))
    }

    /// Derive the conversation title from the first message
    fn derive_title(messages: &[ChatMessage]) -> String {
        messages
            .first()
            .map(|m| m.content.chars().take(TITLE_MAX_CHARS).collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // Turn Pipeline
    // ========================================================================

    /// Run one retrieval-augmented chat turn, streaming the completion
    async fn chat_turn(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Json(request): Json<ChatTurnRequest>,
    ) -> Result<Response, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;

        let latest = request
            .messages
            .last()
            .filter(|m| !m.content.trim().is_empty())
            .ok_or_else(|| {
                AppError::invalid_input("chat turn requires a non-empty latest message")
            })?;

        // An empty preview token means no override, same as an absent one.
        let preview_token = request
            .preview_token
            .as_deref()
            .filter(|t| !t.trim().is_empty());
        let (embedder, llm) = resources.turn_providers(preview_token)?;

        // Embedding and retrieval both abort the turn on failure; the
        // completion provider is never called with an unconditioned prompt.
        let query_embedding = embedder.embed(&latest.content).await?;
        let reviews = resources
            .reviews
            .match_reviews(
                &query_embedding,
                resources.config.retrieval.match_threshold,
                resources.config.retrieval.match_limit,
            )
            .await?;

        let llm_messages = resources
            .template
            .assemble_messages(&reviews, &request.messages);

        let chat_request = ChatRequest::new(llm_messages.clone())
            .with_model(&resources.config.openai.chat_model)
            .with_temperature(resources.config.openai.temperature)
            .with_streaming();

        let mut llm_stream: ChatStream = if llm.capabilities().supports_streaming() {
            llm.complete_stream(&chat_request).await?
        } else {
            let response = llm.complete(&chat_request).await?;
            Box::pin(tokio_stream::once(Ok(StreamChunk {
                delta: response.content,
                is_final: true,
                finish_reason: response.finish_reason,
            })))
        };

        let conversation_id = request
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let title = Self::derive_title(&request.messages);
        let user_id = user.id;
        let store = resources.store.clone();
        let strict_persistence = resources.config.persistence.strict;

        info!(
            conversation_id = %conversation_id,
            reviews = reviews.len(),
            "Starting completion stream"
        );

        // Tokens are forwarded as they arrive. The transcript is persisted
        // only after the provider signals end-of-stream; a provider error or
        // a caller disconnect (which drops this generator) skips persistence
        // and leaves the store untouched.
        let body_stream = async_stream::stream! {
            let mut full_content = String::new();
            let mut aborted = false;

            while let Some(chunk_result) = llm_stream.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        if !chunk.delta.is_empty() {
                            full_content.push_str(&chunk.delta);
                            yield Ok::<Bytes, AppError>(Bytes::from(chunk.delta));
                        }
                        if chunk.is_final {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Completion stream aborted: {e}");
                        aborted = true;
                        break;
                    }
                }
            }

            if aborted {
                return;
            }

            let mut messages = llm_messages;
            messages.push(ChatMessage::assistant(full_content));
            let conversation = Conversation {
                id: conversation_id.clone(),
                title,
                user_id,
                created_at: chrono::Utc::now().timestamp_millis(),
                path: Conversation::path_for(&conversation_id),
                messages,
                share_path: None,
            };

            // Two concurrent turns on the same conversation id race on this
            // upsert; the store keeps whichever transcript lands last. There
            // is no turn sequence number to order them.
            if let Err(e) = store.upsert(&conversation).await {
                if strict_persistence {
                    yield Err(e);
                } else {
                    // The caller already has the full answer; losing the
                    // transcript is logged, not surfaced.
                    warn!(
                        conversation_id = %conversation_id,
                        "Failed to persist conversation: {e}"
                    );
                }
            }
        };

        Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            Body::from_stream(body_stream),
        )
            .into_response())
    }

    // ========================================================================
    // Conversation Management
    // ========================================================================

    /// List the caller's conversations, newest first
    async fn list_conversations(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;
        let conversations = resources.store.list(&user.id).await?;
        Ok((StatusCode::OK, Json(conversations)).into_response())
    }

    /// Get a single conversation owned by the caller
    async fn get_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;

        let conversation = resources
            .store
            .get(&conversation_id)
            .await?
            .filter(|c| c.user_id == user.id)
            .ok_or_else(|| AppError::not_found("Conversation"))?;

        Ok((StatusCode::OK, Json(conversation)).into_response())
    }

    /// Delete a conversation owned by the caller
    async fn delete_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;

        let deleted = resources.store.delete(&conversation_id, &user.id).await?;
        if !deleted {
            return Err(AppError::not_found("Conversation"));
        }

        Ok((StatusCode::NO_CONTENT, ()).into_response())
    }

    /// Delete all of the caller's conversations
    async fn clear_conversations(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
    ) -> Result<Response, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;

        let deleted = resources.store.delete_all(&user.id).await?;
        info!(user_id = %user.id, deleted, "Cleared conversations");

        Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "deleted": deleted })),
        )
            .into_response())
    }

    /// Mark a conversation as shared and return the updated payload
    async fn share_conversation(
        State(resources): State<Arc<ServerResources>>,
        headers: HeaderMap,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let user = Self::authenticate(&headers, &resources).await?;

        let mut conversation = resources
            .store
            .get(&conversation_id)
            .await?
            .filter(|c| c.user_id == user.id)
            .ok_or_else(|| AppError::not_found("Conversation"))?;

        conversation.share_path = Some(Conversation::share_path_for(&conversation_id));
        resources.store.upsert(&conversation).await?;

        Ok((StatusCode::OK, Json(conversation)).into_response())
    }

    /// Fetch a shared conversation (no authentication, share-gated)
    async fn get_shared(
        State(resources): State<Arc<ServerResources>>,
        Path(conversation_id): Path<String>,
    ) -> Result<Response, AppError> {
        let conversation = resources
            .store
            .get_shared(&conversation_id)
            .await?
            .ok_or_else(|| AppError::not_found("Shared conversation"))?;

        Ok((StatusCode::OK, Json(conversation)).into_response())
    }
}
