// ABOUTME: Shared test fixtures: counting provider doubles and resource wiring
// ABOUTME: Builds ServerResources over an in-memory store with scripted externals

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use revu_server::auth::{SessionService, SessionUser};
use revu_server::config::environment::{
    DatabaseConfig, DatabaseUrl, Environment, OpenAiConfig, PersistenceConfig, PlatformConfig,
    RetrievalConfig, ServerConfig,
};
use revu_server::context::{ServerResources, ServerResourcesBuilder};
use revu_server::database::{self, ChatStore};
use revu_server::errors::AppError;
use revu_server::llm::{
    ChatRequest, ChatResponse, ChatStream, EmbeddingProvider, LlmCapabilities, LlmProvider,
    StreamChunk,
};
use revu_server::retrieval::{ReviewRecord, ReviewSearch};

// ============================================================================
// Fixtures
// ============================================================================

/// Server configuration that never reaches the network
pub fn test_config() -> ServerConfig {
    ServerConfig {
        http_port: 0,
        environment: Environment::Testing,
        database: DatabaseConfig {
            url: DatabaseUrl::Memory,
        },
        platform: PlatformConfig {
            base_url: "http://localhost:54321".to_owned(),
            anon_key: "test-anon-key".to_owned(),
            session_cookie: "sb-access-token".to_owned(),
        },
        openai: OpenAiConfig {
            base_url: "http://localhost:9999/v1".to_owned(),
            api_key: "sk-test".to_owned(),
            chat_model: "gpt-3.5-turbo".to_owned(),
            embedding_model: "text-embedding-ada-002".to_owned(),
            temperature: 0.7,
        },
        retrieval: RetrievalConfig {
            match_threshold: 0.8,
            match_limit: 20,
        },
        persistence: PersistenceConfig { strict: false },
    }
}

/// Open a fresh in-memory pool with the schema applied
pub async fn test_pool() -> sqlx::SqlitePool {
    database::connect(&DatabaseUrl::Memory)
        .await
        .expect("failed to open in-memory store")
}

/// Open a fresh in-memory conversation store
pub async fn test_store() -> ChatStore {
    ChatStore::new(test_pool().await)
}

/// A caller identity for tests
pub fn test_user() -> SessionUser {
    SessionUser {
        id: "user-1".to_owned(),
        email: Some("tester@example.com".to_owned()),
        name: Some("Tester".to_owned()),
    }
}

/// A review record with predictable content
pub fn sample_review(n: usize) -> ReviewRecord {
    ReviewRecord {
        title: format!("Review {n}"),
        likes: "quick setup".to_owned(),
        dislikes: "confusing billing".to_owned(),
        problem: "pipeline visibility".to_owned(),
        recommendations: "start small".to_owned(),
        link: Some(format!("https://example.com/reviews/{n}")),
        similarity: 0.85,
        business_size: None,
        job_title: None,
        date: None,
    }
}

// ============================================================================
// Service Doubles
// ============================================================================

/// Session service that resolves every token to a fixed identity (or none)
pub struct StaticSessions {
    user: Option<SessionUser>,
}

impl StaticSessions {
    pub fn authenticated(user: SessionUser) -> Arc<Self> {
        Arc::new(Self { user: Some(user) })
    }

    pub fn unauthenticated() -> Arc<Self> {
        Arc::new(Self { user: None })
    }
}

#[async_trait]
impl SessionService for StaticSessions {
    async fn resolve(&self, access_token: Option<&str>) -> Option<SessionUser> {
        access_token?;
        self.user.clone()
    }
}

/// Embedding double that counts calls and either succeeds or fails
pub struct CountingEmbedder {
    pub calls: AtomicUsize,
    fail: bool,
}

impl CountingEmbedder {
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: true,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    fn model(&self) -> &str {
        "text-embedding-ada-002"
    }

    async fn embed(&self, input: &str) -> Result<Vec<f32>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::external_service("OpenAI", "embedding quota exhausted"));
        }
        assert!(!input.trim().is_empty());
        Ok(vec![0.1; 8])
    }
}

/// Review search double that records parameters and counts calls
pub struct CountingReviewSearch {
    pub calls: AtomicUsize,
    pub last_params: Mutex<Option<(f32, u32)>>,
    reviews: Vec<ReviewRecord>,
    fail: bool,
}

impl CountingReviewSearch {
    pub fn returning(reviews: Vec<ReviewRecord>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_params: Mutex::new(None),
            reviews,
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            last_params: Mutex::new(None),
            reviews: Vec::new(),
            fail: true,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> Option<(f32, u32)> {
        *self.last_params.lock().unwrap()
    }
}

#[async_trait]
impl ReviewSearch for CountingReviewSearch {
    async fn match_reviews(
        &self,
        _query_embedding: &[f32],
        threshold: f32,
        limit: u32,
    ) -> Result<Vec<ReviewRecord>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some((threshold, limit));
        if self.fail {
            return Err(AppError::external_service("review search", "index offline"));
        }
        Ok(self.reviews.clone())
    }
}

/// One scripted event of the completion stream
#[derive(Clone)]
pub enum ScriptedChunk {
    Delta(&'static str),
    Error(&'static str),
}

/// Completion provider double replaying a scripted token stream
pub struct ScriptedLlm {
    pub calls: AtomicUsize,
    script: Vec<ScriptedChunk>,
}

impl ScriptedLlm {
    pub fn streaming(script: Vec<ScriptedChunk>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn scripted_items(&self) -> Vec<Result<StreamChunk, AppError>> {
        let mut items = Vec::with_capacity(self.script.len() + 1);
        let mut errored = false;
        for step in &self.script {
            match step {
                ScriptedChunk::Delta(text) => items.push(Ok(StreamChunk {
                    delta: (*text).to_owned(),
                    is_final: false,
                    finish_reason: None,
                })),
                ScriptedChunk::Error(message) => {
                    items.push(Err(AppError::external_service("OpenAI", *message)));
                    errored = true;
                    break;
                }
            }
        }
        if !errored {
            items.push(Ok(StreamChunk::done()));
        }
        items
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::STREAMING | LlmCapabilities::SYSTEM_MESSAGES
    }

    fn default_model(&self) -> &str {
        "gpt-3.5-turbo"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = self
            .script
            .iter()
            .filter_map(|step| match step {
                ScriptedChunk::Delta(text) => Some(*text),
                ScriptedChunk::Error(_) => None,
            })
            .collect::<String>();
        Ok(ChatResponse {
            content,
            model: "gpt-3.5-turbo".to_owned(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        })
    }

    async fn complete_stream(&self, _request: &ChatRequest) -> Result<ChatStream, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(tokio_stream::iter(self.scripted_items())))
    }
}

// ============================================================================
// Resource Wiring
// ============================================================================

/// Assemble resources around the given doubles and a fresh in-memory store
pub async fn test_resources(
    sessions: Arc<StaticSessions>,
    embedder: Arc<CountingEmbedder>,
    reviews: Arc<CountingReviewSearch>,
    llm: Arc<ScriptedLlm>,
) -> (Arc<ServerResources>, ChatStore) {
    let store = test_store().await;
    let resources = test_resources_with_store(sessions, embedder, reviews, llm, store.clone());
    (resources, store)
}

/// Assemble resources around the given doubles and an existing store
pub fn test_resources_with_store(
    sessions: Arc<StaticSessions>,
    embedder: Arc<CountingEmbedder>,
    reviews: Arc<CountingReviewSearch>,
    llm: Arc<ScriptedLlm>,
    store: ChatStore,
) -> Arc<ServerResources> {
    let resources = ServerResourcesBuilder::new()
        .with_config(test_config())
        .with_sessions(sessions)
        .with_embedder(embedder)
        .with_reviews(reviews)
        .with_llm(llm)
        .with_store(store)
        .build()
        .expect("failed to build test resources");
    Arc::new(resources)
}
