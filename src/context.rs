// ABOUTME: Dependency injection context shared by route handlers
// ABOUTME: Holds the config, external service handles, and the conversation store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! # Server Resources
//!
//! All route handlers receive one [`ServerResources`] value. External
//! collaborators sit behind their trait objects so tests can swap in doubles;
//! production wiring builds the real HTTP clients once at startup.
//!
//! Requests carrying their own provider key (`previewToken`) get fresh
//! per-turn clients through [`ServerResources::turn_providers`] instead of
//! mutating any shared handle.

use std::sync::Arc;

use crate::auth::{AuthServiceClient, SessionService};
use crate::config::environment::ServerConfig;
use crate::database::ChatStore;
use crate::errors::AppError;
use crate::llm::prompts::PromptTemplate;
use crate::llm::{EmbeddingProvider, LlmProvider, OpenAiProvider};
use crate::retrieval::{ReviewSearch, ReviewSearchClient};

/// Shared handles for the chat turn pipeline
pub struct ServerResources {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Session resolver
    pub sessions: Arc<dyn SessionService>,
    /// Embedding provider
    pub embedder: Arc<dyn EmbeddingProvider>,
    /// Similarity search over the review index
    pub reviews: Arc<dyn ReviewSearch>,
    /// Chat completion provider
    pub llm: Arc<dyn LlmProvider>,
    /// Conversation store
    pub store: ChatStore,
    /// Prompt assembler template
    pub template: PromptTemplate,
}

impl ServerResources {
    /// Wire up production clients from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any HTTP client cannot be constructed.
    pub fn new(config: ServerConfig, store: ChatStore) -> Result<Self, AppError> {
        let sessions = Arc::new(AuthServiceClient::new(&config.platform)?);
        let reviews = Arc::new(ReviewSearchClient::new(&config.platform)?);
        let openai = Arc::new(OpenAiProvider::new(config.openai.clone())?);

        Ok(Self {
            config: Arc::new(config),
            sessions,
            embedder: openai.clone(),
            reviews,
            llm: openai,
            store,
            template: PromptTemplate::default(),
        })
    }

    /// Providers for one turn, honoring a per-request key override
    ///
    /// With no override the shared handles are reused; with `previewToken`
    /// fresh clients bound to that key are built for this turn only.
    ///
    /// # Errors
    ///
    /// Returns an error if an override client cannot be constructed.
    pub fn turn_providers(
        &self,
        preview_token: Option<&str>,
    ) -> Result<(Arc<dyn EmbeddingProvider>, Arc<dyn LlmProvider>), AppError> {
        match preview_token {
            Some(key) => {
                let provider =
                    Arc::new(OpenAiProvider::new(self.config.openai.with_api_key(key))?);
                Ok((provider.clone(), provider))
            }
            None => Ok((self.embedder.clone(), self.llm.clone())),
        }
    }
}

/// Builder for assembling resources piecewise (used by tests)
#[derive(Default)]
pub struct ServerResourcesBuilder {
    config: Option<ServerConfig>,
    sessions: Option<Arc<dyn SessionService>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    reviews: Option<Arc<dyn ReviewSearch>>,
    llm: Option<Arc<dyn LlmProvider>>,
    store: Option<ChatStore>,
    template: Option<PromptTemplate>,
}

impl ServerResourcesBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the session resolver
    #[must_use]
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionService>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Set the embedding provider
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the review search provider
    #[must_use]
    pub fn with_reviews(mut self, reviews: Arc<dyn ReviewSearch>) -> Self {
        self.reviews = Some(reviews);
        self
    }

    /// Set the completion provider
    #[must_use]
    pub fn with_llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Set the conversation store
    #[must_use]
    pub fn with_store(mut self, store: ChatStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the prompt template
    #[must_use]
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Assemble the resources
    ///
    /// # Errors
    ///
    /// Returns an error when a required component is missing.
    pub fn build(self) -> Result<ServerResources, AppError> {
        Ok(ServerResources {
            config: Arc::new(
                self.config
                    .ok_or_else(|| AppError::config("builder is missing config"))?,
            ),
            sessions: self
                .sessions
                .ok_or_else(|| AppError::config("builder is missing sessions"))?,
            embedder: self
                .embedder
                .ok_or_else(|| AppError::config("builder is missing embedder"))?,
            reviews: self
                .reviews
                .ok_or_else(|| AppError::config("builder is missing reviews"))?,
            llm: self
                .llm
                .ok_or_else(|| AppError::config("builder is missing llm"))?,
            store: self
                .store
                .ok_or_else(|| AppError::config("builder is missing store"))?,
            template: self.template.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::environment::{
        DatabaseConfig, DatabaseUrl, Environment, PersistenceConfig, PlatformConfig,
        RetrievalConfig,
    };

    fn config() -> ServerConfig {
        ServerConfig {
            http_port: 0,
            environment: Environment::Testing,
            database: DatabaseConfig {
                url: DatabaseUrl::Memory,
            },
            platform: PlatformConfig {
                base_url: "http://localhost:54321".to_owned(),
                anon_key: "anon".to_owned(),
                session_cookie: "sb-access-token".to_owned(),
            },
            openai: crate::config::environment::OpenAiConfig {
                base_url: "http://localhost:9999/v1".to_owned(),
                api_key: "sk-test".to_owned(),
                chat_model: "gpt-3.5-turbo".to_owned(),
                embedding_model: "text-embedding-ada-002".to_owned(),
                temperature: 0.7,
            },
            retrieval: RetrievalConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_turn_providers_honor_key_override() {
        let pool = crate::database::connect(&DatabaseUrl::Memory).await.unwrap();
        let resources = ServerResources::new(config(), ChatStore::new(pool)).unwrap();

        let (embedder, llm) = resources.turn_providers(None).unwrap();
        assert_eq!(llm.default_model(), "gpt-3.5-turbo");
        assert_eq!(embedder.model(), "text-embedding-ada-002");

        // A preview token builds fresh per-turn clients.
        let (embedder, llm) = resources.turn_providers(Some("sk-preview")).unwrap();
        assert_eq!(llm.name(), "openai");
        assert_eq!(embedder.model(), "text-embedding-ada-002");

        // An empty preview token cannot build a client.
        assert!(resources.turn_providers(Some("")).is_err());
    }
}
