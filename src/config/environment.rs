// ABOUTME: Server configuration resolved from environment variables
// ABOUTME: Typed sub-configs for the store, platform, provider, and retrieval stage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! # Configuration
//!
//! Everything the server needs to run arrives through environment variables,
//! parsed once at startup into [`ServerConfig`]. Required settings fail fast
//! with a named variable in the error; optional ones fall back to defaults
//! that match the original deployment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use url::Url;

/// Deployment mode, mostly steering log verbosity expectations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Testing,
}

impl Environment {
    /// Parse leniently; anything unrecognized is development
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    #[must_use]
    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Testing => "testing",
        };
        f.write_str(name)
    }
}

/// Where the conversation store lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// SQLite file on disk
    File { path: PathBuf },
    /// In-memory SQLite, used by the test suite
    Memory,
}

impl DatabaseUrl {
    /// Accepts `sqlite:<path>`, a bare path, or `:memory:`
    #[must_use]
    pub fn parse_url(s: &str) -> Self {
        let path = s.strip_prefix("sqlite:").unwrap_or(s);
        if path == ":memory:" {
            Self::Memory
        } else {
            Self::File {
                path: PathBuf::from(path),
            }
        }
    }

    /// Connection string in the form sqlx expects
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::File { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }

    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::File {
            path: PathBuf::from("./data/chats.db"),
        }
    }
}

/// Conversation store settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    pub url: DatabaseUrl,
}

/// The external platform hosting the auth service and the review index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Base URL; both `/auth/v1` and `/rest/v1` hang off it
    pub base_url: String,
    /// Anonymous API key sent with every platform request
    pub anon_key: String,
    /// Name of the cookie carrying the caller's access token
    pub session_cookie: String,
}

/// OpenAI settings, shared by the completion and embedding stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    /// Model answering chat turns
    pub chat_model: String,
    /// Model producing query embeddings
    pub embedding_model: String,
    /// Sampling temperature for chat completion
    pub temperature: f32,
}

impl OpenAiConfig {
    /// The same configuration bound to a different key
    ///
    /// Backs the per-request `previewToken` override.
    #[must_use]
    pub fn with_api_key(&self, api_key: &str) -> Self {
        Self {
            api_key: api_key.to_owned(),
            ..self.clone()
        }
    }
}

/// Retrieval stage parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Reviews scoring below this similarity are excluded
    pub match_threshold: f32,
    /// At most this many reviews feed the prompt
    pub match_limit: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.8,
            match_limit: 20,
        }
    }
}

/// What happens when saving a finished transcript fails
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct PersistenceConfig {
    /// When set, a failed save ends the response stream with an error
    /// instead of being logged and swallowed.
    pub strict: bool,
}

/// Everything the server needs, resolved once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub http_port: u16,
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub platform: PlatformConfig,
    pub openai: OpenAiConfig,
    pub retrieval: RetrievalConfig,
    pub persistence: PersistenceConfig,
}

impl ServerConfig {
    /// Resolve configuration from the process environment
    ///
    /// # Errors
    ///
    /// Names the missing or unparseable variable.
    pub fn from_env() -> Result<Self> {
        let http_port = env::var("HTTP_PORT")
            .unwrap_or_else(|_| "8787".to_owned())
            .parse::<u16>()
            .context("HTTP_PORT must be a valid port number")?;

        let environment =
            Environment::parse(&env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_owned()));

        let database_url = DatabaseUrl::parse_url(
            &env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./data/chats.db".to_owned()),
        );

        let platform_base =
            env::var("REVIEW_PLATFORM_URL").context("REVIEW_PLATFORM_URL must be set")?;
        Url::parse(&platform_base).context("REVIEW_PLATFORM_URL must be a valid URL")?;
        let platform_anon_key =
            env::var("REVIEW_PLATFORM_ANON_KEY").context("REVIEW_PLATFORM_ANON_KEY must be set")?;
        let session_cookie =
            env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "sb-access-token".to_owned());

        let openai_base =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_owned());
        Url::parse(&openai_base).context("OPENAI_BASE_URL must be a valid URL")?;
        let openai_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY must be set")?;
        let chat_model =
            env::var("OPENAI_CHAT_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_owned());
        let embedding_model = env::var("OPENAI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-ada-002".to_owned());
        let temperature = env::var("CHAT_TEMPERATURE")
            .unwrap_or_else(|_| "0.7".to_owned())
            .parse::<f32>()
            .context("CHAT_TEMPERATURE must be a number")?;

        let match_threshold = env::var("MATCH_THRESHOLD")
            .unwrap_or_else(|_| "0.8".to_owned())
            .parse::<f32>()
            .context("MATCH_THRESHOLD must be a number")?;
        let match_limit = env::var("MATCH_LIMIT")
            .unwrap_or_else(|_| "20".to_owned())
            .parse::<u32>()
            .context("MATCH_LIMIT must be a positive integer")?;

        let strict_persistence = env::var("STRICT_PERSISTENCE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            http_port,
            environment,
            database: DatabaseConfig { url: database_url },
            platform: PlatformConfig {
                base_url: platform_base,
                anon_key: platform_anon_key,
                session_cookie,
            },
            openai: OpenAiConfig {
                base_url: openai_base,
                api_key: openai_key,
                chat_model,
                embedding_model,
                temperature,
            },
            retrieval: RetrievalConfig {
                match_threshold,
                match_limit,
            },
            persistence: PersistenceConfig {
                strict: strict_persistence,
            },
        })
    }

    /// One line for the startup log, secrets excluded
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "env={} port={} db={} platform={} chat_model={} embedding_model={} threshold={} limit={} strict_persistence={}",
            self.environment,
            self.http_port,
            self.database.url.to_connection_string(),
            self.platform.base_url,
            self.openai.chat_model,
            self.openai.embedding_model,
            self.retrieval.match_threshold,
            self.retrieval.match_limit,
            self.persistence.strict,
        )
    }
}
