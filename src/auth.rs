// ABOUTME: Session resolution against the external cookie-backed auth service
// ABOUTME: Fails closed - lookup errors resolve to "no session" before any paid API call
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! # Session Resolution
//!
//! The session resolver is the first pipeline stage. It maps the caller's
//! access token (carried in a cookie or bearer header) to an authenticated
//! identity by asking the external auth service. Any failure in the lookup
//! (missing token, rejected token, transport error) resolves to "no session",
//! and the turn is rejected before the embedding, retrieval, or completion
//! providers are ever called.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::environment::PlatformConfig;
use crate::errors::AppError;

/// Connection timeout for the auth service
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Request timeout for a session lookup
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// An authenticated caller identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// Stable user identifier
    pub id: String,
    /// Email address if the auth service exposes one
    pub email: Option<String>,
    /// Display name if the auth service exposes one
    pub name: Option<String>,
}

/// Session resolution contract
///
/// Implementations must fail closed: any error during the lookup yields
/// `None` rather than propagating.
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Resolve an access token to an identity, or `None` for no session
    async fn resolve(&self, access_token: Option<&str>) -> Option<SessionUser>;
}

#[derive(Debug, Deserialize)]
struct AuthUserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<AuthUserMetadata>,
}

#[derive(Debug, Deserialize)]
struct AuthUserMetadata {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl From<AuthUserResponse> for SessionUser {
    fn from(user: AuthUserResponse) -> Self {
        let name = user
            .user_metadata
            .and_then(|m| m.full_name.or(m.name));
        Self {
            id: user.id,
            email: user.email,
            name,
        }
    }
}

/// HTTP client for the platform's auth service
pub struct AuthServiceClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl AuthServiceClient {
    /// Create a client from the platform configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &PlatformConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            anon_key: config.anon_key.clone(),
        })
    }
}

#[async_trait]
impl SessionService for AuthServiceClient {
    async fn resolve(&self, access_token: Option<&str>) -> Option<SessionUser> {
        let token = access_token?;
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<AuthUserResponse>().await {
                Ok(user) => Some(user.into()),
                Err(e) => {
                    warn!("Session lookup returned an unparseable body: {e}");
                    None
                }
            },
            Ok(resp) => {
                debug!("Session lookup rejected with status {}", resp.status());
                None
            }
            Err(e) => {
                warn!("Session lookup failed: {e}");
                None
            }
        }
    }
}
