// ABOUTME: Similarity search over the review index via the platform's match_reviews RPC
// ABOUTME: Defines ReviewRecord and the ReviewSearch provider contract with its HTTP client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! # Review Retrieval
//!
//! The retrieval stage turns a query embedding into an ordered list of the
//! most similar stored reviews. The index itself lives in the external
//! platform and is reached through its `match_reviews` RPC. No caching layer
//! sits in front of it; every turn re-queries the index as it stands.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::environment::PlatformConfig;
use crate::errors::AppError;

/// Connection timeout for the platform endpoint
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Request timeout for a similarity search call
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Columns requested from the RPC, in rendering order
const SELECTED_FIELDS: &str = "review_title,review_likes,review_dislikes,review_problem,\
review_recommendations,review_link,reviewer_business_size,reviewer_job_title,review_date,\
similarity";

/// A review returned by the similarity search
///
/// Read-only from the pipeline's perspective; field names map to the index's
/// column names on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    /// Review headline
    #[serde(rename = "review_title")]
    pub title: String,
    /// What the reviewer liked
    #[serde(rename = "review_likes", default)]
    pub likes: String,
    /// What the reviewer disliked
    #[serde(rename = "review_dislikes", default)]
    pub dislikes: String,
    /// The problem the reviewer was solving
    #[serde(rename = "review_problem", default)]
    pub problem: String,
    /// The reviewer's recommendations
    #[serde(rename = "review_recommendations", default)]
    pub recommendations: String,
    /// Link to the original review
    #[serde(rename = "review_link", default)]
    pub link: Option<String>,
    /// Similarity score against the query embedding
    #[serde(default)]
    pub similarity: f32,
    /// Reviewer's company size bracket
    #[serde(
        rename = "reviewer_business_size",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub business_size: Option<String>,
    /// Reviewer's job title
    #[serde(
        rename = "reviewer_job_title",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub job_title: Option<String>,
    /// Date the review was posted
    #[serde(rename = "review_date", default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Similarity search provider contract
#[async_trait]
pub trait ReviewSearch: Send + Sync {
    /// Fetch the reviews most similar to the query embedding
    ///
    /// Results are ordered by similarity, each scoring at least `threshold`,
    /// at most `limit` records.
    async fn match_reviews(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: u32,
    ) -> Result<Vec<ReviewRecord>, AppError>;
}

#[derive(Debug, Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_threshold: f32,
}

/// HTTP client for the platform's `match_reviews` RPC
pub struct ReviewSearchClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl ReviewSearchClient {
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
impl ReviewSearch for ReviewSearchClient {
    #[instrument(skip(self, query_embedding), fields(dims = query_embedding.len()))]
    async fn match_reviews(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: u32,
    ) -> Result<Vec<ReviewRecord>, AppError> {
        let url = format!("{}/rest/v1/rpc/match_reviews", self.base_url);
        let limit_param = limit.to_string();

        let response = self
            .client
            .post(&url)
            .query(&[("select", SELECTED_FIELDS), ("limit", limit_param.as_str())])
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(&MatchRequest {
                query_embedding,
                match_threshold: threshold,
            })
            .send()
            .await
            .map_err(|e| {
                AppError::external_service("review search", format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external_service(
                "review search",
                format!(
                    "match_reviews returned {status}: {}",
                    body.chars().take(200).collect::<String>()
                ),
            ));
        }

        let mut records: Vec<ReviewRecord> = response.json().await.map_err(|e| {
            AppError::external_service("review search", format!("failed to parse response: {e}"))
        })?;

        // The RPC honors the limit; re-apply it so the cap holds regardless.
        records.truncate(limit as usize);
        debug!("Retrieved {} reviews above threshold", records.len());

        Ok(records)
    }
}
