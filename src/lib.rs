// ABOUTME: Main library entry point for the Revu review-grounded chat backend
// ABOUTME: Exposes the retrieval-augmented chat turn pipeline and its HTTP surface
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

#![deny(unsafe_code)]

//! # Revu Server
//!
//! A chat backend whose answers are grounded in a database of product reviews.
//! Each chat turn runs a linear pipeline: resolve the caller's session, embed
//! the latest user message, fetch the nearest-neighbor reviews, assemble a
//! grounding prompt, stream the completion back to the caller, and persist the
//! finished transcript.
//!
//! ## Architecture
//!
//! - **llm**: provider abstraction for chat completion and embeddings
//! - **retrieval**: similarity search client over the review index
//! - **auth**: session resolution against the external auth service
//! - **database**: conversation store (SQLite via sqlx)
//! - **routes**: axum HTTP surface
//!
//! ## Example
//!
//! ```rust,no_run
//! use revu_server::config::environment::ServerConfig;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("Revu server configured for port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Session resolution against the external auth service
pub mod auth;

/// Configuration management
pub mod config;

/// Dependency injection context shared by route handlers
pub mod context;

/// Conversation store backed by SQLite
pub mod database;

/// Unified error handling with standard error codes and HTTP responses
pub mod errors;

/// LLM provider abstraction for chat completion and embeddings
pub mod llm;

/// Production logging and structured output
pub mod logging;

/// Common data models shared across the pipeline
pub mod models;

/// Similarity search over the review index
pub mod retrieval;

/// HTTP routes for the chat pipeline and conversation management
pub mod routes;

/// Request security helpers (cookie parsing)
pub mod security;
