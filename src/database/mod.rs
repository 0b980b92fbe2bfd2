// ABOUTME: Conversation store module and SQLite pool bootstrap
// ABOUTME: Creates the schema inline on connect; no external migration tooling
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! # Conversation Store
//!
//! SQLite-backed persistence for chat transcripts via sqlx.

/// Chat conversation persistence
pub mod chats;

pub use chats::ChatStore;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

use crate::config::environment::DatabaseUrl;
use crate::errors::AppError;

/// Open a connection pool and ensure the schema exists
///
/// # Errors
///
/// Returns an error if the database cannot be opened or the schema cannot be
/// created.
pub async fn connect(url: &DatabaseUrl) -> Result<SqlitePool, AppError> {
    if let DatabaseUrl::File { path } = url {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::database(format!("Failed to create database directory: {e}"))
                })?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(&url.to_connection_string())
        .map_err(|e| AppError::database(format!("Invalid database URL: {e}")))?
        .create_if_missing(true);

    // An in-memory SQLite database exists per connection; a pool larger than
    // one would hand out empty databases.
    let max_connections = if url.is_memory() { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create the conversation store schema
async fn create_schema(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS chats (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            payload TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await
    .map_err(|e| AppError::database(format!("Failed to create chats table: {e}")))?;

    sqlx::query(
        r"
        CREATE INDEX IF NOT EXISTS idx_chats_user_created
        ON chats (user_id, created_at DESC)
        ",
    )
    .execute(pool)
    .await
    .map_err(|e| AppError::database(format!("Failed to create chats index: {e}")))?;

    Ok(())
}
