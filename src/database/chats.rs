// ABOUTME: Database operations for persisted chat conversations
// ABOUTME: Upsert/get/list/delete with owner scoping; payloads stored as JSON
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

use serde_json::from_str;
use sqlx::{Row, SqlitePool};

use crate::errors::{AppError, AppResult};
use crate::models::Conversation;

/// Chat conversation store
///
/// Each row holds the full conversation payload as JSON beside the columns
/// used for keying and ordering. Writes are upserts keyed by conversation id
/// with last-writer-wins semantics.
#[derive(Clone)]
pub struct ChatStore {
    pool: SqlitePool,
}

impl ChatStore {
    /// Create a new store over an initialized pool
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or overwrite a conversation
    ///
    /// Whichever write lands last keeps the row; there is no version check.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the database operation fails.
    pub async fn upsert(&self, conversation: &Conversation) -> AppResult<()> {
        let payload = serde_json::to_string(conversation)
            .map_err(|e| AppError::serialization(format!("Failed to encode conversation: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO chats (id, user_id, created_at, payload)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                user_id = excluded.user_id,
                created_at = excluded.created_at,
                payload = excluded.payload
            ",
        )
        .bind(&conversation.id)
        .bind(&conversation.user_id)
        .bind(conversation.created_at)
        .bind(&payload)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert conversation: {e}")))?;

        Ok(())
    }

    /// Fetch a conversation by id
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation or payload decoding fails.
    pub async fn get(&self, id: &str) -> AppResult<Option<Conversation>> {
        let row = sqlx::query("SELECT payload FROM chats WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get conversation: {e}")))?;

        row.map(|r| decode_payload(&r.get::<String, _>("payload")))
            .transpose()
    }

    /// List a user's conversations, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation or payload decoding fails.
    pub async fn list(&self, user_id: &str) -> AppResult<Vec<Conversation>> {
        let rows = sqlx::query(
            r"
            SELECT payload FROM chats
            WHERE user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list conversations: {e}")))?;

        rows.iter()
            .map(|r| decode_payload(&r.get::<String, _>("payload")))
            .collect()
    }

    /// Delete a conversation owned by the given user
    ///
    /// Returns `false` when no matching row existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn delete(&self, id: &str, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM chats WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete conversation: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete all conversations owned by the given user
    ///
    /// Returns the number of deleted rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn delete_all(&self, user_id: &str) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM chats WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete conversations: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Fetch a conversation only if it has been shared
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation or payload decoding fails.
    pub async fn get_shared(&self, id: &str) -> AppResult<Option<Conversation>> {
        Ok(self.get(id).await?.filter(|c| c.share_path.is_some()))
    }
}

fn decode_payload(payload: &str) -> AppResult<Conversation> {
    from_str(payload)
        .map_err(|e| AppError::serialization(format!("Failed to decode conversation: {e}")))
}
