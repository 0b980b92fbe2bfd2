// ABOUTME: Common data models shared across the chat turn pipeline
// ABOUTME: Defines the Conversation payload persisted by the conversation store
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! Shared domain models

use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

/// A persisted chat conversation
///
/// The payload round-trips through the store as JSON; field names stay in
/// camelCase so stored transcripts remain readable by the web client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation identifier
    pub id: String,
    /// Title shown in the conversation list
    pub title: String,
    /// Owning user's identifier
    pub user_id: String,
    /// Creation time in epoch milliseconds
    pub created_at: i64,
    /// Client-side route for this conversation
    pub path: String,
    /// Full ordered transcript, exactly as sent to the model plus its reply
    pub messages: Vec<ChatMessage>,
    /// Public share route, set once the owner shares the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_path: Option<String>,
}

impl Conversation {
    /// Client-side route for a conversation id
    #[must_use]
    pub fn path_for(id: &str) -> String {
        format!("/chat/{id}")
    }

    /// Public share route for a conversation id
    #[must_use]
    pub fn share_path_for(id: &str) -> String {
        format!("/share/{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    #[test]
    fn test_payload_uses_camel_case() {
        let conversation = Conversation {
            id: "c1".to_owned(),
            title: "First chat".to_owned(),
            user_id: "u1".to_owned(),
            created_at: 1_700_000_000_000,
            path: "/chat/c1".to_owned(),
            messages: vec![ChatMessage::user("hi")],
            share_path: None,
        };

        let json = serde_json::to_string(&conversation).unwrap();
        assert!(json.contains("\"userId\":\"u1\""));
        assert!(json.contains("\"createdAt\":1700000000000"));
        assert!(!json.contains("sharePath"));
    }

    #[test]
    fn test_payload_round_trip() {
        let conversation = Conversation {
            id: "c2".to_owned(),
            title: "Second".to_owned(),
            user_id: "u2".to_owned(),
            created_at: 42,
            path: Conversation::path_for("c2"),
            messages: vec![
                ChatMessage::system("context"),
                ChatMessage::user("question"),
                ChatMessage::assistant("answer"),
            ],
            share_path: Some(Conversation::share_path_for("c2")),
        };

        let json = serde_json::to_string(&conversation).unwrap();
        let parsed: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, conversation);
        assert_eq!(parsed.messages[2].role, MessageRole::Assistant);
    }
}
