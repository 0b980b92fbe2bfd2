// ABOUTME: Prompt assembly for review-grounded chat turns
// ABOUTME: Renders retrieved reviews into a single system message prepended to the history
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Revu Labs

//! # Prompt Assembly
//!
//! The prompt assembler is a pure function from (retrieved reviews, caller
//! message history) to the message sequence sent to the completion model. It
//! produces exactly one system-role message, holding the grounding
//! instruction, one line per review, and a parallel citation-link list. That
//! message is prepended to (never replacing) the caller's history.
//!
//! [`PromptTemplate`] parameterizes the instruction wording so deployment
//! variants share this one assembler instead of forking the rendering code.

use std::borrow::Cow;
use std::fmt::Write;

use super::ChatMessage;
use crate::retrieval::ReviewRecord;

/// Default grounding instruction, loaded at compile time
pub const REVIEW_GROUNDING_PROMPT: &str = include_str!("review_grounding.md");

/// Placeholder rendered in the citation list for reviews without a link
const MISSING_LINK: &str = "(no link)";

/// Template configuration for the prompt assembler
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// Instruction text placed at the top of the system message
    pub instruction: Cow<'static, str>,
    /// Whether to render the citation-link list
    pub cite_links: bool,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            instruction: Cow::Borrowed(REVIEW_GROUNDING_PROMPT),
            cite_links: true,
        }
    }
}

impl PromptTemplate {
    /// Create a template with custom instruction wording
    #[must_use]
    pub fn with_instruction(instruction: impl Into<String>) -> Self {
        Self {
            instruction: Cow::Owned(instruction.into()),
            cite_links: true,
        }
    }

    /// Render the system message content for a set of retrieved reviews
    ///
    /// One line per review, in retrieval order, followed by one link entry per
    /// review when `cite_links` is set. Deterministic for identical input.
    #[must_use]
    pub fn render(&self, reviews: &[ReviewRecord]) -> String {
        let mut out = String::with_capacity(256 + reviews.len() * 128);
        out.push_str(self.instruction.trim_end());

        if reviews.is_empty() {
            out.push_str("\n\nNo matching reviews were found for this question.");
            return out;
        }

        out.push_str("\n\n");
        for review in reviews {
            // Write to a String is infallible.
            let _ = writeln!(
                out,
                "Review: {}. Likes: {}, Dislikes: {}. Problems: {}. Recommendations: {}",
                review.title, review.likes, review.dislikes, review.problem,
                review.recommendations,
            );
        }

        if self.cite_links {
            out.push_str("\nLinks:\n");
            for review in reviews {
                out.push_str(review.link.as_deref().unwrap_or(MISSING_LINK));
                out.push('\n');
            }
        }

        out
    }

    /// Assemble the full message sequence for a chat turn
    ///
    /// Exactly one system message is prepended to the caller's history.
    #[must_use]
    pub fn assemble_messages(
        &self,
        reviews: &[ReviewRecord],
        history: &[ChatMessage],
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(self.render(reviews)));
        messages.extend_from_slice(history);
        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    fn review(n: usize) -> ReviewRecord {
        ReviewRecord {
            title: format!("Review {n}"),
            likes: "fast setup".to_owned(),
            dislikes: "pricing tiers".to_owned(),
            problem: "reporting".to_owned(),
            recommendations: "try the trial".to_owned(),
            link: Some(format!("https://example.com/reviews/{n}")),
            similarity: 0.9,
            business_size: None,
            job_title: None,
            date: None,
        }
    }

    #[test]
    fn test_one_system_message_prepended() {
        let template = PromptTemplate::default();
        let history = vec![
            ChatMessage::user("What do people like?"),
            ChatMessage::assistant("Let me check."),
            ChatMessage::user("Anything else?"),
        ];
        let reviews = vec![review(1), review(2)];

        let messages = template.assemble_messages(&reviews, &history);

        assert_eq!(messages.len(), history.len() + 1);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(&messages[1..], &history[..]);
        let system_count = messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .count();
        assert_eq!(system_count, 1);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let template = PromptTemplate::default();
        let reviews = vec![review(1), review(2), review(3)];
        let history = vec![ChatMessage::user("hello")];

        let first = template.assemble_messages(&reviews, &history);
        let second = template.assemble_messages(&reviews, &history);
        assert_eq!(first, second);
    }

    #[test]
    fn test_one_line_and_one_link_per_review() {
        let template = PromptTemplate::default();
        let reviews: Vec<ReviewRecord> = (0..20).map(review).collect();
        let rendered = template.render(&reviews);

        let review_lines = rendered
            .lines()
            .filter(|l| l.starts_with("Review: "))
            .count();
        assert_eq!(review_lines, 20);

        let link_lines = rendered
            .lines()
            .filter(|l| l.starts_with("https://example.com/reviews/"))
            .count();
        assert_eq!(link_lines, 20);
    }

    #[test]
    fn test_missing_link_keeps_list_parallel() {
        let template = PromptTemplate::default();
        let mut second = review(2);
        second.link = None;
        let rendered = template.render(&[review(1), second]);

        let links_section = rendered.split("Links:\n").nth(1).unwrap();
        let entries: Vec<&str> = links_section.lines().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], "(no link)");
    }

    #[test]
    fn test_empty_retrieval_still_renders_instruction() {
        let template = PromptTemplate::default();
        let rendered = template.render(&[]);

        assert!(rendered.contains("customer reviews"));
        assert!(rendered.contains("No matching reviews were found"));
        assert!(!rendered.contains("Links:"));
    }

    #[test]
    fn test_custom_instruction_wording() {
        let template = PromptTemplate::with_instruction("Answer using the reviews.");
        let rendered = template.render(&[review(1)]);
        assert!(rendered.starts_with("Answer using the reviews."));
    }
}
