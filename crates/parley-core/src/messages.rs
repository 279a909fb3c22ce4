//! Conversation message type used by the contextual prompt selector.

use serde::{Deserialize, Serialize};

/// A single chat message (`role` + `content`).
///
/// Roles follow the chat-completion convention: `user`, `assistant`,
/// `system`. Kept as a plain string because the selector only formats
/// messages into `role: content` transcript lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Format as a transcript line.
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.role, self.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_line_format() {
        let msg = ChatMessage::user("hello there");
        assert_eq!(msg.transcript_line(), "user: hello there");
    }

    #[test]
    fn constructors_set_roles() {
        assert_eq!(ChatMessage::user("x").role, "user");
        assert_eq!(ChatMessage::assistant("x").role, "assistant");
    }
}
