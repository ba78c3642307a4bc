//! Chat session models: index entries and full sessions.

use serde::{Deserialize, Serialize};

use super::ChatMessage;

/// Title given to a chat until its first user message arrives.
pub const NEW_CHAT_TITLE: &str = "New Chat";

/// One entry of the recent-chats index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    /// Time-ordered chat identifier.
    pub id: String,
    /// Display title.
    pub title: String,
}

impl ChatSummary {
    /// Create an index entry for a freshly started chat.
    pub fn new(id: String) -> Self {
        Self {
            id,
            title: NEW_CHAT_TITLE.to_string(),
        }
    }
}

/// A chat with its full message list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
}
