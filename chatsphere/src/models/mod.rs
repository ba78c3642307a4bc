//! Data models shared by the proxy and the chat client.

mod ask;
mod creator;
mod message;
mod session;

pub use ask::{AskRequest, AskResponse, ErrorBody};
pub use creator::CreatorInfo;
pub use message::{ChatMessage, MessageRole};
pub use session::{ChatSession, ChatSummary, NEW_CHAT_TITLE};

/// Whether any message in the list came from the user.
pub fn has_user_message(messages: &[ChatMessage]) -> bool {
    messages.iter().any(|m| m.role == MessageRole::User)
}
