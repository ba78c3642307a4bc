//! Canned answers for questions about who built the assistant.

use crate::models::{AskResponse, CreatorInfo};

/// Phrases that identify a creator question. All lowercase; matched as substrings.
const CREATOR_PHRASES: &[&str] = &[
    "who is your creator",
    "who made you",
    "who developed you",
    "who owns you",
    "your owner",
    "your developer",
    "about your creator",
];

/// Whether the message asks about the assistant's creator.
pub fn is_creator_query(message: &str) -> bool {
    let lower = message.to_lowercase();
    CREATOR_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// The identity reply, with the full card attached for clients that show it.
pub fn creator_reply(creator: &CreatorInfo) -> AskResponse {
    AskResponse {
        reply: format!("I was created by {}, a {}.", creator.name, creator.role),
        display_info: Some(creator.clone()),
    }
}
