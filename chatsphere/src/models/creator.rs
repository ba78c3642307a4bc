//! Identity card returned for "who made you" questions.

use serde::{Deserialize, Serialize};

/// Details about the assistant's creator, sent to clients as `displayInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorInfo {
    pub name: String,
    pub role: String,
    pub image: String,
    pub bio: String,
}

impl Default for CreatorInfo {
    fn default() -> Self {
        Self {
            name: "Lucky Tiwari".to_string(),
            role: "Full Stack Developer & Owner of ChatSphere AI".to_string(),
            image: "owner.jpg".to_string(),
            bio: "Lucky Tiwari is a passionate full stack developer and the visionary mind \
                  behind ChatSphere AI. With a deep commitment to innovation, open-source \
                  development, and user-friendly design, he built ChatSphere AI to transform \
                  how people interact with intelligent systems."
                .to_string(),
        }
    }
}
