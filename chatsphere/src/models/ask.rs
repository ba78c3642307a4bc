//! Wire types for `POST /api/ask`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChatMessage, CreatorInfo};

/// Request body accepted by the proxy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskRequest {
    /// The user's message. Missing and empty are both rejected.
    #[serde(default)]
    pub message: Option<String>,
    /// Prior conversation, oldest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<ChatMessage>>,
}

/// Successful proxy reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub reply: String,
    /// Present only for creator queries.
    #[serde(
        rename = "displayInfo",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub display_info: Option<CreatorInfo>,
}

/// Error payload for every non-2xx proxy response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}
