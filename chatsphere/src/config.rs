//! Proxy configuration.
//!
//! Values come from `serve` flags, each of which falls back to an environment
//! variable. Everything here is fixed for the lifetime of the server.

use clap::ValueEnum;

use crate::models::CreatorInfo;

/// Default upstream chat-completions endpoint.
pub const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
/// Default upstream model.
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
/// Ceiling for a single upstream call, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

/// Output shape requested from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReplyStyle {
    /// Send the message as-is.
    Plain,
    /// Short intro paragraph followed by bulleted sections.
    #[default]
    Sections,
    /// A short dashed list.
    Concise,
}

impl ReplyStyle {
    /// Instruction appended to the user's message, if any.
    pub const fn instruction(self) -> Option<&'static str> {
        match self {
            Self::Plain => None,
            Self::Sections => Some(
                "Format your answer as a short introductory paragraph followed by \
                 sections. Give each section a bold heading ending in a colon and list \
                 its points on separate lines starting with \"- \". Keep it concise.",
            ),
            Self::Concise => Some(
                "Answer concisely as a short list. Put every point on its own line \
                 starting with \"- \". Do not use bold text.",
            ),
        }
    }
}

/// Settings for the `/api/ask` proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream bearer credential. Requests fail with a configuration error without it.
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub reply_style: ReplyStyle,
    /// Strip bold markers and tidy list bullets in upstream replies.
    pub clean_replies: bool,
    pub timeout_secs: u64,
    pub creator: CreatorInfo,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            reply_style: ReplyStyle::default(),
            clean_replies: true,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            creator: CreatorInfo::default(),
        }
    }
}

impl ProxyConfig {
    /// The credential, treating an empty string as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}
