//! The ask pipeline: validate, answer creator questions locally, otherwise
//! forward to the upstream chat-completions API and tidy the reply.

pub mod cleanup;
mod creator;
mod error;
mod upstream;

use std::time::Duration;

use axum::http::StatusCode;

use crate::config::ProxyConfig;
use crate::models::{AskRequest, AskResponse, ChatMessage};

pub use creator::{creator_reply, is_creator_query};
pub use error::AskError;
use upstream::{CompletionOutcome, CompletionRequest, UpstreamClient};

/// Stateless request handler shared by every connection.
#[derive(Debug, Clone)]
pub struct Proxy {
    config: ProxyConfig,
    upstream: UpstreamClient,
}

impl Proxy {
    pub fn new(config: ProxyConfig) -> reqwest::Result<Self> {
        let upstream = UpstreamClient::new(
            config.api_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self { config, upstream })
    }

    pub const fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Handle one raw `POST /api/ask` body.
    pub async fn ask(&self, body: &[u8]) -> Result<AskResponse, AskError> {
        let api_key = self.config.api_key().ok_or(AskError::MissingApiKey)?;

        let request: AskRequest = serde_json::from_slice(body).map_err(AskError::internal)?;
        let message = request
            .message
            .filter(|m| !m.is_empty())
            .ok_or(AskError::MissingMessage)?;

        if is_creator_query(&message) {
            tracing::info!("answering creator query locally");
            return Ok(creator_reply(&self.config.creator));
        }

        let messages = self.build_messages(&message, request.history.unwrap_or_default());
        let completion = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        tracing::debug!(
            model = %self.config.model,
            turns = completion.messages.len(),
            "forwarding to upstream"
        );

        match self
            .upstream
            .complete(api_key, &completion)
            .await
            .map_err(AskError::internal)?
        {
            CompletionOutcome::Completed(content) => {
                let reply = if self.config.clean_replies {
                    cleanup::clean_reply(&content)
                } else {
                    content
                };
                Ok(AskResponse {
                    reply,
                    display_info: None,
                })
            }
            CompletionOutcome::Rejected { status, body } => Err(AskError::Upstream {
                status: StatusCode::from_u16(status.as_u16())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                message: upstream::error_message(&body).to_string(),
                details: body,
            }),
        }
    }

    /// System prompt, then prior turns, then the current message with any
    /// formatting instruction appended.
    fn build_messages(&self, message: &str, history: Vec<ChatMessage>) -> Vec<ChatMessage> {
        let content = match self.config.reply_style.instruction() {
            Some(instruction) => format!("{message}\n\n{instruction}"),
            None => message.to_string(),
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.config.system_prompt.clone()));
        messages.extend(history);
        messages.push(ChatMessage::user(content));
        messages
    }
}
