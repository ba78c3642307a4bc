//! Client for the upstream OpenAI-style chat-completions API.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::ChatMessage;

/// Reply used when the upstream answer has no content.
pub const EMPTY_REPLY: &str = "No AI response content found.";

/// Body sent to the chat-completions endpoint.
#[derive(Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Result of one upstream call that got an HTTP response.
#[derive(Debug)]
pub enum CompletionOutcome {
    /// 2xx: the first choice's content.
    Completed(String),
    /// Non-2xx: the status and the best-effort error body.
    Rejected { status: StatusCode, body: Value },
}

/// Errors that prevented a usable upstream response.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request to upstream failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned an unreadable body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Thin wrapper over a pooled HTTP client and the endpoint URL.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    url: String,
}

impl UpstreamClient {
    /// Build a client whose calls give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Send one completion request.
    pub async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest<'_>,
    ) -> Result<CompletionOutcome, UpstreamError> {
        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let body = serde_json::from_str(&text)
                .unwrap_or_else(|_| json!({ "message": "Unknown error from upstream API" }));
            return Ok(CompletionOutcome::Rejected { status, body });
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_string());

        Ok(CompletionOutcome::Completed(content))
    }
}

/// Pull a human-readable message out of an upstream error body.
///
/// Accepts `{message}`, `{error: {message}}` and `{error: "..."}`.
pub fn error_message(body: &Value) -> &str {
    body.get("message")
        .and_then(Value::as_str)
        .or_else(|| body.pointer("/error/message").and_then(Value::as_str))
        .or_else(|| body.get("error").and_then(Value::as_str))
        .unwrap_or("Failed to get response")
}
