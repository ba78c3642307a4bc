//! HTTP client for the proxy's `/api/ask` endpoint.

use anyhow::{bail, Context, Result};

use crate::models::{AskRequest, AskResponse, ChatMessage};

/// Calls a ChatSphere proxy.
#[derive(Debug, Clone)]
pub struct AskClient {
    client: reqwest::Client,
    endpoint: String,
}

impl AskClient {
    /// Client for the proxy at `base_url` (e.g. `http://127.0.0.1:58231`).
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/api/ask", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one user turn with the conversation that preceded it.
    pub async fn ask(&self, message: &str, history: &[ChatMessage]) -> Result<AskResponse> {
        let body = AskRequest {
            message: Some(message.to_string()),
            history: Some(history.to_vec()),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("Failed to reach the ChatSphere server")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("Server returned {status}: {text}");
        }

        resp.json().await.context("Failed to parse server reply")
    }
}
