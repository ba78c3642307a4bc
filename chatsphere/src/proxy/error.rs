//! Error taxonomy for the ask endpoint and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use thiserror::Error;

use crate::models::ErrorBody;

/// Everything that can turn an ask request into a non-2xx response.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("Method Not Allowed - Only POST requests are permitted.")]
    MethodNotAllowed,

    #[error("Server configuration error: upstream API key missing.")]
    MissingApiKey,

    #[error("Bad Request - No message content provided.")]
    MissingMessage,

    /// Upstream answered with a non-success status; forwarded as-is.
    #[error("Upstream API Error: {message}")]
    Upstream {
        status: StatusCode,
        message: String,
        details: Value,
    },

    /// Anything unexpected. The cause is logged, never returned.
    #[error("Internal Server Error - Failed to process AI request.")]
    Internal { cause: String },
}

impl AskError {
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        Self::Internal {
            cause: cause.to_string(),
        }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::MissingMessage => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => *status,
            Self::MissingApiKey | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AskError {
    fn into_response(self) -> Response {
        match &self {
            Self::MissingApiKey => tracing::error!("upstream API key is not configured"),
            Self::Upstream {
                status, details, ..
            } => tracing::error!(%status, %details, "upstream API returned an error"),
            Self::Internal { cause } => tracing::error!(%cause, "ask request failed"),
            Self::MethodNotAllowed | Self::MissingMessage => {
                tracing::debug!(error = %self, "rejected ask request");
            }
        }

        let status = self.status();
        let details = match &self {
            Self::Upstream { details, .. } => Some(details.clone()),
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}
