//! API error types and response formatting.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::domain::DraftError;

/// API error type that converts to appropriate HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or wrong shared secret.
    #[error("unauthorized")]
    Unauthorized,

    /// Too many failed attempts from one client.
    #[error("rate limited, retry in {wait_seconds}s")]
    RateLimited { wait_seconds: u64 },

    /// A required secret is not configured on the server.
    #[error("not configured: {0}")]
    Unconfigured(&'static str),

    /// Resource not found; `code` is the machine-readable error.
    #[error("not found: {message}")]
    NotFound { code: &'static str, message: String },

    /// Request conflicts with current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid request parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Unconfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DraftError> for ApiError {
    fn from(err: DraftError) -> Self {
        match err {
            DraftError::NotFound(id) => Self::NotFound {
                code: "DRAFT_NOT_FOUND",
                message: format!("no draft with id {}", id),
            },
            DraftError::InvalidTransition { .. } => Self::Conflict(err.to_string()),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    authorized: Option<bool>,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wait_seconds: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = ErrorResponse {
            success: false,
            authorized: None,
            error: "",
            message: None,
            wait_seconds: None,
        };

        match &self {
            Self::Unauthorized => {
                body.authorized = Some(false);
                body.error = "UNAUTHORIZED";
            }
            Self::RateLimited { wait_seconds } => {
                body.authorized = Some(false);
                body.error = "RATE_LIMITED";
                body.message = Some("Too many failed attempts".to_string());
                body.wait_seconds = Some(*wait_seconds);
            }
            Self::Unconfigured(what) => {
                body.authorized = Some(false);
                body.error = "NOT_CONFIGURED";
                body.message = Some(format!("{} is not configured", what));
            }
            Self::NotFound { code, message } => {
                body.error = code;
                body.message = Some(message.clone());
            }
            Self::Conflict(msg) => {
                body.error = "CONFLICT";
                body.message = Some(msg.clone());
            }
            Self::BadRequest(msg) => {
                body.error = "BAD_REQUEST";
                body.message = Some(msg.clone());
            }
            Self::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                body.error = "INTERNAL_ERROR";
                body.message = Some("An internal error occurred".to_string());
            }
        }

        (status, Json(body)).into_response()
    }
}
