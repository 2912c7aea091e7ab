// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired session: {0}")]
    InvalidSession(String),

    /// Network trouble or timeout talking to the auth provider.
    /// Treated like an invalid session by the state machine (fail closed),
    /// but kept distinct so logs can tell the two apart.
    #[error("Auth provider error: {0}")]
    AuthProvider(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Config generation failed: {0}")]
    Generation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Check whether a persistence error is really an authorization failure in
    /// disguise (expired token, policy rejection). Stores surface these as plain
    /// data errors, so we pattern-match the message text and force a sign-out
    /// instead of showing a generic failure.
    pub fn is_authorization_shaped(&self) -> bool {
        match self {
            AppError::Unauthorized | AppError::InvalidSession(_) => true,
            AppError::Database(msg) => {
                let lower = msg.to_lowercase();
                lower.contains("permission denied")
                    || lower.contains("permission_denied")
                    || lower.contains("unauthenticated")
                    || lower.contains("jwt expired")
                    || lower.contains("invalid authentication")
                    || lower.contains("row-level security")
                    || lower.contains("policy")
            }
            _ => false,
        }
    }
}

/// Map raw provider error text to a short, stable, user-facing message.
///
/// Provider wording is not a contract; anything unrecognized falls back to a
/// generic message rather than leaking raw error text to the UI.
pub fn friendly_auth_message(raw: &str) -> &'static str {
    let lower = raw.to_lowercase();
    if lower.contains("invalid login credentials") || lower.contains("invalid_grant") {
        "Incorrect email or password."
    } else if lower.contains("email not confirmed") {
        "Please confirm your email address before signing in."
    } else if lower.contains("already registered") || lower.contains("already exists") {
        "An account with this email already exists. Try signing in."
    } else if lower.contains("rate limit") || lower.contains("too many requests") {
        "Too many attempts. Please wait a moment and try again."
    } else if lower.contains("password") && lower.contains("at least") {
        "Password is too short."
    } else if lower.contains("invalid email") || lower.contains("validate email") {
        "Please enter a valid email address."
    } else {
        "Something went wrong. Please try again."
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidSession(msg) => {
                tracing::info!(reason = %msg, "Session rejected");
                (StatusCode::UNAUTHORIZED, "invalid_session", None)
            }
            AppError::AuthProvider(msg) => {
                tracing::warn!(error = %msg, "Auth provider error");
                (
                    StatusCode::UNAUTHORIZED,
                    "auth_unavailable",
                    Some(friendly_auth_message(msg).to_string()),
                )
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Generation(msg) => {
                tracing::warn!(error = %msg, "Config generation failed");
                (StatusCode::BAD_GATEWAY, "generation_failed", None)
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
