// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

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
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("No internal user for this identity")]
    NoInternalUser,

    #[error("Spotify account not connected")]
    NotConnected,

    #[error("Missing authorization code")]
    MissingCode,

    #[error("Invalid OAuth state")]
    InvalidState,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Spotify token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Spotify API error: {status_text}")]
    Provider { status_text: String },

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Spotify connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Spotify status check failed: {0}")]
    StatusCheckFailed(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Machine-readable code returned in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::MissingToken => "missing_token",
            AppError::InvalidToken => "invalid_token",
            AppError::NoInternalUser => "no_internal_user",
            AppError::NotConnected => "spotify_not_connected",
            AppError::MissingCode => "no_code",
            AppError::InvalidState => "invalid_state",
            AppError::Validation(_) => "validation_error",
            AppError::RefreshFailed(_) => "refresh_failed",
            AppError::Provider { .. } => "provider_error",
            AppError::Upstream(_) => "upstream_error",
            AppError::ConnectionFailed(_) => "connection_failed",
            AppError::StatusCheckFailed(_) => "status_check_failed",
            AppError::Database(_) => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingToken | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::NoInternalUser | AppError::NotConnected => StatusCode::NOT_FOUND,
            AppError::MissingCode | AppError::InvalidState | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::RefreshFailed(_) | AppError::Provider { .. } | AppError::Upstream(_) => {
                StatusCode::BAD_GATEWAY
            }
            AppError::ConnectionFailed(_)
            | AppError::StatusCheckFailed(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
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
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
        }

        let details = match &self {
            AppError::Validation(msg) => Some(msg.clone()),
            AppError::Provider { status_text } => Some(status_text.clone()),
            _ => None,
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
