// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
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

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Administrator access required")]
    Forbidden,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Access code has already been used")]
    AlreadyUsed,

    #[error("Access code has expired")]
    Expired,

    #[error("An active verification submission already exists")]
    DuplicateActiveSubmission,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable kind, returned as `error` in responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidToken => "invalid_token",
            AppError::Forbidden => "forbidden",
            AppError::Validation(_) => "validation_error",
            AppError::PayloadTooLarge => "payload_too_large",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyUsed => "already_used",
            AppError::Expired => "expired",
            AppError::DuplicateActiveSubmission => "duplicate_active_submission",
            AppError::Database(_) | AppError::Storage(_) => "transient_failure",
            AppError::Internal(_) => "unknown",
        }
    }

    /// Whether the failure came from an unavailable backend rather than the
    /// request itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Storage(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyUsed | AppError::DuplicateActiveSubmission => StatusCode::CONFLICT,
            AppError::Expired => StatusCode::GONE,
            AppError::Database(_) | AppError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short message suitable for showing to the user.
    fn user_message(&self) -> String {
        match self {
            AppError::Unauthorized => "Please sign in to continue.".to_string(),
            AppError::InvalidToken => "Your session has expired. Please sign in again.".to_string(),
            AppError::Forbidden => "You do not have permission to do that.".to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::PayloadTooLarge => "That upload is too large.".to_string(),
            AppError::NotFound(_) => "We couldn't find what you were looking for.".to_string(),
            AppError::AlreadyUsed => "This code has already been used.".to_string(),
            AppError::Expired => "This code has expired.".to_string(),
            AppError::DuplicateActiveSubmission => {
                "You already have a verification that is pending or approved.".to_string()
            }
            AppError::Database(_) | AppError::Storage(_) => {
                "Service temporarily unavailable. Please try again.".to_string()
            }
            AppError::Internal(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return AppError::PayloadTooLarge;
        }
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(msg) => tracing::error!(error = %msg, "Database error"),
            AppError::Storage(msg) => tracing::error!(error = %msg, "Storage error"),
            AppError::Internal(err) => tracing::error!(error = %err, "Internal server error"),
            _ => {}
        }

        let body = ErrorResponse {
            success: false,
            error: self.kind(),
            message: self.user_message(),
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
