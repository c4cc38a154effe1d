// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::hooks::HookError;
use crate::services::supabase::ProviderError;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Clinic account pending approval")]
    PendingApproval,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Identity provider error: {0}")]
    Identity(ProviderError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// True when the error came from a store uniqueness constraint.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_))
    }
}

/// An already-registered email is a conflict like any other uniqueness
/// violation.
impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        if err.is_conflict() {
            AppError::Conflict(err.message)
        } else {
            AppError::Identity(err)
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None, None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None, None),
            AppError::AuthenticationFailed(msg) => (
                StatusCode::UNAUTHORIZED,
                "authentication_failed",
                Some(msg.clone()),
                None,
            ),
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone()), None)
            }
            AppError::PendingApproval => (
                StatusCode::FORBIDDEN,
                "pending_approval",
                Some("Your clinic account is awaiting approval".to_string()),
                None,
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", None, Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()), None)
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                Some(msg.clone()),
                None,
            ),
            AppError::Conflict(msg) => {
                tracing::warn!(error = %msg, "Unique constraint violation");
                (StatusCode::CONFLICT, "conflict", Some(msg.clone()), None)
            }
            AppError::Identity(err) => {
                tracing::error!(error = %err, status = ?err.status, "Identity provider error");
                let status = match err.status {
                    Some(422) | Some(400) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, "identity_provider_error", Some(err.message.clone()), None)
            }
            AppError::Hook(err) => (
                StatusCode::BAD_REQUEST,
                "invalid_change",
                Some(err.to_string()),
                None,
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None, None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None, None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
