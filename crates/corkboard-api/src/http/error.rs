//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use corkboard_types::error::{AuthError, RepositoryError, WriteError};

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    Write(WriteError),
    /// Missing or invalid bearer token.
    Unauthorized(String),
    Validation(String),
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Auth(e)
    }
}

impl From<WriteError> for AppError {
    fn from(e: WriteError) -> Self {
        AppError::Write(e)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Write(e.into())
    }
}

impl AppError {
    /// Status code and machine-readable error code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Auth(AuthError::InvalidCredentials) => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AppError::Auth(AuthError::EmailTaken(_)) => (StatusCode::CONFLICT, "EMAIL_TAKEN"),
            AppError::Auth(AuthError::WeakPassword { .. } | AuthError::InvalidEmail(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            AppError::Auth(AuthError::Cancelled) => (StatusCode::BAD_REQUEST, "SIGN_IN_CANCELLED"),
            AppError::Auth(AuthError::Provider(_)) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR"),
            AppError::Auth(AuthError::Transport(_)) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            AppError::Write(WriteError::Invalid(_)) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Write(WriteError::NotFound) => (StatusCode::NOT_FOUND, "MESSAGE_NOT_FOUND"),
            AppError::Write(WriteError::PermissionDenied) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::Write(WriteError::Transport(_)) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Auth(e) => e.to_string(),
            AppError::Write(e) => e.to_string(),
            AppError::Unauthorized(msg) | AppError::Validation(msg) | AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::warn!(%code, error = %self.message(), "request failed");
        }
        (status, Json(ApiResponse::error(code, &self.message()))).into_response()
    }
}
