use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::client::AnalyzeError;
use crate::analysis::extract::ExtractError;
use crate::auth::AuthError;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Upstream model error: {0}")]
    Upstream(String),

    #[error("Model response parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Token limit exceeded: {used} used + {requested} requested > {budget}")]
    TokenLimitExceeded {
        used: u64,
        requested: u64,
        budget: u64,
    },

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Http(_) | LlmError::Api { .. } => AppError::Upstream(err.to_string()),
            LlmError::Parse(_) | LlmError::EmptyContent => AppError::Parse(err.to_string()),
        }
    }
}

impl From<AnalyzeError> for AppError {
    fn from(err: AnalyzeError) -> Self {
        err.source.into()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::InvalidSession => AppError::Unauthorized,
            AuthError::Rejected { status, message } if (400..500).contains(&status) => {
                AppError::Validation(message)
            }
            other => AppError::Auth(other.to_string()),
        }
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::NotPdf => AppError::Validation("Only PDF files are supported".into()),
            ExtractError::NoText => AppError::Validation(
                "No text could be extracted from the PDF. Scanned decks are not supported.".into(),
            ),
            ExtractError::Pdf(e) => {
                tracing::warn!("PDF extraction failed: {e}");
                AppError::Validation("The PDF could not be read".into())
            }
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Persistence(format!("redis: {err}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            AppError::Auth(msg) => {
                tracing::error!("Auth error: {msg}");
                (StatusCode::BAD_GATEWAY, "AUTH_ERROR", msg.clone())
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream model error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "The analysis service could not be reached. Please try again.".to_string(),
                )
            }
            AppError::Parse(msg) => {
                tracing::error!("Model response parse error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "PARSE_ERROR",
                    "The analysis service returned an unreadable response.".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PERSISTENCE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Persistence(msg) => {
                tracing::error!("Persistence error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PERSISTENCE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::TokenLimitExceeded { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "TOKEN_LIMIT_EXCEEDED",
                self.to_string(),
            ),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
