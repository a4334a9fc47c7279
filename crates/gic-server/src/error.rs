//! Server-specific error types

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use gic_common::{GicError, ValidationError};
use thiserror::Error;

use crate::api::response::Envelope;

/// Result type alias for server operations
pub type ServerResult<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl From<GicError> for AppError {
    fn from(err: GicError) -> Self {
        match err {
            GicError::Validation(e) => AppError::Validation(e),
            GicError::Serialization(e) => AppError::BadRequest(format!("Invalid request body: {}", e)),
            GicError::InvalidEvent(msg) => AppError::BadRequest(format!("Invalid event: {}", msg)),
            GicError::Config(msg) => AppError::Config(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Config(message) => {
                tracing::error!("Configuration error: {}", message);
                "Server configuration error".to_string()
            },
            other => other.to_string(),
        };

        Envelope::error(status, message).into_response()
    }
}
