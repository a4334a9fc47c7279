//! API response types
//!
//! Every reply carries its HTTP status again as `statusCode` so invocation
//! results read the same whether they come over HTTP or from the CLI.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard `{statusCode, body}` envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(status: StatusCode, body: T) -> Self {
        Self {
            status_code: status.as_u16(),
            body,
        }
    }

    pub fn ok(body: T) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// `{error}` body of a failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl Envelope<ErrorBody> {
    pub fn error(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(
            status,
            ErrorBody {
                error: message.into(),
            },
        )
    }
}

/// Successful upload authorization
///
/// The grant URL sits beside `statusCode` rather than under `body`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantEnvelope {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub presigned_url: String,
    pub expires_in: u64,
}

impl GrantEnvelope {
    pub fn new(presigned_url: impl Into<String>, expires_in: u64) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            presigned_url: presigned_url.into(),
            expires_in,
        }
    }
}

impl IntoResponse for GrantEnvelope {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}
