//! Error types for the GIC connector

use thiserror::Error;

/// Result type alias for GIC operations
pub type Result<T> = std::result::Result<T, GicError>;

/// Main error type for shared GIC operations
#[derive(Error, Debug)]
pub enum GicError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Client-caused request errors.
///
/// These always surface as a 400 and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing bucket_name or object_key")]
    MissingField,

    #[error("Invalid bucket name: {bucket}")]
    BucketNotPermitted { bucket: String },

    #[error("Invalid object key. Expected <uuid>/<file name> where file name is one of: {}", allowed.join(", "))]
    InvalidObjectKey { allowed: Vec<String> },
}
