use chrono::{DateTime, Utc};
use gic_common::types::UploadPolicy;
use gic_common::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::storage::{ObjectStore, StorageError};

pub use gic_common::types::UploadRequest as AuthorizeUploadCommand;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeUploadResponse {
    pub presigned_url: String,
    pub bucket: String,
    pub key: String,
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizeUploadError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Storage(#[from] StorageError),
    #[error("Authorization timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl AuthorizeUploadError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, AuthorizeUploadError::Validation(_))
    }
}

/// Validate the request and presign a PUT for its exact bucket/key.
///
/// Nothing is retried: a storage failure is returned to the caller as is.
#[tracing::instrument(
    skip(store, policy),
    fields(bucket = ?command.bucket_name, key = ?command.object_key)
)]
pub async fn handle(
    store: &dyn ObjectStore,
    policy: &UploadPolicy,
    expires_in: Duration,
    command: AuthorizeUploadCommand,
) -> Result<AuthorizeUploadResponse, AuthorizeUploadError> {
    let upload = policy.validate(&command)?;
    let key = upload.key.to_string();

    let grant = store.presign_put(&upload.bucket, &key, expires_in).await?;

    tracing::info!(
        bucket = %upload.bucket,
        scope_id = %upload.key.scope_id(),
        file_name = upload.key.file_name(),
        expires_at = %grant.expires_at,
        "Upload authorized"
    );

    Ok(AuthorizeUploadResponse {
        presigned_url: grant.url,
        bucket: upload.bucket,
        key,
        expires_in: grant.expires_in.as_secs(),
        expires_at: grant.expires_at,
    })
}

/// [`handle`] bounded by `limit`; an overrun abandons the request.
pub async fn handle_with_timeout(
    store: &dyn ObjectStore,
    policy: &UploadPolicy,
    expires_in: Duration,
    limit: Duration,
    command: AuthorizeUploadCommand,
) -> Result<AuthorizeUploadResponse, AuthorizeUploadError> {
    tokio::time::timeout(limit, handle(store, policy, expires_in, command))
        .await
        .map_err(|_| AuthorizeUploadError::Timeout(limit))?
}
