//! Object storage capability
//!
//! The gateway presigns writes and the transformer reads uploaded objects
//! through [`ObjectStore`]. Failures are reported as a small closed set of
//! [`StorageError`] kinds so callers can match on them.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::{error::SdkError, presigning::PresigningConfig, Client};
use gic_common::types::WriteGrant;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::aws::{error_chain_message, is_credentials_error};

pub mod config;
pub mod memory;

pub use memory::MemoryObjectStore;

/// Storage failure kinds
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Credentials not available")]
    CredentialsUnavailable,

    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("{0}")]
    Backend(String),
}

impl StorageError {
    fn from_sdk<E, R>(err: SdkError<E, R>) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
        R: std::fmt::Debug + Send + Sync + 'static,
    {
        if is_credentials_error(&err) {
            StorageError::CredentialsUnavailable
        } else {
            StorageError::Backend(error_chain_message(&err))
        }
    }
}

/// Put/get capability over named buckets
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Issue a grant allowing one PUT of `bucket`/`key` for `expires_in`.
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<WriteGrant, StorageError>;

    /// Fetch the full contents of an object.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// S3-backed object store
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    /// False when the SDK config carries no credentials provider at all
    has_credentials: bool,
}

impl S3Storage {
    pub fn new(sdk_config: &SdkConfig, config: &config::StorageConfig) -> Self {
        debug!("Initializing storage with config: {:?}", config);

        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let has_credentials = sdk_config.credentials_provider().is_some();
        if !has_credentials {
            warn!("No credentials provider configured; storage calls will fail");
        }

        info!("Storage client initialized");

        Self {
            client: Client::from_conf(builder.build()),
            has_credentials,
        }
    }

    /// Without a provider the SDK presigns an unsigned URL instead of failing.
    fn require_credentials(&self) -> Result<(), StorageError> {
        if self.has_credentials {
            Ok(())
        } else {
            Err(StorageError::CredentialsUnavailable)
        }
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    #[instrument(skip(self))]
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<WriteGrant, StorageError> {
        self.require_credentials()?;

        let presigning_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::Backend(format!("Invalid grant window: {}", e)))?;

        let presigned_request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(StorageError::from_sdk)?;

        debug!("Generated presigned PUT for s3://{}/{}", bucket, key);

        Ok(WriteGrant::new(presigned_request.uri().to_string(), expires_in))
    }

    #[instrument(skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.require_credentials()?;

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::from_sdk(err)
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to read object body: {}", e)))?
            .into_bytes()
            .to_vec();

        debug!("Downloaded {} bytes from s3://{}/{}", data.len(), bucket, key);

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_credential_types::provider::{error::CredentialsError, future, ProvideCredentials};

    #[test]
    fn test_storage_error_messages() {
        assert_eq!(
            StorageError::CredentialsUnavailable.to_string(),
            "Credentials not available"
        );
        let not_found = StorageError::NotFound {
            bucket: "b".to_string(),
            key: "k/patients.txt".to_string(),
        };
        assert_eq!(not_found.to_string(), "Object not found: s3://b/k/patients.txt");
    }

    #[tokio::test]
    async fn test_presign_put_with_static_credentials() {
        let sdk_config = SdkConfig::builder()
            .region(aws_config::Region::new("us-east-1"))
            .credentials_provider(aws_sdk_s3::config::SharedCredentialsProvider::new(
                aws_credential_types::Credentials::new("AKIDEXAMPLE", "secret", None, None, "test"),
            ))
            .behavior_version(aws_config::BehaviorVersion::latest())
            .build();
        let storage = S3Storage::new(&sdk_config, &config::StorageConfig::default());

        let grant = storage
            .presign_put(
                "acct-cumulus-gic-connector-dev",
                "3fb14b7e-0a37-4e11-9c3a-2f0c6d9d4c0a/patients.txt",
                Duration::from_secs(3600),
            )
            .await
            .expect("presigning is local and should succeed");

        assert!(grant.url.contains("acct-cumulus-gic-connector-dev"));
        assert!(grant.url.contains("X-Amz-Expires=3600"));
        assert!(grant.url.contains("X-Amz-Signature="));
    }

    #[derive(Debug)]
    struct EmptyChain;

    impl ProvideCredentials for EmptyChain {
        fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
        where
            Self: 'a,
        {
            future::ProvideCredentials::ready(Err(CredentialsError::not_loaded(
                "no providers in chain",
            )))
        }
    }

    fn storage_without_provider() -> S3Storage {
        let sdk_config = SdkConfig::builder()
            .region(aws_config::Region::new("us-east-1"))
            .behavior_version(aws_config::BehaviorVersion::latest())
            .build();
        S3Storage::new(&sdk_config, &config::StorageConfig::default())
    }

    fn storage_with_empty_chain() -> S3Storage {
        let sdk_config = SdkConfig::builder()
            .region(aws_config::Region::new("us-east-1"))
            .credentials_provider(aws_sdk_s3::config::SharedCredentialsProvider::new(EmptyChain))
            .behavior_version(aws_config::BehaviorVersion::latest())
            .build();
        S3Storage::new(&sdk_config, &config::StorageConfig::default())
    }

    #[tokio::test]
    async fn test_no_provider_is_credentials_unavailable() {
        let storage = storage_without_provider();

        assert_eq!(
            storage.presign_put("bucket", "key", Duration::from_secs(60)).await,
            Err(StorageError::CredentialsUnavailable)
        );
        assert_eq!(
            storage.get_object("bucket", "key").await,
            Err(StorageError::CredentialsUnavailable)
        );
    }

    #[tokio::test]
    async fn test_unresolvable_credentials_are_credentials_unavailable() {
        let storage = storage_with_empty_chain();

        assert_eq!(
            storage.presign_put("bucket", "key", Duration::from_secs(60)).await,
            Err(StorageError::CredentialsUnavailable)
        );
        assert_eq!(
            storage.get_object("bucket", "key").await,
            Err(StorageError::CredentialsUnavailable)
        );
    }
}
