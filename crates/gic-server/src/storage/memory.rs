//! In-process object store for tests and local runs

use async_trait::async_trait;
use gic_common::types::WriteGrant;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ObjectStore, StorageError};

/// Object store held in memory.
///
/// Grants are `memory://` URLs carrying a fresh signature each time. A
/// failure or a delay can be injected to exercise error and timeout paths.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    failure: RwLock<Option<StorageError>>,
    delay: RwLock<Option<Duration>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    /// Make every subsequent call fail with `err`.
    pub async fn fail_with(&self, err: StorageError) {
        *self.failure.write().await = Some(err);
    }

    pub async fn clear_failure(&self) {
        *self.failure.write().await = None;
    }

    /// Make every subsequent call sleep for `delay` before answering.
    pub async fn delay_with(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    async fn injected_failure(&self) -> Result<(), StorageError> {
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.failure.read().await.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<WriteGrant, StorageError> {
        self.injected_failure().await?;

        let url = format!(
            "memory://{}/{}?X-Amz-Expires={}&X-Amz-Signature={}",
            bucket,
            key,
            expires_in.as_secs(),
            Uuid::new_v4().simple()
        );

        Ok(WriteGrant::new(url, expires_in))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.injected_failure().await?;

        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}
