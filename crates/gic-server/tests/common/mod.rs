//! Shared helpers for API integration tests
//!
//! The router runs over in-memory storage and queue backends so every test
//! is hermetic.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use gic_common::types::{FileNameAllowList, UploadPolicy};
use gic_server::{
    api,
    config::{CorsConfig, TimeoutConfig},
    features::FeatureState,
    queue::{MemoryQueue, RedriveSettings},
    storage::MemoryObjectStore,
};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const BUCKET: &str = "acct-cumulus-gic-connector-dev";
pub const SCOPE_ID: &str = "3fb14b7e-0a37-4e11-9c3a-2f0c6d9d4c0a";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryObjectStore>,
    pub queue: Arc<MemoryQueue>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_timeouts(TimeoutConfig::default())
    }

    pub fn with_timeouts(timeouts: TimeoutConfig) -> Self {
        let store = Arc::new(MemoryObjectStore::new());
        let queue = Arc::new(MemoryQueue::new(RedriveSettings::default()));
        let policy = UploadPolicy::new(BUCKET, FileNameAllowList::for_site("gic"))
            .expect("valid test policy");

        let state = FeatureState {
            store: store.clone(),
            queue: queue.clone(),
            policy: Arc::new(policy),
            grant_expiry: Duration::from_secs(3600),
            timeouts,
        };

        Self {
            router: api::create_router(state, &CorsConfig::default()),
            store,
            queue,
        }
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: impl Into<String>) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .method("POST")
                    .header("content-type", "application/json")
                    .body(Body::from(body.into()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);

        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }
}

/// A storage "object created" notification for the given keys in `bucket`.
pub fn notification(bucket: &str, keys: &[&str]) -> serde_json::Value {
    let records: Vec<serde_json::Value> = keys
        .iter()
        .map(|key| {
            serde_json::json!({
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "awsRegion": "us-east-1",
                "eventTime": "2024-05-01T12:00:00.000Z",
                "eventName": "ObjectCreated:Put",
                "userIdentity": { "principalId": "AWS:EXAMPLE" },
                "requestParameters": { "sourceIPAddress": "127.0.0.1" },
                "responseElements": {},
                "s3": {
                    "s3SchemaVersion": "1.0",
                    "configurationId": "gic-upload",
                    "bucket": {
                        "name": bucket,
                        "ownerIdentity": { "principalId": "EXAMPLE" },
                        "arn": format!("arn:aws:s3:::{}", bucket)
                    },
                    "object": { "key": key, "size": 64 }
                }
            })
        })
        .collect();

    serde_json::json!({ "Records": records })
}
