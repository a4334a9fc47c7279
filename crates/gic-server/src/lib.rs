//! GIC Connector Server Library
//!
//! Upload authorization gateway and ingestion transformer for the GIC
//! connector.
//!
//! # Overview
//!
//! - **Uploads**: validates `{bucket_name, object_key}` requests against a
//!   fixed bucket and a `<uuid>/<file name>` key scheme, then issues a
//!   presigned PUT so clients upload directly to storage
//! - **Ingest**: on an "object created" notification (or a direct call),
//!   fetches the file, drops its header, maps each record to
//!   `<id>,mrn-<id>` and publishes the batch as one queue message
//!
//! # Delivery
//!
//! Publishing is at-least-once. The queue hides a received message for the
//! visibility timeout (300 s), redelivers it if not acknowledged, and after
//! three receives moves it to a dead-letter queue kept for 14 days. Neither
//! feature retries on its own.
//!
//! # Backends
//!
//! Storage and queue access go through the [`storage::ObjectStore`] and
//! [`queue::MessageQueue`] traits, backed by S3/SQS in production and by
//! in-memory implementations in tests.
//!
//! # Example
//!
//! ```no_run
//! use gic_server::{api, aws, config::Config, features::FeatureState};
//! use gic_server::{queue::SqsQueue, storage::S3Storage};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let sdk_config = aws::load_sdk_config(&config.aws).await;
//!     let state = FeatureState {
//!         store: Arc::new(S3Storage::new(&sdk_config, &config.storage)),
//!         queue: Arc::new(SqsQueue::new(&sdk_config, &config.queue)),
//!         policy: Arc::new(config.upload.upload_policy()?),
//!         grant_expiry: config.upload.grant_expiry(),
//!         timeouts: config.timeouts,
//!     };
//!     let app = api::create_router(state, &config.cors);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod aws;
pub mod config;
pub mod error;
pub mod features;
pub mod middleware;
pub mod queue;
pub mod storage;

// Re-export commonly used types
pub use error::{AppError, ServerResult};
