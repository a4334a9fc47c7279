//! Feature modules implementing the GIC API
//!
//! Each feature is a vertical slice with its own commands and routes:
//!
//! - **uploads**: validate an upload request and issue a presigned PUT
//! - **ingest**: fetch an uploaded file, map its records, publish them

pub mod ingest;
pub mod uploads;

use axum::Router;
use gic_common::types::UploadPolicy;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TimeoutConfig;
use crate::queue::MessageQueue;
use crate::storage::ObjectStore;

/// Shared state for all feature routes
///
/// Read-only after startup; cloned cheaply into each handler.
#[derive(Clone)]
pub struct FeatureState {
    pub store: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn MessageQueue>,
    pub policy: Arc<UploadPolicy>,
    /// Lifetime of issued write grants
    pub grant_expiry: Duration,
    pub timeouts: TimeoutConfig,
}

/// Creates the API router with all feature routes mounted
///
/// - `POST /uploads/authorize` - issue a write grant
/// - `POST /ingest` - ingest a file or a storage notification
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .merge(uploads::uploads_routes())
        .merge(ingest::ingest_routes())
        .with_state(state)
}
