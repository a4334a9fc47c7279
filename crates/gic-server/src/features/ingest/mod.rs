//! File ingestion
//!
//! Fetches an uploaded object, maps each record after the header and
//! publishes the rendered batch as one queue message. Triggered directly
//! with a bucket/key or by a storage notification.

pub mod commands;
pub mod routes;

pub use commands::{IngestFileCommand, IngestFileError, IngestFileResponse};

pub use routes::ingest_routes;
