//! Upload authorization
//!
//! Validates an upload request against the deployment's [`UploadPolicy`]
//! and issues a presigned PUT for the exact bucket/key requested.
//!
//! [`UploadPolicy`]: gic_common::types::UploadPolicy

pub mod commands;
pub mod routes;

pub use commands::{AuthorizeUploadCommand, AuthorizeUploadError, AuthorizeUploadResponse};

pub use routes::uploads_routes;
