//! GIC Connector Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, validation, and error handling for the GIC connector.
//!
//! # Overview
//!
//! This crate provides functionality used by every GIC connector component:
//!
//! - **Error Handling**: Validation and common error types
//! - **Types**: Object keys, upload policy, write grants, ingestion sources
//! - **Logging**: Centralized `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use gic_common::types::{FileNameAllowList, UploadPolicy, UploadRequest};
//!
//! fn check(raw_key: &str) -> gic_common::Result<()> {
//!     let policy = UploadPolicy::new(
//!         "acct-cumulus-gic-connector-dev",
//!         FileNameAllowList::for_site("gic"),
//!     )?;
//!     let request = UploadRequest::new("acct-cumulus-gic-connector-dev", raw_key);
//!     let upload = policy.validate(&request)?;
//!     println!("upload accepted for scope {}", upload.key.scope_id());
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{GicError, Result, ValidationError};
