//! Typed ingestion triggers
//!
//! Ingestion is started either by a direct `{bucket, key}` invocation or by a
//! storage "object created" notification. Both are decoded into
//! [`IngestionSource`] values so the transformer never sees the transport.

use aws_lambda_events::event::s3::{S3Event, S3EventRecord};
use serde::Deserialize;

use super::IngestionSource;
use crate::error::{GicError, Result};

/// Input that starts one ingestion run.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IngestTrigger {
    /// Explicit bucket/key supplied by the caller
    Direct(IngestionSource),
    /// Storage notification carrying one or more object records
    Notification(S3Event),
}

impl IngestTrigger {
    /// Decode a trigger from its JSON form.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Sources to ingest, in record order.
    pub fn sources(&self) -> Result<Vec<IngestionSource>> {
        match self {
            IngestTrigger::Direct(source) => Ok(vec![source.clone()]),
            IngestTrigger::Notification(event) => sources_from_notification(event),
        }
    }
}

/// Extract one source per notification record.
pub fn sources_from_notification(event: &S3Event) -> Result<Vec<IngestionSource>> {
    if event.records.is_empty() {
        return Err(GicError::InvalidEvent(
            "notification contains no records".to_string(),
        ));
    }

    event.records.iter().map(source_from_record).collect()
}

fn source_from_record(record: &S3EventRecord) -> Result<IngestionSource> {
    let bucket = record
        .s3
        .bucket
        .name
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| GicError::InvalidEvent("record is missing the bucket name".to_string()))?;

    let raw_key = record
        .s3
        .object
        .key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| GicError::InvalidEvent("record is missing the object key".to_string()))?;

    Ok(IngestionSource::new(bucket, decode_object_key(raw_key)?))
}

/// Notification keys are form-encoded: `+` is a space and the rest is
/// percent-encoded.
fn decode_object_key(raw_key: &str) -> Result<String> {
    let spaced = raw_key.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| GicError::InvalidEvent(format!("object key is not valid UTF-8: {}", e)))
}
