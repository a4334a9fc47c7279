use gic_common::types::{IngestTrigger, IngestionSource, MappedRecord, OUTPUT_HEADER};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::queue::{MessageQueue, OutgoingMessage, QueueError};
use crate::storage::{ObjectStore, StorageError};

pub use gic_common::types::IngestionSource as IngestFileCommand;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestFileResponse {
    pub source: IngestionSource,
    /// Header followed by one mapped line per record, in input order
    pub lines: Vec<String>,
    pub record_count: usize,
    pub message_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestFileError {
    #[error("{0}")]
    Fetch(#[from] StorageError),
    #[error("File is not valid UTF-8: {0}")]
    Decode(String),
    #[error("Failed to publish batch: {0}")]
    Publish(#[from] QueueError),
    #[error("Ingestion timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Result of one source within a trigger
#[derive(Debug)]
pub struct IngestOutcome {
    pub source: IngestionSource,
    pub result: Result<IngestFileResponse, IngestFileError>,
}

/// Render file contents as output lines.
///
/// The first line is dropped without inspection. Every other line is mapped
/// verbatim, in order, with no filtering or deduplication.
pub fn transform(content: &str) -> Vec<String> {
    std::iter::once(OUTPUT_HEADER.to_string())
        .chain(
            content
                .lines()
                .skip(1)
                .map(|line| MappedRecord::from_raw(line).to_csv_line()),
        )
        .collect()
}

/// Fetch, transform and publish one object as a single queue message.
///
/// Exactly one publish attempt is made. Redelivery after a consumer failure
/// belongs to the broker.
#[tracing::instrument(skip(store, queue), fields(source = %command))]
pub async fn handle(
    store: &dyn ObjectStore,
    queue: &dyn MessageQueue,
    command: IngestFileCommand,
) -> Result<IngestFileResponse, IngestFileError> {
    let bytes = store.get_object(&command.bucket, &command.key).await?;
    let content = String::from_utf8(bytes).map_err(|e| IngestFileError::Decode(e.to_string()))?;

    let lines = transform(&content);
    let record_count = lines.len() - 1;

    let message = OutgoingMessage::new(lines.join("\n"))
        .with_attribute("bucket", command.bucket.as_str())
        .with_attribute("key", command.key.as_str())
        .with_attribute("record_count", record_count.to_string());

    let message_id = queue.send(message).await?;

    tracing::info!(
        record_count,
        message_id = %message_id,
        "File ingested"
    );

    Ok(IngestFileResponse {
        source: command,
        lines,
        record_count,
        message_id,
    })
}

/// [`handle`] bounded by `limit`; an overrun abandons the run.
pub async fn handle_with_timeout(
    store: &dyn ObjectStore,
    queue: &dyn MessageQueue,
    limit: Duration,
    command: IngestFileCommand,
) -> Result<IngestFileResponse, IngestFileError> {
    tokio::time::timeout(limit, handle(store, queue, command))
        .await
        .map_err(|_| IngestFileError::Timeout(limit))?
}

/// Ingest every source a trigger names, in record order.
///
/// Fails only when the trigger itself is unusable. Per-source failures are
/// reported in the outcomes and do not stop later sources.
pub async fn handle_trigger(
    store: &dyn ObjectStore,
    queue: &dyn MessageQueue,
    limit: Duration,
    trigger: &IngestTrigger,
) -> gic_common::Result<Vec<IngestOutcome>> {
    let sources = trigger.sources()?;
    let mut outcomes = Vec::with_capacity(sources.len());

    for source in sources {
        let result = handle_with_timeout(store, queue, limit, source.clone()).await;
        if let Err(err) = &result {
            tracing::error!(source = %source, error = %err, "Error processing file");
        }
        outcomes.push(IngestOutcome { source, result });
    }

    Ok(outcomes)
}
