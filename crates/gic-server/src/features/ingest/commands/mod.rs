pub mod ingest;

pub use ingest::{IngestFileCommand, IngestFileError, IngestFileResponse};
