use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use gic_common::types::IngestTrigger;
use serde::Serialize;

use super::commands::ingest::{self, IngestOutcome};
use crate::api::response::Envelope;
use crate::error::{AppError, ServerResult};
use crate::features::FeatureState;

pub fn ingest_routes() -> Router<FeatureState> {
    Router::new().route("/ingest", post(ingest_file))
}

/// Body of one ingestion result: the output lines, or the failure message
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum IngestBody {
    Lines(Vec<String>),
    Error(String),
}

impl From<IngestOutcome> for Envelope<IngestBody> {
    fn from(outcome: IngestOutcome) -> Self {
        match outcome.result {
            Ok(response) => Envelope::ok(IngestBody::Lines(response.lines)),
            Err(err) => Envelope::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                IngestBody::Error(format!("Error processing file: {}", err)),
            ),
        }
    }
}

#[tracing::instrument(skip(state, payload))]
async fn ingest_file(
    State(state): State<FeatureState>,
    payload: Result<Json<IngestTrigger>, JsonRejection>,
) -> ServerResult<Response> {
    let Json(trigger) = payload.map_err(AppError::from)?;

    let outcomes = ingest::handle_trigger(
        state.store.as_ref(),
        state.queue.as_ref(),
        state.timeouts.ingest,
        &trigger,
    )
    .await?;

    let mut results: Vec<Envelope<IngestBody>> = outcomes.into_iter().map(Envelope::from).collect();

    match trigger {
        IngestTrigger::Direct(_) if results.len() == 1 => Ok(results.remove(0).into_response()),
        _ => {
            let status = if results.iter().all(|r| r.status().is_success()) {
                StatusCode::OK
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            Ok(Envelope::new(status, results).into_response())
        },
    }
}
