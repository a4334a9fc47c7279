use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::commands::{authorize, AuthorizeUploadCommand, AuthorizeUploadError};
use crate::api::response::{Envelope, GrantEnvelope};
use crate::error::AppError;
use crate::features::FeatureState;

pub fn uploads_routes() -> Router<FeatureState> {
    Router::new().route("/uploads/authorize", post(authorize_upload))
}

#[tracing::instrument(skip(state, payload))]
async fn authorize_upload(
    State(state): State<FeatureState>,
    payload: Result<Json<AuthorizeUploadCommand>, JsonRejection>,
) -> Result<Response, UploadApiError> {
    let Json(command) = payload.map_err(AppError::from)?;

    let response = authorize::handle_with_timeout(
        state.store.as_ref(),
        &state.policy,
        state.grant_expiry,
        state.timeouts.authorize,
        command,
    )
    .await?;

    Ok(GrantEnvelope::new(response.presigned_url, response.expires_in).into_response())
}

#[derive(Debug)]
enum UploadApiError {
    Request(AppError),
    Authorize(AuthorizeUploadError),
}

impl From<AppError> for UploadApiError {
    fn from(err: AppError) -> Self {
        Self::Request(err)
    }
}

impl From<AuthorizeUploadError> for UploadApiError {
    fn from(err: AuthorizeUploadError) -> Self {
        Self::Authorize(err)
    }
}

impl IntoResponse for UploadApiError {
    fn into_response(self) -> Response {
        match self {
            UploadApiError::Request(err) => {
                tracing::warn!(error = %err, "Rejected upload authorization request");
                err.into_response()
            },
            UploadApiError::Authorize(err) if err.is_client_error() => {
                tracing::warn!(error = %err, "Upload request failed validation");
                Envelope::error(StatusCode::BAD_REQUEST, err.to_string()).into_response()
            },
            UploadApiError::Authorize(err) => {
                tracing::error!(error = %err, "Upload authorization failed");
                Envelope::error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            },
        }
    }
}
