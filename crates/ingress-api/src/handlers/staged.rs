//! Retrieval of payloads staged on the local backend

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header::{CONTENT_LENGTH, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use ingress_core::AppError;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub struct RetrievalQuery {
    pub expires: u64,
    pub signature: String,
}

/// Stream a staged object after checking its signed URL.
#[tracing::instrument(skip(state, query))]
pub async fn get_staged(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<RetrievalQuery>,
) -> Result<Response, HttpAppError> {
    let stager = state
        .local_stager
        .as_ref()
        .ok_or_else(|| AppError::NotFound(format!("No staged object {}", key)))?;

    stager.verify(&key, query.expires, &query.signature)?;
    let (file, size) = stager.open(&key).await?;

    tracing::debug!(size, "Serving staged object");

    Ok((
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (CONTENT_LENGTH, size.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
