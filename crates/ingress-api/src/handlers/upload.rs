//! Upload endpoint

use crate::auth::IdentityContext;
use crate::error::HttpAppError;
use crate::middleware::RequestId;
use crate::services::upload::{read_form, Admission, UploadContext};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header::USER_AGENT, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;

/// Accept an upload and run it through admission.
///
/// Errors are rendered inside the span so their log lines carry the request id
/// and whatever the pipeline recorded before failing.
#[tracing::instrument(
    name = "upload",
    skip_all,
    fields(
        app = "ingress",
        request_id = %request_id.0,
        source_host = %state.hostname,
        content_type = tracing::field::Empty,
        size = tracing::field::Empty,
        service = tracing::field::Empty,
        account = tracing::field::Empty,
        org_id = tracing::field::Empty,
    )
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    identity: IdentityContext,
    request: Request,
) -> Response {
    handle_upload(&state, request_id, identity, request)
        .await
        .unwrap_or_else(IntoResponse::into_response)
}

async fn handle_upload(
    state: &AppState,
    request_id: RequestId,
    identity: IdentityContext,
    request: Request,
) -> Result<Response, HttpAppError> {
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let debug_dump = state.config.debug_user_agent(&user_agent);
    if debug_dump {
        tracing::info!(
            user_agent = %user_agent,
            method = %request.method(),
            uri = %request.uri(),
            headers = ?request.headers(),
            "Debug request dump"
        );
    }

    let form = read_form(request).await?;
    if debug_dump {
        tracing::info!(parts = ?form.part_names(), "Debug form dump");
    }

    let ctx = UploadContext {
        request_id: request_id.0,
        identity: identity.identity,
        b64_identity: identity.raw,
    };

    let response = match state.pipeline.admit(ctx, form).await? {
        Admission::Test => StatusCode::OK.into_response(),
        Admission::Accepted { status, body } => {
            tracing::info!(status_code = status.as_u16(), "Upload accepted");
            (status, Json(body)).into_response()
        }
    };

    Ok(response)
}
