use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use ingress_core::constants::REQUEST_ID_HEADER;
use uuid::Uuid;

/// Request ID extension type
///
/// Also the staging key of the upload, so it is always freshly generated.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        RequestId(Uuid::new_v4().simple().to_string())
    }
}

/// Request ID middleware
/// Generates a unique request ID for each request and includes it in:
/// - Response headers (`x-rh-insights-request-id`)
/// - Request extensions (for handlers and logging)
///
/// An id sent by the client is logged for correlation but never reused.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = RequestId::generate();

    if let Some(upstream) = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        tracing::debug!(
            request_id = %request_id.0,
            upstream_request_id = %upstream,
            "Client supplied a request id"
        );
    }

    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id.0) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    response
}
