//! Route configuration and setup.

use crate::constants::{API_PREFIX, FORM_OVERHEAD_BYTES};
use crate::handlers::{health, staged, upload};
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use ingress_core::constants::QPC_MAX_SIZE;
use ingress_core::Config;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Router {
    // Per-service ceilings are enforced by the pipeline; this only bounds
    // what a single request may stream in.
    let body_limit = usize::try_from(config.max_size().max(QPC_MAX_SIZE))
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let upload_routes = Router::new()
        .route(&format!("{}/upload", API_PREFIX), post(upload::upload))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(DefaultBodyLimit::disable());

    let mut router = Router::new()
        .route("/health", get(health::liveness_check))
        .route(&format!("{}/version", API_PREFIX), get(health::version))
        .merge(upload_routes);

    if state.local_stager.is_some() {
        router = router.route(
            &format!("{}/staged/{{key}}", API_PREFIX),
            get(staged::get_staged),
        );
        tracing::info!("Serving local retrieval URLs");
    }

    let http_concurrency_limit = config.http_concurrency_limit().max(1);
    tracing::info!(
        http_concurrency_limit,
        body_limit,
        "HTTP limits enabled"
    );

    router
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state)
}
