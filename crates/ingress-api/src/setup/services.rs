//! Construction of the staging backend, outbound collaborators and pipeline.

use crate::services::upload::AdmissionPipeline;
use crate::services::{
    DispatchAnnouncer, DispatchValidator, Dispatcher, HttpSink, LogSink, Sink,
};
use crate::state::AppState;
use anyhow::{Context, Result};
use ingress_core::models::{StagedRequest, StatusEvent};
use ingress_core::Config;
use ingress_storage::create_stager;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Initialize all services and build the shared application state
pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let staging = create_stager(config)
        .await
        .context("Failed to initialize staging backend")?;
    tracing::info!(
        backend = %staging.stager().backend_type(),
        "Staging backend initialized"
    );

    let announcer_sink = outbound_sink::<StatusEvent>(config, config.announcer_url(), "status")?;
    let validator_sink =
        outbound_sink::<StagedRequest>(config, config.validator_url(), "validation")?;

    let announcer = Arc::new(DispatchAnnouncer::new(Dispatcher::new(
        "announcer",
        announcer_sink,
        config.dispatch_shards(),
        config.dispatch_queue_size(),
    )));
    let validator = Arc::new(DispatchValidator::new(
        config.valid_services(),
        Dispatcher::new(
            "validator",
            validator_sink,
            config.dispatch_shards(),
            config.dispatch_queue_size(),
        ),
    ));

    let pipeline = AdmissionPipeline::from_config(config, staging.stager(), validator, announcer)
        .context("Failed to build admission pipeline")?;

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(Arc::new(AppState {
        config: config.clone(),
        pipeline: Arc::new(pipeline),
        local_stager: staging.local(),
        hostname,
    }))
}

/// HTTP sink when an endpoint is configured, log sink otherwise.
fn outbound_sink<T>(
    config: &Config,
    url: Option<&str>,
    kind: &'static str,
) -> Result<Arc<dyn Sink<T>>>
where
    T: Serialize + Send + Sync + 'static,
{
    match url {
        Some(url) => {
            tracing::info!(kind, url, "Delivering outbound messages over HTTP");
            let timeout = Duration::from_secs(config.dispatch_timeout_secs());
            Ok(Arc::new(HttpSink::new(url, timeout)?))
        }
        None => {
            tracing::warn!(kind, "No endpoint configured, outbound messages are only logged");
            Ok(Arc::new(LogSink::new(kind)))
        }
    }
}
