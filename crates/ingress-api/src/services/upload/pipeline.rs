//! Admission pipeline
//!
//! Takes one parsed upload from legacy-ping detection through classification,
//! size enforcement, identity binding, staging and hand-off. Every step before
//! staging may end the request; nothing is retried.
//!
//! The payload stream is owned by a [`Payload`](ingress_storage::Payload),
//! which is closed right after staging and otherwise released on drop, so
//! every exit path closes it exactly once.

use super::form::{FormFile, UploadForm};
use super::metadata::{extract_metadata, MetadataError};
use crate::services::{Announcer, Validator};
use axum::http::StatusCode;
use chrono::Utc;
use ingress_core::constants::{ADVISOR_SERVICE, QPC_MAX_SIZE, QPC_SERVICE};
use ingress_core::models::{Identity, StatusEvent, UploadStatus, ValidationRequest};
use ingress_core::{AppError, Config, ServiceResolver};
use ingress_storage::{StageInput, Stager};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::Span;

const RECEIVED_MSG: &str = "Payload received by ingress";

/// Per-request inputs that do not come from the body.
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub request_id: String,
    pub identity: Option<Identity>,
    /// Raw identity header, forwarded downstream unchanged.
    pub b64_identity: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadData {
    pub account_number: String,
}

#[derive(Debug)]
pub enum Admission {
    /// Legacy ping; answered with an empty 200.
    Test,
    Accepted {
        status: StatusCode,
        body: UploadResponse,
    },
}

pub struct AdmissionPipeline {
    resolver: Arc<ServiceResolver>,
    stager: Arc<dyn Stager>,
    validator: Arc<dyn Validator>,
    announcer: Arc<dyn Announcer>,
    max_size: u64,
    auth_enabled: bool,
}

impl AdmissionPipeline {
    pub fn new(
        resolver: Arc<ServiceResolver>,
        stager: Arc<dyn Stager>,
        validator: Arc<dyn Validator>,
        announcer: Arc<dyn Announcer>,
        max_size: u64,
        auth_enabled: bool,
    ) -> Self {
        Self {
            resolver,
            stager,
            validator,
            announcer,
            max_size,
            auth_enabled,
        }
    }

    pub fn from_config(
        config: &Config,
        stager: Arc<dyn Stager>,
        validator: Arc<dyn Validator>,
        announcer: Arc<dyn Announcer>,
    ) -> anyhow::Result<Self> {
        Ok(Self::new(
            Arc::new(config.service_resolver()?),
            stager,
            validator,
            announcer,
            config.max_size(),
            config.auth_enabled(),
        ))
    }

    /// Payload ceiling for a service.
    pub fn max_size_for(&self, service: &str) -> u64 {
        if service == QPC_SERVICE {
            QPC_MAX_SIZE
        } else {
            self.max_size
        }
    }

    /// Run one upload through admission.
    ///
    /// Records `content_type`, `size`, `service`, `account` and `org_id` on the
    /// caller's span as they become known.
    pub async fn admit(
        &self,
        ctx: UploadContext,
        mut form: UploadForm,
    ) -> Result<Admission, AppError> {
        if form.is_test() {
            tracing::info!("Legacy test request acknowledged");
            return Ok(Admission::Test);
        }

        let has_metadata = form.has_metadata_part();
        let FormFile {
            payload,
            content_type,
            size,
            ..
        } = form.take_payload()?;

        let span = Span::current();
        span.record("content_type", content_type.as_str());
        span.record("size", size);

        let descriptor = self.resolver.resolve(&content_type)?;
        span.record("service", descriptor.service.as_str());

        self.validator.validate_service(&descriptor)?;

        let max_size = self.max_size_for(&descriptor.service);
        if size > max_size {
            return Err(AppError::PayloadTooLarge(format!(
                "{} bytes exceeds the {} byte limit for {}",
                size, max_size, descriptor.service
            )));
        }

        let mut request =
            ValidationRequest::new(&ctx.request_id, size, &descriptor, &ctx.b64_identity);

        if self.auth_enabled {
            if let Some(identity) = &ctx.identity {
                request.account = identity.account().to_string();
                request.principal = identity.org_id().to_string();
                span.record("account", identity.account());
                span.record("org_id", identity.org_id());
            }
        }

        match extract_metadata(&mut form).await {
            Ok(metadata) => request.metadata = Some(metadata),
            Err(MetadataError::Absent) => tracing::debug!("No metadata supplied"),
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable metadata"),
        }

        // Later events for this id are only sent if `received` was queued.
        let announced = self.announcer.status(StatusEvent::new(
            &request.account,
            &ctx.request_id,
            UploadStatus::Received,
            RECEIVED_MSG,
        ));
        if !announced {
            tracing::warn!("Received status was dropped, suppressing later status events");
        }

        let mut input = StageInput {
            payload,
            key: ctx.request_id.clone(),
            account: request.account.clone(),
            org_id: request.principal.clone(),
            size,
        };

        let started = Instant::now();
        let staged = self.stager.stage(&mut input).await;
        input.close();
        let duration_ms = started.elapsed().as_millis() as u64;

        let url = match staged {
            Ok(url) => {
                tracing::info!(duration_ms, "Payload staged");
                url
            }
            Err(e) => {
                tracing::error!(duration_ms, error = %e, "Staging failed");
                if announced {
                    self.announcer.status(StatusEvent::new(
                        &request.account,
                        &ctx.request_id,
                        UploadStatus::Error,
                        format!("Failed to stage payload: {}", e),
                    ));
                }
                return Err(AppError::Staging(e.to_string()));
            }
        };

        let account = request.account.clone();
        let staged = request.staged(url, Utc::now());

        if announced {
            self.announcer.status(StatusEvent::new(
                &account,
                &ctx.request_id,
                UploadStatus::Success,
                format!("Sent to validation service: {}", descriptor.service),
            ));
        }
        self.validator.validate(staged);

        let status = if descriptor.service == ADVISOR_SERVICE && !has_metadata {
            StatusCode::CREATED
        } else {
            StatusCode::ACCEPTED
        };

        Ok(Admission::Accepted {
            status,
            body: UploadResponse {
                request_id: ctx.request_id,
                upload: (!account.is_empty()).then_some(UploadData {
                    account_number: account,
                }),
            },
        })
    }
}
