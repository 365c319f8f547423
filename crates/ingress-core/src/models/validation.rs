use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Metadata, ServiceDescriptor};

/// Record assembled by the admission pipeline for the downstream validator.
///
/// It has no retrieval URL or timestamp: those only exist on a
/// [`StagedRequest`], which can only be built from a staging result, so a
/// request cannot be forwarded before its payload is staged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub request_id: String,
    pub size: u64,
    pub service: String,
    pub category: String,
    /// Raw `x-rh-identity` header value, forwarded verbatim.
    pub b64_identity: String,
    /// Bound only when authentication enforcement is enabled.
    pub account: String,
    /// Org id; bound only when authentication enforcement is enabled.
    pub principal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl ValidationRequest {
    pub fn new(
        request_id: impl Into<String>,
        size: u64,
        descriptor: &ServiceDescriptor,
        b64_identity: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            size,
            service: descriptor.service.clone(),
            category: descriptor.category.clone(),
            b64_identity: b64_identity.into(),
            account: String::new(),
            principal: String::new(),
            metadata: None,
        }
    }

    /// Finalize the request once its payload is durably staged.
    pub fn staged(self, url: String, timestamp: DateTime<Utc>) -> StagedRequest {
        StagedRequest {
            request: self,
            url,
            timestamp,
        }
    }
}

/// A [`ValidationRequest`] whose payload has been staged and can be fetched
/// from `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedRequest {
    #[serde(flatten)]
    pub request: ValidationRequest,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

impl StagedRequest {
    pub fn request_id(&self) -> &str {
        &self.request.request_id
    }
}
