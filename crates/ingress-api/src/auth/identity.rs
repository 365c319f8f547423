use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use ingress_core::constants::IDENTITY_HEADER;
use ingress_core::models::Identity;
use std::convert::Infallible;

/// Identity supplied by the trusted upstream proxy.
///
/// `raw` is the header value exactly as received and is forwarded downstream
/// unchanged. A missing or undecodable header yields `identity: None`; it never
/// rejects the request.
#[derive(Debug, Clone, Default)]
pub struct IdentityContext {
    pub identity: Option<Identity>,
    pub raw: String,
}

impl IdentityContext {
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            return Self::default();
        }

        let identity = match Identity::from_header(raw) {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to decode identity header");
                None
            }
        };

        Self {
            identity,
            raw: raw.to_string(),
        }
    }
}

// Extracted from parts so it can be combined with a body-consuming extractor
impl<S> FromRequestParts<S> for IdentityContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Ok(Self::from_raw(raw))
    }
}
