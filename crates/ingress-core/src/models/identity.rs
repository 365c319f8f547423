use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Decoded `x-rh-identity` header.
///
/// The header is base64 encoded JSON shaped like
/// `{"identity": {"account_number": "...", "internal": {"org_id": "..."}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub identity: IdentityBody,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityBody {
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub internal: Internal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Internal {
    #[serde(default)]
    pub org_id: Option<String>,
}

impl Identity {
    pub fn new(account: impl Into<String>, org_id: impl Into<String>) -> Self {
        Self {
            identity: IdentityBody {
                account_number: Some(account.into()),
                internal: Internal {
                    org_id: Some(org_id.into()),
                },
            },
        }
    }

    pub fn from_header(value: &str) -> Result<Self, AppError> {
        let raw = STANDARD
            .decode(value.trim())
            .map_err(|e| AppError::InvalidInput(format!("identity header is not base64: {e}")))?;
        serde_json::from_slice(&raw)
            .map_err(|e| AppError::InvalidInput(format!("identity header is not valid JSON: {e}")))
    }

    /// Encode as a header value. Used by clients and tests.
    pub fn to_header(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    pub fn account(&self) -> &str {
        self.identity.account_number.as_deref().unwrap_or("")
    }

    pub fn org_id(&self) -> &str {
        self.identity.internal.org_id.as_deref().unwrap_or("")
    }
}
