//! Staging abstraction trait
//!
//! This module defines the Stager trait that all staging backends must implement.

use crate::payload::Payload;
use crate::StorageBackend;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Staging operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Retrieval URL generation failed: {0}")]
    PresignFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Invalid retrieval signature")]
    InvalidSignature,

    #[error("Retrieval URL expired")]
    Expired,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for staging operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One staging request.
///
/// `key` is the request id; it is both the object key and the correlation id
/// of every status event for the upload.
#[derive(Debug)]
pub struct StageInput {
    pub payload: Payload,
    pub key: String,
    pub account: String,
    pub org_id: String,
    pub size: u64,
}

impl StageInput {
    /// Release the payload stream. Safe to call more than once.
    pub fn close(&mut self) {
        self.payload.close();
    }

    pub fn attributes(&self) -> ObjectAttributes {
        ObjectAttributes {
            request_id: self.key.clone(),
            account: self.account.clone(),
            org: self.org_id.clone(),
        }
    }
}

/// Audit attributes stored alongside every staged object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAttributes {
    #[serde(rename = "requestID")]
    pub request_id: String,
    pub account: String,
    pub org: String,
}

impl ObjectAttributes {
    /// Attribute names and values as they are written to the backend.
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            ("requestID", self.request_id.as_str()),
            ("account", self.account.as_str()),
            ("org", self.org.as_str()),
        ]
    }
}

/// Staging backend trait
///
/// Persists upload payloads durably under their request id and hands out
/// time-limited retrieval URLs. Implementations are shared by all requests and
/// must be safe for concurrent use. No retries happen here.
#[async_trait]
pub trait Stager: Send + Sync {
    /// Persist the full payload under `input.key` and return a retrieval URL.
    ///
    /// Staging the same key twice overwrites the earlier object. The payload is
    /// read to the end but not closed; releasing it is the caller's job.
    async fn stage(&self, input: &mut StageInput) -> StorageResult<String>;

    /// Derive a fresh retrieval URL for an already staged key, valid for 24
    /// hours from now.
    async fn get_url(&self, key: &str) -> StorageResult<String>;

    /// Get the staging backend type
    fn backend_type(&self) -> StorageBackend;
}
