use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Coarse lifecycle tag of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Received,
    Success,
    Error,
}

impl Display for UploadStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadStatus::Received => write!(f, "received"),
            UploadStatus::Success => write!(f, "success"),
            UploadStatus::Error => write!(f, "error"),
        }
    }
}

/// Status announcement for one upload, correlated by `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub account: String,
    pub request_id: String,
    pub status: UploadStatus,
    pub status_msg: String,
    pub date: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(
        account: impl Into<String>,
        request_id: impl Into<String>,
        status: UploadStatus,
        status_msg: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            request_id: request_id.into(),
            status,
            status_msg: status_msg.into(),
            date: Utc::now(),
        }
    }
}
