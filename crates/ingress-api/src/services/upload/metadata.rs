//! Client metadata extraction

use super::form::UploadForm;
use chrono::Utc;
use ingress_core::models::Metadata;
use thiserror::Error;
use tokio::io::AsyncReadExt;

const METADATA_FIELD: &str = "metadata";

#[derive(Debug, Error)]
pub enum MetadataError {
    /// Neither a metadata file part nor a non-empty metadata value was sent.
    #[error("no metadata supplied")]
    Absent,

    #[error("malformed metadata: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("failed to read metadata part: {0}")]
    Read(#[from] std::io::Error),
}

/// Read the optional metadata document, file part first, then plain value.
///
/// A parsed document is stamped with the gateway's reporter identity and a
/// staleness deadline.
pub async fn extract_metadata(form: &mut UploadForm) -> Result<Metadata, MetadataError> {
    let raw = match form.take_file(METADATA_FIELD) {
        Some(mut file) => {
            let mut buf = Vec::with_capacity(file.size as usize);
            let read = file.payload.read_to_end(&mut buf).await;
            file.payload.close();
            read?;
            buf
        }
        None => match form.take_value(METADATA_FIELD) {
            Some(value) if !value.is_empty() => value.into_bytes(),
            _ => return Err(MetadataError::Absent),
        },
    };

    let metadata: Metadata = serde_json::from_slice(&raw)?;
    Ok(metadata.stamp(Utc::now()))
}
