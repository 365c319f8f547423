#[cfg(feature = "storage-local")]
use crate::LocalStager;
#[cfg(feature = "storage-s3")]
use crate::S3Stager;
use crate::{Stager, StorageBackend, StorageError, StorageResult};
use ingress_core::Config;
use std::sync::Arc;

/// The staging backend selected by configuration.
///
/// The local backend is kept as its concrete type as well, because the HTTP
/// layer serves its signed retrieval URLs.
#[derive(Clone)]
pub enum ConfiguredStager {
    #[cfg(feature = "storage-s3")]
    S3(Arc<S3Stager>),
    #[cfg(feature = "storage-local")]
    Local(Arc<LocalStager>),
}

impl ConfiguredStager {
    pub fn stager(&self) -> Arc<dyn Stager> {
        match self {
            #[cfg(feature = "storage-s3")]
            ConfiguredStager::S3(s) => s.clone(),
            #[cfg(feature = "storage-local")]
            ConfiguredStager::Local(s) => s.clone(),
        }
    }

    #[cfg(feature = "storage-local")]
    pub fn local(&self) -> Option<Arc<LocalStager>> {
        match self {
            ConfiguredStager::Local(s) => Some(s.clone()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

/// Create a staging backend based on configuration
pub async fn create_stager(config: &Config) -> StorageResult<ConfiguredStager> {
    match config.storage_backend() {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket()
                .map(String::from)
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let endpoint = config.s3_endpoint().map(String::from);

            let stager = S3Stager::new(bucket, region, endpoint).await?;
            Ok(ConfiguredStager::S3(Arc::new(stager)))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 staging backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config
                .local_storage_path()
                .map(String::from)
                .ok_or_else(|| {
                    StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
                })?;
            let base_url = config
                .local_storage_base_url()
                .map(String::from)
                .ok_or_else(|| {
                    StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
                })?;
            let secret = match config.staging_url_secret() {
                Some(secret) => secret.as_bytes().to_vec(),
                None => {
                    tracing::warn!(
                        "STAGING_URL_SECRET not set; retrieval URLs are signed with a per-process key"
                    );
                    uuid::Uuid::new_v4().as_bytes().to_vec()
                }
            };

            let stager = LocalStager::new(base_path, base_url, secret).await?;
            Ok(ConfiguredStager::Local(Arc::new(stager)))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local staging backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
