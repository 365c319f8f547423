use crate::traits::{StageInput, Stager, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use http::Method;
use ingress_core::constants::RETRIEVAL_URL_TTL_SECS;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, Result as ObjectResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;

/// S3 staging backend
#[derive(Clone)]
pub struct S3Stager {
    store: Arc<AmazonS3>,
    bucket: String,
}

impl S3Stager {
    /// Create a new S3Stager instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        // Credentials come from the environment; bucket and region are explicit.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Stager {
            store: Arc::new(store),
            bucket,
        })
    }

    fn object_attributes(input: &StageInput) -> Attributes {
        let mut attributes = Attributes::new();
        for (name, value) in input.attributes().pairs() {
            attributes.insert(Attribute::Metadata(name.into()), value.to_string().into());
        }
        attributes
    }
}

#[async_trait]
impl Stager for S3Stager {
    async fn stage(&self, input: &mut StageInput) -> StorageResult<String> {
        if input.key.is_empty() {
            return Err(StorageError::InvalidKey("empty staging key".to_string()));
        }

        let start = Instant::now();
        let location = Path::from(input.key.clone());
        let store: Arc<dyn ObjectStore> = self.store.clone();
        let mut writer =
            BufWriter::new(store, location).with_attributes(Self::object_attributes(input));

        let copied = match tokio::io::copy(&mut input.payload, &mut writer).await {
            Ok(n) => n,
            Err(e) => {
                let _ = writer.abort().await;
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %input.key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 stage failed"
                );
                return Err(StorageError::UploadFailed(e.to_string()));
            }
        };

        writer.shutdown().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %input.key,
                size_bytes = copied,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 stage failed on completion"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %input.key,
            size_bytes = copied,
            declared_size = input.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 stage successful"
        );

        self.get_url(&input.key).await
    }

    async fn get_url(&self, key: &str) -> StorageResult<String> {
        let location = Path::from(key.to_string());
        let url_result: ObjectResult<_> = self
            .store
            .signed_url(
                Method::GET,
                &location,
                Duration::from_secs(RETRIEVAL_URL_TTL_SECS),
            )
            .await;

        let url = url_result
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?
            .to_string();

        Ok(url)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
