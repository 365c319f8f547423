use crate::traits::{ObjectAttributes, StageInput, Stager, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use ingress_core::constants::RETRIEVAL_URL_TTL_SECS;
use sha2::Sha256;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const METADATA_DIR: &str = ".metadata";

/// Local filesystem staging backend
///
/// Objects live under `base_path/{key}` with their audit attributes in a JSON
/// sidecar under `base_path/.metadata/{key}.json`. Retrieval URLs are signed
/// with HMAC-SHA256 over `{key}:{expires}`.
#[derive(Clone)]
pub struct LocalStager {
    base_path: PathBuf,
    base_url: String,
    secret: Vec<u8>,
}

impl LocalStager {
    /// Create a new LocalStager instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for staged objects (e.g., "/var/lib/ingress/staged")
    /// * `base_url` - Base URL the staged route is served at
    /// * `secret` - Key used to sign retrieval URLs
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        secret: impl Into<Vec<u8>>,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(base_path.join(METADATA_DIR))
            .await
            .map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create staging directory {}: {}",
                    base_path.display(),
                    e
                ))
            })?;

        Ok(LocalStager {
            base_path,
            base_url,
            secret: secret.into(),
        })
    }

    /// Convert a staging key to a filesystem path with security validation
    ///
    /// Rejects empty keys, absolute keys and any segment starting with `.`,
    /// which covers traversal and the sidecar directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|segment| segment.is_empty() || segment.starts_with('.'))
        {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }

        Ok(self.base_path.join(key))
    }

    fn sidecar_path(&self, key: &str) -> StorageResult<PathBuf> {
        self.key_to_path(key)?;
        Ok(self
            .base_path
            .join(METADATA_DIR)
            .join(format!("{}.json", key)))
    }

    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn mac(&self) -> StorageResult<Hmac<Sha256>> {
        Hmac::<Sha256>::new_from_slice(&self.secret)
            .map_err(|e| StorageError::ConfigError(format!("Invalid signing key: {}", e)))
    }

    fn sign(&self, key: &str, expires: u64) -> StorageResult<String> {
        let mut mac = self.mac()?;
        mac.update(format!("{}:{}", key, expires).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a retrieval URL's `expires` and `signature` for `key`.
    pub fn verify(&self, key: &str, expires: u64, signature: &str) -> StorageResult<()> {
        if unix_now() > expires {
            return Err(StorageError::Expired);
        }

        let tag = hex::decode(signature).map_err(|_| StorageError::InvalidSignature)?;
        let mut mac = self.mac()?;
        mac.update(format!("{}:{}", key, expires).as_bytes());
        mac.verify_slice(&tag)
            .map_err(|_| StorageError::InvalidSignature)
    }

    /// Open a staged object for reading, returning the file and its length.
    pub async fn open(&self, key: &str) -> StorageResult<(fs::File, u64)> {
        let path = self.key_to_path(key)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Read the audit attributes written when `key` was staged.
    pub async fn read_attributes(&self, key: &str) -> StorageResult<ObjectAttributes> {
        let path = self.sidecar_path(key)?;
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw)
            .map_err(|e| StorageError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    async fn write_object(&self, path: &Path, input: &mut StageInput) -> StorageResult<u64> {
        self.ensure_parent_dir(path).await?;

        let mut file = fs::File::create(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let copied = tokio::io::copy(&mut input.payload, &mut file)
            .await
            .map_err(|e| {
                StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
            })?;

        file.flush().await?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        Ok(copied)
    }
}

#[async_trait]
impl Stager for LocalStager {
    async fn stage(&self, input: &mut StageInput) -> StorageResult<String> {
        let path = self.key_to_path(&input.key)?;
        let sidecar = self.sidecar_path(&input.key)?;
        let start = Instant::now();

        let copied = match self.write_object(&path, input).await {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&path).await;
                tracing::error!(
                    error = %e,
                    key = %input.key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local stage failed"
                );
                return Err(e);
            }
        };

        let attributes = serde_json::to_vec(&input.attributes())
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        self.ensure_parent_dir(&sidecar).await?;
        fs::write(&sidecar, attributes).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write attributes {}: {}",
                sidecar.display(),
                e
            ))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %input.key,
            size_bytes = copied,
            declared_size = input.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local stage successful"
        );

        self.get_url(&input.key).await
    }

    async fn get_url(&self, key: &str) -> StorageResult<String> {
        let path = self.key_to_path(key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let expires = unix_now() + RETRIEVAL_URL_TTL_SECS;
        let signature = self
            .sign(key, expires)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(format!(
            "{}/{}?expires={}&signature={}",
            self.base_url.trim_end_matches('/'),
            key,
            expires,
            signature
        ))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::payload::Payload;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    const BASE_URL: &str = "http://localhost:3000/api/ingress/v1/staged";

    async fn stager(dir: &Path) -> LocalStager {
        LocalStager::new(dir, BASE_URL.to_string(), b"test-secret".to_vec())
            .await
            .unwrap()
    }

    fn input(key: &str, data: &'static [u8]) -> StageInput {
        StageInput {
            payload: Payload::new(data),
            key: key.to_string(),
            account: "000001".to_string(),
            org_id: "54321".to_string(),
            size: data.len() as u64,
        }
    }

    fn query(url: &str) -> (u64, String) {
        let (_, query) = url.split_once('?').unwrap();
        let mut expires = 0;
        let mut signature = String::new();
        for pair in query.split('&') {
            match pair.split_once('=').unwrap() {
                ("expires", v) => expires = v.parse().unwrap(),
                ("signature", v) => signature = v.to_string(),
                _ => {}
            }
        }
        (expires, signature)
    }

    #[tokio::test]
    async fn test_stage_writes_object_and_attributes() {
        let dir = tempdir().unwrap();
        let stager = stager(dir.path()).await;

        let mut input = input("abc123", b"payload bytes");
        let url = stager.stage(&mut input).await.unwrap();
        assert!(url.starts_with(&format!("{}/abc123?expires=", BASE_URL)));

        let (mut file, len) = stager.open("abc123").await.unwrap();
        assert_eq!(len, 13);
        let mut body = Vec::new();
        file.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"payload bytes");

        let attributes = stager.read_attributes("abc123").await.unwrap();
        assert_eq!(attributes.request_id, "abc123");
        assert_eq!(attributes.account, "000001");
        assert_eq!(attributes.org, "54321");
    }

    #[tokio::test]
    async fn test_get_url_is_independent_of_staging() {
        let dir = tempdir().unwrap();
        let stager = stager(dir.path()).await;
        stager.stage(&mut input("k1", b"data")).await.unwrap();

        let first = stager.get_url("k1").await.unwrap();
        let second = stager.get_url("k1").await.unwrap();
        for url in [first, second] {
            let (expires, signature) = query(&url);
            assert!(expires >= unix_now() + RETRIEVAL_URL_TTL_SECS - 5);
            stager.verify("k1", expires, &signature).unwrap();
        }
    }

    #[tokio::test]
    async fn test_restaging_overwrites() {
        let dir = tempdir().unwrap();
        let stager = stager(dir.path()).await;
        stager.stage(&mut input("k1", b"first")).await.unwrap();
        stager.stage(&mut input("k1", b"second")).await.unwrap();

        let (_, len) = stager.open("k1").await.unwrap();
        assert_eq!(len, 6);
    }

    #[tokio::test]
    async fn test_verify_rejects_tampering_and_expiry() {
        let dir = tempdir().unwrap();
        let stager = stager(dir.path()).await;
        stager.stage(&mut input("k1", b"data")).await.unwrap();
        let (expires, signature) = query(&stager.get_url("k1").await.unwrap());

        assert!(matches!(
            stager.verify("k2", expires, &signature),
            Err(StorageError::InvalidSignature)
        ));
        assert!(matches!(
            stager.verify("k1", expires + 1, &signature),
            Err(StorageError::InvalidSignature)
        ));
        assert!(matches!(
            stager.verify("k1", expires, "zz"),
            Err(StorageError::InvalidSignature)
        ));

        let past = unix_now() - 1;
        let stale = stager.sign("k1", past).unwrap();
        assert!(matches!(
            stager.verify("k1", past, &stale),
            Err(StorageError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let dir = tempdir().unwrap();
        let stager = stager(dir.path()).await;

        for key in ["", "../etc/passwd", "/etc/passwd", ".metadata/k1", "a//b"] {
            let result = stager.stage(&mut input(key, b"x")).await;
            assert!(matches!(result, Err(StorageError::InvalidKey(_))), "{key:?}");
        }

        assert!(matches!(
            stager.get_url("missing").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            stager.open("missing").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stage_does_not_close_payload() {
        let dir = tempdir().unwrap();
        let stager = stager(dir.path()).await;
        let mut input = input("k1", b"data");
        stager.stage(&mut input).await.unwrap();
        assert!(!input.payload.is_closed());
        input.close();
        assert!(input.payload.is_closed());
    }
}
