//! Configuration module
//!
//! Process configuration is read once from the environment (plus an optional
//! `.env` file) at startup and passed explicitly to the components that need it.

use regex::Regex;
use std::collections::HashSet;
use std::env;

use crate::constants::DEFAULT_MAX_SIZE;
use crate::models::ServiceDescriptor;
use crate::service_resolver::ServiceResolver;
use crate::storage_types::StorageBackend;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_VALID_SERVICES: &str = "advisor,compliance,hccm,qpc,rhv,announcement,testareno";
const DEFAULT_CONTENT_TYPES: &str = "application/x-gzip; charset=binary=advisor:upload";
const DISPATCH_SHARDS: usize = 4;
const DISPATCH_QUEUE_SIZE: usize = 1024;
const DISPATCH_TIMEOUT_SECS: u64 = 10;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const MIN_URL_SECRET_LEN: usize = 32;

/// Settings shared by any process built on this crate
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub http_concurrency_limit: usize,
}

/// Ingress gateway configuration
#[derive(Clone, Debug)]
pub struct IngressConfig {
    pub base: BaseConfig,
    pub max_size: u64,
    pub valid_services: Vec<String>,
    /// Exact content type table: `(content_type, descriptor)`.
    pub content_types: Vec<(String, ServiceDescriptor)>,
    pub auth_enabled: bool,
    pub debug: bool,
    pub debug_user_agent: Regex,
    // Staging backend
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub staging_url_secret: Option<String>,
    // Outbound collaborators
    pub announcer_url: Option<String>,
    pub validator_url: Option<String>,
    pub dispatch_shards: usize,
    pub dispatch_queue_size: usize,
    pub dispatch_timeout_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<IngressConfig>);

impl Config {
    fn inner(&self) -> &IngressConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup, then validate it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = IngressConfig::from_lookup(lookup)?;
        config.validate()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Build the content type resolver from the configured exact table.
    pub fn service_resolver(&self) -> Result<ServiceResolver, anyhow::Error> {
        ServiceResolver::new(self.inner().content_types.iter().cloned())
    }

    pub fn valid_services(&self) -> HashSet<String> {
        self.inner().valid_services.iter().cloned().collect()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.inner().base.http_concurrency_limit
    }

    pub fn max_size(&self) -> u64 {
        self.inner().max_size
    }

    pub fn auth_enabled(&self) -> bool {
        self.inner().auth_enabled
    }

    pub fn debug(&self) -> bool {
        self.inner().debug
    }

    /// Whether a request from `user_agent` should get verbose request logging.
    pub fn debug_user_agent(&self, user_agent: &str) -> bool {
        self.inner().debug && self.inner().debug_user_agent.is_match(user_agent)
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn staging_url_secret(&self) -> Option<&str> {
        self.inner().staging_url_secret.as_deref()
    }

    pub fn announcer_url(&self) -> Option<&str> {
        self.inner().announcer_url.as_deref()
    }

    pub fn validator_url(&self) -> Option<&str> {
        self.inner().validator_url.as_deref()
    }

    pub fn dispatch_shards(&self) -> usize {
        self.inner().dispatch_shards
    }

    pub fn dispatch_queue_size(&self) -> usize {
        self.inner().dispatch_queue_size
    }

    pub fn dispatch_timeout_secs(&self) -> u64 {
        self.inner().dispatch_timeout_secs
    }
}

impl IngressConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());
        let flag = |key: &str, default: bool| {
            var(key)
                .map(|s| s.trim().to_lowercase())
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let base = BaseConfig {
            server_port: var("PORT")
                .unwrap_or_else(|| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment,
            http_concurrency_limit: var("HTTP_CONCURRENCY_LIMIT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(HTTP_CONCURRENCY_LIMIT),
        };

        let max_size = match var("INGRESS_MAX_SIZE") {
            Some(s) => s
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("INGRESS_MAX_SIZE must be a byte count"))?,
            None => DEFAULT_MAX_SIZE,
        };

        let valid_services = var("INGRESS_VALID_SERVICES")
            .unwrap_or_else(|| DEFAULT_VALID_SERVICES.to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let content_types = parse_content_types(
            &var("INGRESS_CONTENT_TYPES").unwrap_or_else(|| DEFAULT_CONTENT_TYPES.to_string()),
        )?;

        let debug_user_agent = var("DEBUG_USER_AGENT").unwrap_or_else(|| ".*".to_string());
        let debug_user_agent = Regex::new(&debug_user_agent)
            .map_err(|e| anyhow::anyhow!("DEBUG_USER_AGENT is not a valid regex: {}", e))?;

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(s) => s.parse()?,
            None => StorageBackend::S3,
        };

        Ok(IngressConfig {
            base,
            max_size,
            valid_services,
            content_types,
            auth_enabled: flag("AUTH", true),
            debug: flag("DEBUG", false),
            debug_user_agent,
            storage_backend,
            s3_bucket: var("S3_BUCKET"),
            s3_region: var("S3_REGION").or_else(|| var("AWS_REGION")),
            s3_endpoint: var("S3_ENDPOINT"),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL"),
            staging_url_secret: var("STAGING_URL_SECRET"),
            announcer_url: var("ANNOUNCER_URL"),
            validator_url: var("VALIDATOR_URL"),
            dispatch_shards: var("DISPATCH_SHARDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DISPATCH_SHARDS),
            dispatch_queue_size: var("DISPATCH_QUEUE_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DISPATCH_QUEUE_SIZE),
            dispatch_timeout_secs: var("DISPATCH_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DISPATCH_TIMEOUT_SECS),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_size == 0 {
            return Err(anyhow::anyhow!("INGRESS_MAX_SIZE must be greater than zero"));
        }

        if self.valid_services.is_empty() {
            return Err(anyhow::anyhow!("INGRESS_VALID_SERVICES must not be empty"));
        }

        if self.content_types.is_empty() {
            return Err(anyhow::anyhow!("INGRESS_CONTENT_TYPES must not be empty"));
        }

        if self.dispatch_shards == 0 || self.dispatch_queue_size == 0 {
            return Err(anyhow::anyhow!(
                "DISPATCH_SHARDS and DISPATCH_QUEUE_SIZE must be greater than zero"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
                let env = self.base.environment.to_lowercase();
                let production = env == "production" || env == "prod";
                let secret_len = self.staging_url_secret.as_deref().map_or(0, str::len);
                if production && secret_len < MIN_URL_SECRET_LEN {
                    return Err(anyhow::anyhow!(
                        "STAGING_URL_SECRET must be at least {} characters long in production",
                        MIN_URL_SECRET_LEN
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Parse `type=service:category` entries separated by commas.
///
/// The content type itself may contain `=` (parameters), so each entry is split
/// on its last `=`.
fn parse_content_types(raw: &str) -> Result<Vec<(String, ServiceDescriptor)>, anyhow::Error> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (content_type, target) = entry
                .rsplit_once('=')
                .ok_or_else(|| anyhow::anyhow!("invalid INGRESS_CONTENT_TYPES entry: {}", entry))?;
            let (service, category) = target
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("invalid INGRESS_CONTENT_TYPES entry: {}", entry))?;
            Ok((
                content_type.trim().to_string(),
                ServiceDescriptor::new(service.trim(), category.trim()),
            ))
        })
        .collect()
}
