//! Ingress Core Library
//!
//! Domain models, error types, configuration and content type resolution shared
//! by the storage and HTTP crates of the upload gateway.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod service_resolver;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, IngressConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use service_resolver::ServiceResolver;
pub use storage_types::StorageBackend;
