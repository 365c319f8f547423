//! Ingress Storage Library
//!
//! This crate provides the staging abstraction and its implementations for the
//! upload gateway: S3 (via `object_store`) and the local filesystem.
//!
//! # Staging key format
//!
//! The staging key is the upload's request id, unchanged. Keys must be
//! non-empty and, for the local backend, must not contain `..`, a leading `/` or
//! dot-prefixed segments.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod payload;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_stager, ConfiguredStager};
pub use ingress_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStager;
pub use payload::Payload;
#[cfg(feature = "storage-s3")]
pub use s3::S3Stager;
pub use traits::{ObjectAttributes, StageInput, Stager, StorageError, StorageResult};
