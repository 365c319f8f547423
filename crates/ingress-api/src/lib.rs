//! Ingress API Library
//!
//! HTTP surface of the upload gateway: handlers, middleware, the admission
//! pipeline and application setup.

pub mod auth;
pub mod constants;
pub mod error;
mod handlers;
pub mod middleware;
pub mod services;
pub mod setup;
pub mod state;
mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use services::upload::{AdmissionPipeline, UploadResponse};
pub use state::AppState;
