//! Data models for the gateway
//!
//! Each sub-module holds the records for one stage of an upload's life:
//! classification, client metadata, identity, the downstream request and the
//! status announcements.

mod identity;
mod metadata;
mod service;
mod status;
mod validation;

pub use identity::*;
pub use metadata::*;
pub use service::*;
pub use status::*;
pub use validation::*;
