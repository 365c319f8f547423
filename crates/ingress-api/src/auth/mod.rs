//! Identity extraction
//!
//! The gateway does not authenticate requests itself; it trusts an upstream
//! proxy to supply the `x-rh-identity` header and only decodes it.

pub mod identity;

pub use identity::IdentityContext;
