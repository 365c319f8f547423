//! API constants
//!
//! Route prefixes and fixed values of the HTTP surface.

/// Versioned API prefix
pub const API_PREFIX: &str = "/api/ingress/v1";

/// Body of the legacy JSON health ping, compared byte for byte.
pub const TEST_JSON_BODY: &[u8] = br#"{"test": "test"}"#;

/// Value of the `test` form field that marks a legacy ping.
pub const TEST_FORM_VALUE: &str = "test";

/// Room for multipart framing and non-file parts on top of the largest payload.
pub const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;
