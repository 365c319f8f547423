//! Fixed values shared by the gateway crates.

/// Reporter identity written into every accepted metadata document.
pub const REPORTER: &str = "ingress";

/// Days added to "now" to build the metadata staleness deadline.
pub const STALE_AFTER_DAYS: i64 = 30;

/// Validity window of a retrieval URL, counted from its generation time.
pub const RETRIEVAL_URL_TTL_SECS: u64 = 24 * 60 * 60;

/// Service that gets its own, larger payload ceiling.
pub const QPC_SERVICE: &str = "qpc";

/// Payload ceiling for [`QPC_SERVICE`], independent of the configured default.
pub const QPC_MAX_SIZE: u64 = 150 * 1024 * 1024;

/// Service answered with 201 when the upload carried no metadata part.
pub const ADVISOR_SERVICE: &str = "advisor";

/// Default maximum payload size (bytes) when `INGRESS_MAX_SIZE` is unset.
pub const DEFAULT_MAX_SIZE: u64 = 100 * 1024 * 1024;

/// Header carrying the opaque, base64-encoded identity document.
pub const IDENTITY_HEADER: &str = "x-rh-identity";

/// Header echoing the request id back to the client.
pub const REQUEST_ID_HEADER: &str = "x-rh-insights-request-id";
