use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{REPORTER, STALE_AFTER_DAYS};

/// Optional host metadata attached by the uploading client.
///
/// Unknown fields are ignored on parse. `reporter` and `stale_timestamp` are
/// owned by the gateway: see [`Metadata::stamp`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insights_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_manager_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bios_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ansible_host: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mac_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qpc_id: Option<String>,
    #[serde(default)]
    pub reporter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_timestamp: Option<DateTime<Utc>>,
}

impl Metadata {
    /// Overwrite the gateway-owned fields: reporter identity and a staleness
    /// deadline [`STALE_AFTER_DAYS`] after `now`.
    pub fn stamp(mut self, now: DateTime<Utc>) -> Self {
        self.reporter = REPORTER.to_string();
        self.stale_timestamp = Some(now + Duration::days(STALE_AFTER_DAYS));
        self
    }
}
