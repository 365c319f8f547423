//! Content type to service descriptor resolution

use regex::Regex;
use std::collections::HashMap;

use crate::error::AppError;
use crate::models::ServiceDescriptor;

const VENDOR_PATTERN: &str = r"^application/vnd\.redhat\.([a-z0-9-]+)\.([a-z0-9-]+)";

/// Maps a declared payload content type to the service that owns it.
///
/// Built once at startup from the configured exact table; read-only afterwards
/// and shared between requests.
#[derive(Debug, Clone)]
pub struct ServiceResolver {
    exact: HashMap<String, ServiceDescriptor>,
    vendor: Regex,
}

impl ServiceResolver {
    pub fn new<I>(table: I) -> Result<Self, anyhow::Error>
    where
        I: IntoIterator<Item = (String, ServiceDescriptor)>,
    {
        let exact = table
            .into_iter()
            .map(|(content_type, descriptor)| (normalize(&content_type), descriptor))
            .collect();
        let vendor = Regex::new(VENDOR_PATTERN)?;
        Ok(Self { exact, vendor })
    }

    /// Resolve a declared content type.
    ///
    /// Exact table entries win; otherwise `application/vnd.redhat.<service>.<category>`
    /// (with any `+suffix` or parameters) is recognized structurally.
    pub fn resolve(&self, content_type: &str) -> Result<ServiceDescriptor, AppError> {
        let normalized = normalize(content_type);
        if normalized.is_empty() {
            return Err(AppError::UnsupportedMediaType(
                "missing content type".to_string(),
            ));
        }

        if let Some(descriptor) = self.exact.get(&normalized) {
            return Ok(descriptor.clone());
        }

        self.vendor
            .captures(&normalized)
            .and_then(|caps| {
                Some(ServiceDescriptor::new(
                    caps.get(1)?.as_str(),
                    caps.get(2)?.as_str(),
                ))
            })
            .ok_or_else(|| AppError::UnsupportedMediaType(content_type.to_string()))
    }
}

/// Lowercase and collapse whitespace around parameter separators.
fn normalize(content_type: &str) -> String {
    content_type
        .split(';')
        .map(|part| part.trim().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ServiceResolver {
        ServiceResolver::new([(
            "application/x-gzip; charset=binary".to_string(),
            ServiceDescriptor::new("advisor", "upload"),
        )])
        .unwrap()
    }

    #[test]
    fn exact_entry_matches_after_normalization() {
        let r = resolver();
        let d = r.resolve("Application/X-Gzip;charset=binary").unwrap();
        assert_eq!(d, ServiceDescriptor::new("advisor", "upload"));
    }

    #[test]
    fn vendor_type_resolves_structurally() {
        let r = resolver();
        let d = r
            .resolve("application/vnd.redhat.qpc.tar+tgz; charset=binary")
            .unwrap();
        assert_eq!(d.service, "qpc");
        assert_eq!(d.category, "tar");

        let d = r.resolve("application/vnd.redhat.hccm.filename").unwrap();
        assert_eq!(d.to_string(), "hccm.filename");
    }

    #[test]
    fn unknown_types_are_unsupported() {
        let r = resolver();
        for ct in ["application/x-gzip", "text/plain", "", "application/vnd.redhat.advisor"] {
            match r.resolve(ct) {
                Err(AppError::UnsupportedMediaType(_)) => {}
                other => panic!("{ct:?} resolved to {other:?}"),
            }
        }
    }
}
