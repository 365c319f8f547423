use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Routing classification of an upload, derived from its declared content type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub service: String,
    pub category: String,
}

impl ServiceDescriptor {
    pub fn new(service: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            category: category.into(),
        }
    }
}

impl Display for ServiceDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}.{}", self.service, self.category)
    }
}
