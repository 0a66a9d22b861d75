use serde::{Deserialize, Serialize};

use crate::app::Result;
use crate::normalizer::{normalize_url, NormalizationConfig};

/// One tracked site. `id` is the normalized form of `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogTarget {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl BlogTarget {
    /// Fails with `InvalidUrl` before any network activity if `url` is not an
    /// absolute http(s) URL.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let id = normalize_url(&url, None, &NormalizationConfig::default())?;
        Ok(Self {
            id,
            name: name.into(),
            url,
        })
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}
