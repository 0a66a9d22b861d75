use serde::{Deserialize, Serialize};

/// Outcome of one check of one blog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub blog_id: String,
    pub changed: bool,
    pub http_status: u16,
    pub url_fingerprint: Option<String>,
    /// First check ever for this blog; `changed` is always true then.
    pub is_initial: bool,
}
