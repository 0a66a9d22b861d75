//! Feed discovery, parsing and feed-based change detection.
//!
//! ```text
//! home page HTML → discovery → candidate URLs → fetch → parse → entry keys
//! ```

pub mod detector;
pub mod discovery;
pub mod parser;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use detector::{FeedChangeDetector, FeedDetectionResult};
pub use discovery::{detect_feed_urls, FeedUrlDiscovery};
pub use parser::parse_feed;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub id: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFeed {
    pub url: String,
    pub title: Option<String>,
    /// Entries in document order
    pub entries: Vec<FeedEntry>,
}

impl ParsedFeed {
    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }
}
