//! Sitemap discovery, parsing and URL-set based change detection.

pub mod detector;
pub mod discovery;
pub mod parser;

use serde::{Deserialize, Serialize};

pub use detector::{SitemapChangeDetector, SitemapDetectionResult};
pub use discovery::detect_sitemap_urls;
pub use parser::parse_sitemap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSitemap {
    pub url: String,
    /// Page URLs for a `urlset`, child sitemap URLs for a `sitemapindex`
    pub page_urls: Vec<String>,
    pub is_index: bool,
}
