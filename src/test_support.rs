//! Fixtures shared by the detector tests.

use std::time::Duration;

use crate::fetcher::http_fetcher::{build_client, DEFAULT_TIMEOUT};
use crate::fetcher::{HttpFetcher, RetryPolicy};

/// Real HTTP fetcher with millisecond backoff.
pub fn fast_fetcher() -> HttpFetcher {
    let policy = RetryPolicy {
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        ..Default::default()
    };
    HttpFetcher::with_client(build_client(DEFAULT_TIMEOUT).unwrap(), policy)
}

/// RSS 2.0 document with one `<item>` per id, in the given order.
pub fn rss_feed(ids: &[&str]) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                "<item><title>Post {id}</title><link>https://example.com/{id}</link><guid>{id}</guid></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><rss version="2.0"><channel><title>Test Blog</title>{items}</channel></rss>"#
    )
}

/// `<urlset>` listing the given page URLs.
pub fn sitemap_xml(urls: &[String]) -> String {
    let entries: String = urls
        .iter()
        .map(|url| format!("<url><loc>{url}</loc></url>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#
    )
}

/// `<sitemapindex>` pointing at the given child sitemaps.
pub fn sitemap_index_xml(urls: &[String]) -> String {
    let entries: String = urls
        .iter()
        .map(|url| format!("<sitemap><loc>{url}</loc></sitemap>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</sitemapindex>"#
    )
}
