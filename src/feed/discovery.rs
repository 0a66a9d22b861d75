use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

/// Paths probed, in order, when a page advertises no feed.
pub const COMMON_FEED_PATHS: [&str; 5] = ["/feed", "/rss.xml", "/atom.xml", "/rss", "/feed.xml"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedUrlDiscovery {
    /// Feeds advertised via `<link rel="alternate">`
    pub discovered: Vec<String>,
    /// Common feed paths; only filled when nothing was discovered
    pub fallbacks: Vec<String>,
}

impl FeedUrlDiscovery {
    pub fn candidates(&self) -> &[String] {
        if self.discovered.is_empty() {
            &self.fallbacks
        } else {
            &self.discovered
        }
    }
}

pub fn detect_feed_urls(html: &str, base_url: &str) -> FeedUrlDiscovery {
    let base = Url::parse(base_url).ok();
    let resolve = |href: &str| -> Option<String> {
        match &base {
            Some(base) => base.join(href).ok().map(String::from),
            None => Url::parse(href).ok().map(String::from),
        }
    };

    let mut urls = Vec::new();
    let document = Html::parse_document(html);
    if let Ok(selector) = Selector::parse("link") {
        for link in document.select(&selector) {
            let element = link.value();

            let is_alternate = element
                .attr("rel")
                .map(|rel| {
                    rel.split_ascii_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("alternate"))
                })
                .unwrap_or(false);
            if !is_alternate {
                continue;
            }

            let Some(href) = element.attr("href").filter(|h| !h.trim().is_empty()) else {
                continue;
            };

            if let Some(link_type) = element.attr("type").filter(|t| !t.is_empty()) {
                if !is_feed_type(link_type) {
                    continue;
                }
            }

            if let Some(url) = resolve(href.trim()) {
                urls.push(url);
            }
        }
    }

    let discovered = dedupe(urls);
    let fallbacks = if discovered.is_empty() {
        COMMON_FEED_PATHS.iter().filter_map(|path| resolve(path)).collect()
    } else {
        Vec::new()
    };

    FeedUrlDiscovery {
        discovered,
        fallbacks,
    }
}

/// `application/rss+xml`, `application/atom+xml`, `text/xml`, ...
fn is_feed_type(link_type: &str) -> bool {
    link_type.to_ascii_lowercase().contains("xml")
}

pub(crate) fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}
