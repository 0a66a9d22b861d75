//! The change detection cascade for a single blog.
//!
//! ```text
//! previous state ─┐
//! root HTML ──────┼─► feed detector ──(unchanged)──► sitemap detector
//!                 └──────────────────────────────────────┴─► new state + result
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::{Result, WatcherError};
use crate::config::DetectorConfig;
use crate::domain::{BlogState, BlogTarget, DetectionResult};
use crate::feed::{FeedChangeDetector, FeedDetectionResult};
use crate::fetcher::{FetchResult, Fetcher};
use crate::sitemap::{SitemapChangeDetector, SitemapDetectionResult};
use crate::store::StateStore;

pub struct ChangeDetector {
    fetcher: Arc<dyn Fetcher>,
    states: Arc<dyn StateStore>,
    feed: FeedChangeDetector,
    sitemap: SitemapChangeDetector,
}

impl ChangeDetector {
    pub fn new(fetcher: Arc<dyn Fetcher>, states: Arc<dyn StateStore>, config: DetectorConfig) -> Self {
        Self {
            feed: FeedChangeDetector::new(Arc::clone(&fetcher), config),
            sitemap: SitemapChangeDetector::new(Arc::clone(&fetcher), config),
            fetcher,
            states,
        }
    }

    pub async fn check(&self, blog: &BlogTarget) -> Result<DetectionResult> {
        self.check_at(blog, Utc::now()).await
    }

    /// Run the cascade as of `now` and persist the new state.
    ///
    /// Errors (root fetch, exhausted feed retries, storage) leave the stored
    /// state untouched.
    pub async fn check_at(&self, blog: &BlogTarget, now: DateTime<Utc>) -> Result<DetectionResult> {
        let previous = self.states.get(&blog.id)?;
        let root = self.fetch_root(&blog.url).await?;

        let feed = self.feed.detect(&root, &blog.url, previous.as_ref(), now).await?;

        let sitemap = if feed.changed {
            None
        } else {
            Some(self.sitemap.detect(&blog.url, previous.as_ref(), now).await)
        };

        let is_initial = previous.is_none();
        let changed = is_initial || feed.changed || sitemap.as_ref().map_or(false, |s| s.changed);
        let fingerprint = effective_fingerprint(&feed, sitemap.as_ref());

        tracing::debug!(
            "{}: feed ok={} changed={}, sitemap {:?}",
            blog.id,
            feed.ok,
            feed.changed,
            sitemap.as_ref().map(|s| (s.ok, s.changed))
        );

        let state = BlogState {
            blog_id: blog.id.clone(),
            etag: root.etag.clone(),
            last_modified: root.last_modified.clone(),
            url_fingerprint: fingerprint.clone(),
            feed_url: feed.feed_url,
            sitemap_url: sitemap.and_then(|s| s.sitemap_url),
            recent_entry_keys: Some(feed.entry_keys).filter(|keys| !keys.is_empty()),
            last_checked_at: now,
            last_changed_at: if changed && !is_initial {
                Some(now)
            } else {
                previous.as_ref().and_then(|p| p.last_changed_at)
            },
            consecutive_errors: 0,
        };
        self.states.upsert(&state)?;

        Ok(DetectionResult {
            blog_id: blog.id.clone(),
            changed,
            http_status: root.status_code,
            url_fingerprint: fingerprint,
            is_initial,
        })
    }

    /// The root page is fetched without validators, so a body is mandatory.
    async fn fetch_root(&self, url: &str) -> Result<FetchResult> {
        let root = self.fetcher.fetch(url, None, None).await?;
        if root.content.is_none() {
            return Err(WatcherError::MissingContent(url.to_string()));
        }
        Ok(root)
    }
}

/// The sitemap covers every page, so its fingerprint wins when it has one.
fn effective_fingerprint(
    feed: &FeedDetectionResult,
    sitemap: Option<&SitemapDetectionResult>,
) -> Option<String> {
    sitemap
        .and_then(|s| s.fingerprint.clone())
        .filter(|fp| !fp.is_empty())
        .or_else(|| Some(feed.fingerprint.clone()))
        .filter(|fp| !fp.is_empty())
}
