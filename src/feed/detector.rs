use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::config::DetectorConfig;
use crate::domain::BlogState;
use crate::feed::{detect_feed_urls, parse_feed, ParsedFeed};
use crate::fetcher::{FetchResult, Fetcher};
use crate::normalizer::fingerprint;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDetectionResult {
    pub feed_url: Option<String>,
    pub entry_keys: Vec<String>,
    pub fingerprint: String,
    pub changed: bool,
    pub ok: bool,
}

impl FeedDetectionResult {
    fn unavailable() -> Self {
        Self {
            feed_url: None,
            entry_keys: Vec::new(),
            fingerprint: String::new(),
            changed: false,
            ok: false,
        }
    }
}

pub struct FeedChangeDetector {
    fetcher: Arc<dyn Fetcher>,
    config: DetectorConfig,
}

impl FeedChangeDetector {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: DetectorConfig) -> Self {
        Self { fetcher, config }
    }

    /// Compare the current feed entries with the ones recorded in `previous`.
    ///
    /// A fresh cached feed URL is tried first; discovery on the home page HTML
    /// only runs when that fails. Fetch errors that survive the retry budget
    /// are returned, everything else ends up as `ok = false`.
    pub async fn detect(
        &self,
        root: &FetchResult,
        base_url: &str,
        previous: Option<&BlogState>,
        now: DateTime<Utc>,
    ) -> Result<FeedDetectionResult> {
        let cached_url = previous
            .filter(|state| state.is_cache_fresh(self.config.cache_ttl_days, now))
            .and_then(|state| state.feed_url.as_deref());

        if let Some(feed_url) = cached_url {
            if let Some(feed) = self.fetch_and_parse(feed_url).await? {
                tracing::debug!("Using cached feed {} for {}", feed_url, base_url);
                return Ok(self.summarize(feed_url, &feed, previous));
            }
            tracing::debug!("Cached feed {} unusable, rediscovering", feed_url);
        }

        let html = root.content.as_deref().unwrap_or_default();
        let discovery = detect_feed_urls(html, base_url);

        for candidate in discovery.candidates() {
            if let Some(feed) = self.fetch_and_parse(candidate).await? {
                tracing::debug!("Found feed {} for {}", candidate, base_url);
                return Ok(self.summarize(candidate, &feed, previous));
            }
        }

        tracing::debug!("No usable feed for {}", base_url);
        Ok(FeedDetectionResult::unavailable())
    }

    async fn fetch_and_parse(&self, feed_url: &str) -> Result<Option<ParsedFeed>> {
        let result = self.fetcher.fetch(feed_url, None, None).await?;
        Ok(result
            .success_content()
            .and_then(|content| parse_feed(content, feed_url)))
    }

    fn summarize(
        &self,
        feed_url: &str,
        feed: &ParsedFeed,
        previous: Option<&BlogState>,
    ) -> FeedDetectionResult {
        let entry_keys: Vec<String> = feed
            .entries
            .iter()
            .take(self.config.feed_max_entries)
            .map(|entry| entry.id.clone())
            .collect();

        FeedDetectionResult {
            feed_url: Some(feed_url.to_string()),
            fingerprint: fingerprint(&entry_keys),
            changed: entries_changed(&entry_keys, previous),
            entry_keys,
            ok: true,
        }
    }
}

/// First sight of a blog is the orchestrator's call, and an empty feed says
/// nothing either way.
fn entries_changed(entry_keys: &[String], previous: Option<&BlogState>) -> bool {
    match previous {
        Some(state) if !entry_keys.is_empty() => entry_keys != state.entry_keys(),
        _ => false,
    }
}
