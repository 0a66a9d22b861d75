use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::app::{Result, WatcherError};

/// Persisted detection state, one row per blog id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogState {
    pub blog_id: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub url_fingerprint: Option<String>,
    pub feed_url: Option<String>,
    pub sitemap_url: Option<String>,
    pub recent_entry_keys: Option<Vec<String>>,
    pub last_checked_at: DateTime<Utc>,
    pub last_changed_at: Option<DateTime<Utc>>,
    pub consecutive_errors: u32,
}

impl BlogState {
    pub fn new(blog_id: impl Into<String>, last_checked_at: DateTime<Utc>) -> Result<Self> {
        let state = Self {
            blog_id: blog_id.into(),
            etag: None,
            last_modified: None,
            url_fingerprint: None,
            feed_url: None,
            sitemap_url: None,
            recent_entry_keys: None,
            last_checked_at,
            last_changed_at: None,
            consecutive_errors: 0,
        };
        state.validate()?;
        Ok(state)
    }

    pub fn validate(&self) -> Result<()> {
        if self.blog_id.trim().is_empty() {
            return Err(WatcherError::Other("blog_id cannot be empty".into()));
        }
        Ok(())
    }

    pub fn entry_keys(&self) -> &[String] {
        self.recent_entry_keys.as_deref().unwrap_or(&[])
    }

    pub fn is_cache_fresh(&self, ttl_days: u32, now: DateTime<Utc>) -> bool {
        is_cache_fresh(self.last_checked_at, ttl_days, now)
    }
}

/// A previously discovered feed/sitemap URL may be reused while the last
/// check is younger than `ttl_days`.
pub fn is_cache_fresh(last_checked_at: DateTime<Utc>, ttl_days: u32, now: DateTime<Utc>) -> bool {
    now - last_checked_at < Duration::days(i64::from(ttl_days))
}

/// Append-only record of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckHistory {
    pub blog_id: String,
    pub checked_at: DateTime<Utc>,
    pub http_status: Option<u16>,
    pub changed: bool,
    pub url_fingerprint: Option<String>,
    pub error_message: Option<String>,
}
