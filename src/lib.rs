//! # blogwatch
//!
//! Detects new posts on blogs that may or may not publish a feed.
//!
//! ## Architecture
//!
//! Each check runs one cascade per blog:
//!
//! ```text
//! Fetcher → Feed detector → Sitemap detector → Store → Notifier
//! ```
//!
//! - [`fetcher`]: HTTP client with ETag/conditional request support and retries
//! - [`feed`]: RSS/Atom discovery, parsing and entry-key comparison
//! - [`sitemap`]: robots.txt/sitemap discovery and URL-set fingerprinting
//! - [`store`]: SQLite persistence of per-blog state and check history
//! - [`notify`]: Slack webhook or log notifications
//!
//! ## Quick Start
//!
//! ```bash
//! # Check every configured blog once
//! blogwatch run --once
//!
//! # Keep checking every 30 minutes
//! blogwatch run --interval 30m
//!
//! # Check a single blog and show its recent checks
//! blogwatch check https://blog.rust-lang.org/
//! blogwatch history https://blog.rust-lang.org/
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together store, fetcher
/// and notifier.
pub mod app;

/// Command-line interface using clap.
///
/// - `run [--once] [--interval]` - Check all blogs, once or periodically
/// - `check <url>` - Check one blog now
/// - `history <url>` - Show recent checks
/// - `state` - List stored per-blog state
/// - `forget <url>` - Drop one blog's stored state
pub mod cli;

/// TOML configuration and the providers consulted at each cycle.
pub mod config;

/// The per-blog detection cascade.
pub mod detector;

/// Core domain models.
///
/// - [`BlogTarget`](domain::BlogTarget): A tracked blog and its normalized id
/// - [`BlogState`](domain::BlogState): Persisted detection state
/// - [`DetectionResult`](domain::DetectionResult): Outcome of one check
pub mod domain;

/// Feed discovery, lenient RSS/Atom parsing and entry-key change detection.
pub mod feed;

/// HTTP fetching with conditional request support.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for conditional GETs
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
/// - [`RetryPolicy`](fetcher::retry::RetryPolicy): Backoff for timeouts, 5xx and 429
pub mod fetcher;

/// URL canonicalization and order-sensitive fingerprints.
pub mod normalizer;

/// Change notifications via Slack webhook or the log.
pub mod notify;

/// Foreground periodic runner with graceful SIGINT/SIGTERM shutdown.
pub mod scheduler;

/// robots.txt and sitemap discovery, parsing and URL-set fingerprinting.
pub mod sitemap;

/// SQLite persistence layer.
///
/// - [`StateStore`](store::StateStore) / [`HistoryStore`](store::HistoryStore): Storage traits
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation of both
pub mod store;

/// Check-all cycle over the configured blogs.
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_support;
