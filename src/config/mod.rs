//! Configuration for blogwatch.
//!
//! Read from a TOML file (by default `~/.config/blogwatch/config.toml`).
//! If the default file doesn't exist, a commented template is written there.
//! Every section except `[[blogs]]` is optional.

pub mod provider;

pub use provider::{ConfigProvider, FileConfigProvider, StaticConfigProvider};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::Result as WatchResult;
use crate::domain::BlogTarget;
use crate::normalizer::{normalize_url, NormalizationConfig};
use crate::scheduler::MAX_INTERVAL_SECS;

/// Environment variable that overrides `[slack] webhook_url`.
pub const WEBHOOK_ENV: &str = "SLACK_WEBHOOK_URL";

/// Main configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub watcher: WatcherSettings,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub slack: Option<SlackConfig>,
    #[serde(default)]
    pub blogs: Vec<BlogConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherSettings {
    /// Seconds between two check cycles
    pub interval_secs: u64,
    /// Run one cycle immediately instead of waiting a full interval
    pub update_on_start: bool,
    /// SQLite database location; the platform data dir when unset
    pub db_path: Option<PathBuf>,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            update_on_start: true,
            db_path: None,
        }
    }
}

/// Knobs of the change detector, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// How long a discovered feed/sitemap URL is reused without rediscovery
    pub cache_ttl_days: u32,
    /// Entry keys kept per feed, in document order
    pub feed_max_entries: usize,
    pub lowercase_host: bool,
    pub strip_tracking_params: bool,
    pub strip_fragments: bool,
    pub force_https: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_days: 7,
            feed_max_entries: 50,
            lowercase_host: true,
            strip_tracking_params: true,
            strip_fragments: true,
            force_https: false,
        }
    }
}

impl DetectorConfig {
    pub fn normalization(&self) -> NormalizationConfig {
        NormalizationConfig {
            lowercase_host: self.lowercase_host,
            strip_tracking_params: self.strip_tracking_params,
            strip_fragments: self.strip_fragments,
            force_https: self.force_https,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogConfig {
    pub name: String,
    pub url: String,
}

impl Config {
    /// Load, apply the environment override and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config = Self::parse(&content, path)?.with_webhook_override(std::env::var(WEBHOOK_ENV).ok());
        config.validate(path)?;
        Ok(config)
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file is created from the template, which lists no
    /// blogs yet and therefore fails validation with a pointer to the file.
    pub fn load_or_init(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let path = Self::default_config_path()?;
        if !path.exists() {
            Self::create_default_config(&path)?;
        }
        Self::load(&path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Replace the webhook with `webhook_url` when it is set and non-empty.
    pub fn with_webhook_override(mut self, webhook_url: Option<String>) -> Self {
        if let Some(webhook_url) = webhook_url.filter(|url| !url.trim().is_empty()) {
            self.slack = Some(SlackConfig { webhook_url });
        }
        self
    }

    pub fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        };

        if self.blogs.is_empty() {
            return Err(invalid("at least one [[blogs]] entry is required".into()));
        }

        for (index, blog) in self.blogs.iter().enumerate() {
            if blog.name.trim().is_empty() {
                return Err(invalid(format!("blogs[{}]: name cannot be empty", index)));
            }
            if !is_http_url(&blog.url) {
                return Err(invalid(format!(
                    "blogs[{}] ({}): '{}' is not an absolute http(s) URL",
                    index, blog.name, blog.url
                )));
            }
        }

        if let Some(slack) = &self.slack {
            if !is_http_url(&slack.webhook_url) {
                return Err(invalid("slack.webhook_url must be an absolute http(s) URL".into()));
            }
        }

        if self.watcher.interval_secs == 0 {
            return Err(invalid("watcher.interval_secs must be positive".into()));
        }
        if self.watcher.interval_secs > MAX_INTERVAL_SECS {
            return Err(invalid(format!(
                "watcher.interval_secs cannot exceed {}",
                MAX_INTERVAL_SECS
            )));
        }

        if self.detector.feed_max_entries == 0 {
            return Err(invalid("detector.feed_max_entries must be positive".into()));
        }

        Ok(())
    }

    /// Blog targets in configuration order.
    pub fn blogs(&self) -> WatchResult<Vec<BlogTarget>> {
        self.blogs
            .iter()
            .map(|blog| BlogTarget::new(blog.name.clone(), blog.url.clone()))
            .collect()
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.slack.as_ref().map(|slack| slack.webhook_url.as_str())
    }

    /// Configured database path, or `<data dir>/blogwatch/blogwatch.db`.
    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.watcher.db_path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(data_dir.join("blogwatch").join("blogwatch.db"))
    }

    /// Get the default config file path: `~/.config/blogwatch/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("blogwatch").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        fs::write(path, Self::default_config_content()).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn default_config_content() -> &'static str {
        r##"# blogwatch configuration

[watcher]
# Seconds between check cycles
interval_secs = 3600
# Check every blog right after startup
update_on_start = true
# SQLite database (defaults to the platform data directory)
# db_path = "/var/lib/blogwatch/blogwatch.db"

[detector]
# Reuse a discovered feed/sitemap URL for this many days
cache_ttl_days = 7
# Number of feed entries remembered per blog
feed_max_entries = 50
lowercase_host = true
strip_tracking_params = true
strip_fragments = true
force_https = false

# Slack incoming webhook; SLACK_WEBHOOK_URL overrides it.
# Without one, notifications are only logged.
# [slack]
# webhook_url = "https://hooks.slack.com/services/..."

# One section per tracked blog:
# [[blogs]]
# name = "Example"
# url = "https://example.com/"
"##
    }
}

/// Same rule that derives blog ids, so a valid config always yields targets.
fn is_http_url(value: &str) -> bool {
    normalize_url(value, None, &NormalizationConfig::default()).is_ok()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config file at {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}
