use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::Result;
use crate::config::{Config, ConfigProvider};
use crate::detector::ChangeDetector;
use crate::fetcher::http_fetcher::{build_client, HttpFetcher, DEFAULT_TIMEOUT};
use crate::fetcher::{Fetcher, RetryPolicy};
use crate::notify::{LogNotifier, Notifier, SlackNotifier};
use crate::store::sqlite::SqliteStore;
use crate::watcher::BlogWatcher;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppContext {
    /// Open the database at `db_path`, or the configured/default location.
    pub fn new(config: Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => config.db_path()?,
        };
        tracing::debug!("Using database {}", db_path.display());

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let client = build_client(DEFAULT_TIMEOUT)?;
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::with_client(client.clone(), RetryPolicy::default()));

        let notifier: Arc<dyn Notifier> = match config.webhook_url() {
            Some(url) => Arc::new(SlackNotifier::new(client, url)),
            None => Arc::new(LogNotifier),
        };

        Ok(Self {
            config,
            store,
            fetcher,
            notifier,
        })
    }

    pub fn detector(&self) -> ChangeDetector {
        ChangeDetector::new(self.fetcher.clone(), self.store.clone(), self.config.detector)
    }

    /// Watcher that re-reads its blog list from `provider` every cycle.
    pub fn watcher(&self, provider: Arc<dyn ConfigProvider>) -> BlogWatcher {
        BlogWatcher::new(provider, self.detector(), self.notifier.clone(), self.store.clone())
    }
}
