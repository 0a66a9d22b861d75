//! Periodic driver for [`BlogWatcher::check_all`].
//!
//! Runs in the foreground until SIGINT/SIGTERM or [`Scheduler::stop`].
//! A stop request never interrupts a cycle that is already running.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};

use crate::watcher::BlogWatcher;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Seconds between two cycles (default: 3600 = 1 hour)
    pub interval_secs: u64,
    /// Whether to run a cycle immediately on start
    pub update_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            update_on_start: true,
        }
    }
}

/// Longest accepted interval: one year.
pub const MAX_INTERVAL_SECS: u64 = 365 * 86400;

/// Interval units, largest first.
const UNITS: [(char, u64); 4] = [('d', 86400), ('h', 3600), ('m', 60), ('s', 1)];

impl SchedulerConfig {
    /// Parse an interval such as "90s", "30m", "6h", "1d" or bare seconds.
    pub fn parse_interval(s: &str) -> Result<u64, String> {
        let s = s.trim().to_lowercase();

        let (digits, unit) = match UNITS.iter().find(|(suffix, _)| s.ends_with(*suffix)) {
            Some(&(suffix, unit)) => (&s[..s.len() - suffix.len_utf8()], unit),
            None => (s.as_str(), 1),
        };

        let count = digits
            .parse::<u64>()
            .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))?;
        let secs = count
            .checked_mul(unit)
            .ok_or_else(|| format!("Interval too large: {}", s))?;

        if secs == 0 {
            return Err("Interval must be positive".to_string());
        }
        if secs > MAX_INTERVAL_SECS {
            return Err(format!("Interval too large: {}", s));
        }
        Ok(secs)
    }

    /// Largest whole unit that divides `secs`, e.g. 7200 -> "2h".
    pub fn format_interval(secs: u64) -> String {
        UNITS
            .iter()
            .find(|&&(_, unit)| secs >= unit && secs % unit == 0)
            .map(|(suffix, unit)| format!("{}{}", secs / unit, suffix))
            .unwrap_or_else(|| format!("{}s", secs))
    }
}

pub struct Scheduler {
    watcher: Arc<BlogWatcher>,
    config: SchedulerConfig,
    running: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

impl Scheduler {
    pub fn new(watcher: Arc<BlogWatcher>, config: SchedulerConfig) -> Self {
        Self {
            watcher,
            config,
            running: Arc::new(AtomicBool::new(true)),
            stop: Arc::new(Notify::new()),
        }
    }

    /// Loop until stopped. Signal handlers are installed for the duration.
    pub async fn run(&self) {
        self.install_signal_handlers();

        tracing::info!(
            "blogwatch started (check interval: {}, PID: {})",
            SchedulerConfig::format_interval(self.config.interval_secs),
            std::process::id()
        );

        if self.config.update_on_start && self.is_running() {
            tracing::info!("Running initial check...");
            self.watcher.check_all().await;
        }

        let mut timer = interval(Duration::from_secs(self.config.interval_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await; // first tick completes immediately

        while self.is_running() {
            tokio::select! {
                _ = timer.tick() => {}
                _ = self.stop.notified() => break,
            }

            if !self.is_running() {
                break;
            }

            tracing::info!("Running scheduled check...");
            self.watcher.check_all().await;
        }

        tracing::info!("blogwatch shutting down");
    }

    /// Ask the loop to exit after the current cycle, if any.
    pub fn stop(&self) {
        request_stop(&self.running, &self.stop);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    #[cfg(unix)]
    fn install_signal_handlers(&self) {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Could not install signal handlers: {}", e);
                return;
            }
        };

        let running = self.running.clone();
        let stop = self.stop.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
            tracing::info!("Stop requested, finishing current cycle");
            request_stop(&running, &stop);
        });
    }

    #[cfg(not(unix))]
    fn install_signal_handlers(&self) {
        let running = self.running.clone();
        let stop = self.stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Stop requested, finishing current cycle");
                request_stop(&running, &stop);
            }
        });
    }
}

fn request_stop(running: &AtomicBool, stop: &Notify) {
    running.store(false, Ordering::SeqCst);
    // notify_one stores a permit, so a stop between cycles is not lost
    stop.notify_one();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::config::{Config, DetectorConfig, StaticConfigProvider};
    use crate::detector::ChangeDetector;
    use crate::notify::LogNotifier;
    use crate::store::{HistoryStore, SqliteStore};
    use crate::test_support::fast_fetcher;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_interval() {
        assert_eq!(SchedulerConfig::parse_interval("1h").unwrap(), 3600);
        assert_eq!(SchedulerConfig::parse_interval("30m").unwrap(), 1800);
        assert_eq!(SchedulerConfig::parse_interval("1d").unwrap(), 86400);
        assert_eq!(SchedulerConfig::parse_interval("60s").unwrap(), 60);
        assert_eq!(SchedulerConfig::parse_interval("3600").unwrap(), 3600);
        assert_eq!(SchedulerConfig::parse_interval(" 6H ").unwrap(), 21600);
        assert!(SchedulerConfig::parse_interval("invalid").is_err());
        assert!(SchedulerConfig::parse_interval("0m").is_err());
        assert!(SchedulerConfig::parse_interval("h").is_err());
        assert!(SchedulerConfig::parse_interval("-1h").is_err());
    }

    #[test]
    fn test_parse_interval_overflow_is_an_error() {
        let huge = format!("{}d", u64::MAX / 2);
        assert!(SchedulerConfig::parse_interval(&huge).unwrap_err().contains("too large"));
        assert!(SchedulerConfig::parse_interval(&u64::MAX.to_string()).is_err());
        assert!(SchedulerConfig::parse_interval("366d").is_err());
        assert_eq!(SchedulerConfig::parse_interval("365d").unwrap(), MAX_INTERVAL_SECS);
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(SchedulerConfig::format_interval(3600), "1h");
        assert_eq!(SchedulerConfig::format_interval(1800), "30m");
        assert_eq!(SchedulerConfig::format_interval(86400), "1d");
        assert_eq!(SchedulerConfig::format_interval(90), "90s");
        assert_eq!(SchedulerConfig::format_interval(7200), "2h");
        assert_eq!(SchedulerConfig::format_interval(0), "0s");
    }

    async fn setup() -> (MockServer, Arc<SqliteStore>, Arc<BlogWatcher>, String) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let toml = format!("[[blogs]]\nname = \"Example\"\nurl = \"{}\"\n", server.uri());
        let config = Config::parse(&toml, Path::new("test.toml")).unwrap();
        let blog_id = config.blogs().unwrap().remove(0).id;

        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let detector = ChangeDetector::new(Arc::new(fast_fetcher()), store.clone(), DetectorConfig::default());
        let watcher = Arc::new(BlogWatcher::new(
            Arc::new(StaticConfigProvider::new(config)),
            detector,
            Arc::new(LogNotifier),
            store.clone(),
        ));
        (server, store, watcher, blog_id)
    }

    #[tokio::test]
    async fn test_stop_before_run_skips_all_cycles() {
        let (_server, store, watcher, blog_id) = setup().await;
        let scheduler = Scheduler::new(watcher, SchedulerConfig::default());

        scheduler.stop();
        scheduler.run().await;

        assert!(!scheduler.is_running());
        assert!(store.list_by_blog(&blog_id, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_runs_cycles_on_interval_until_stopped() {
        let (_server, store, watcher, blog_id) = setup().await;
        let scheduler = Arc::new(Scheduler::new(
            watcher,
            SchedulerConfig {
                interval_secs: 1,
                update_on_start: true,
            },
        ));

        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run().await }
        });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        scheduler.stop();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        // initial cycle plus at least one scheduled one
        assert!(store.list_by_blog(&blog_id, 10).unwrap().len() >= 2);
    }
}
