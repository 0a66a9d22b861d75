//! One check-all cycle over every configured blog.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::app::{Result, WatcherError};
use crate::config::ConfigProvider;
use crate::detector::ChangeDetector;
use crate::domain::{BlogTarget, CheckHistory, DetectionResult};
use crate::notify::{Notification, Notifier};
use crate::store::HistoryStore;

/// Counts for one [`BlogWatcher::check_all`] run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub checked: usize,
    pub changed: usize,
    pub initial: usize,
    pub failed: usize,
}

pub struct BlogWatcher {
    config: Arc<dyn ConfigProvider>,
    detector: ChangeDetector,
    notifier: Arc<dyn Notifier>,
    history: Arc<dyn HistoryStore>,
    cycle: Mutex<()>,
}

impl BlogWatcher {
    pub fn new(
        config: Arc<dyn ConfigProvider>,
        detector: ChangeDetector,
        notifier: Arc<dyn Notifier>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            config,
            detector,
            notifier,
            history,
            cycle: Mutex::new(()),
        }
    }

    /// Check every blog in configuration order.
    ///
    /// Concurrent calls are serialized. A failing blog is recorded in the
    /// history and the cycle moves on to the next one.
    pub async fn check_all(&self) -> CycleSummary {
        let _running = self.cycle.lock().await;
        let mut summary = CycleSummary::default();

        let blogs = match self.config.load().map_err(WatcherError::from).and_then(|c| c.blogs()) {
            Ok(blogs) => blogs,
            Err(e) => {
                tracing::warn!("Skipping cycle, configuration unavailable: {}", e);
                return summary;
            }
        };

        tracing::info!("Checking {} blogs", blogs.len());
        let start = Utc::now();

        for blog in &blogs {
            summary.checked += 1;
            match self.check_blog(blog).await {
                Ok(result) => {
                    if result.is_initial {
                        summary.initial += 1;
                    } else if result.changed {
                        summary.changed += 1;
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!("Check failed for {}: {}", blog.display_name(), e);
                }
            }
        }

        let elapsed = Utc::now().signed_duration_since(start);
        tracing::info!(
            "Cycle complete: {} checked, {} updated, {} initial, {} failed ({:.1}s)",
            summary.checked,
            summary.changed,
            summary.initial,
            summary.failed,
            elapsed.num_milliseconds() as f64 / 1000.0
        );
        summary
    }

    /// Check one blog, record the attempt and notify on change.
    pub async fn check_blog(&self, blog: &BlogTarget) -> Result<DetectionResult> {
        let outcome = self.detector.check(blog).await;
        self.record(blog, &outcome);

        let result = outcome?;
        if let Some(notification) = notification_for(blog, &result) {
            tracing::info!("{}", notification.title);
            if let Err(e) = self.notifier.send(&notification).await {
                tracing::warn!("Notification for {} failed: {}", blog.display_name(), e);
            }
        }
        Ok(result)
    }

    fn record(&self, blog: &BlogTarget, outcome: &Result<DetectionResult>) {
        let entry = match outcome {
            Ok(result) => CheckHistory {
                blog_id: result.blog_id.clone(),
                checked_at: Utc::now(),
                http_status: Some(result.http_status),
                changed: result.changed,
                url_fingerprint: result.url_fingerprint.clone(),
                error_message: None,
            },
            Err(e) => CheckHistory {
                blog_id: blog.id.clone(),
                checked_at: Utc::now(),
                http_status: match e {
                    WatcherError::HttpStatus { status, .. } => Some(*status),
                    _ => None,
                },
                changed: false,
                url_fingerprint: None,
                error_message: Some(e.to_string()),
            },
        };

        if let Err(e) = self.history.add(&entry) {
            tracing::warn!("Could not record history for {}: {}", blog.id, e);
        }
    }
}

fn notification_for(blog: &BlogTarget, result: &DetectionResult) -> Option<Notification> {
    let title = if result.is_initial {
        format!("Initial sync completed: {}", blog.display_name())
    } else if result.changed {
        format!("Blog updated: {}", blog.display_name())
    } else {
        return None;
    };

    Some(Notification {
        title,
        body: blog.display_name().to_string(),
        url: Some(blog.url.clone()),
    })
}
