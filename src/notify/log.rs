use async_trait::async_trait;

use crate::app::Result;
use crate::notify::{Notification, Notifier};

/// Writes notifications to the log; used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            title = %notification.title,
            url = notification.url.as_deref().unwrap_or(""),
            "{}",
            notification.body
        );
        Ok(())
    }
}
