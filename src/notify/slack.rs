use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::app::{Result, WatcherError};
use crate::fetcher::retry::{Attempt, RetryPolicy, RetryReason};
use crate::notify::{Notification, Notifier};

/// Posts notifications to a Slack incoming webhook.
///
/// Timeouts and 5xx answers are retried with the fetcher's backoff policy.
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
    policy: RetryPolicy,
}

impl SlackNotifier {
    pub fn new(client: Client, webhook_url: impl Into<String>) -> Self {
        Self::with_policy(client, webhook_url, RetryPolicy::default())
    }

    pub fn with_policy(client: Client, webhook_url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
            policy,
        }
    }

    pub fn payload(notification: &Notification) -> serde_json::Value {
        let mut text = format!("*{}*\n{}", notification.title, notification.body);
        if let Some(url) = &notification.url {
            text.push_str(&format!("\n<{}>", url));
        }
        json!({ "text": text })
    }

    async fn attempt(&self, payload: &serde_json::Value) -> Result<Attempt<()>> {
        let response = match self.client.post(&self.webhook_url).json(payload).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Ok(Attempt::Retry {
                    reason: RetryReason::Timeout,
                    error: WatcherError::Http(e),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        if status.is_server_error() {
            return Ok(Attempt::Retry {
                reason: RetryReason::ServerError(status.as_u16()),
                error: WatcherError::Notification(format!("Slack webhook answered {}", status)),
            });
        }
        if !status.is_success() {
            return Err(WatcherError::Notification(format!(
                "Slack webhook rejected the message: {}",
                status
            )));
        }

        Ok(Attempt::Done(()))
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let payload = Self::payload(notification);
        self.policy.run(|| self.attempt(&payload)).await?;
        tracing::debug!("Sent Slack notification: {}", notification.title);
        Ok(())
    }
}
