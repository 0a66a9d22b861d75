pub mod log;
pub mod slack;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app::Result;

pub use log::LogNotifier;
pub use slack::SlackNotifier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}
