pub mod http_fetcher;
pub mod retry;

use async_trait::async_trait;

use crate::app::Result;

pub use http_fetcher::HttpFetcher;
pub use retry::RetryPolicy;

/// Outcome of one conditional GET.
///
/// `content` is `None` exactly when the server answered 304 Not Modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub status_code: u16,
    pub content: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub is_modified: bool,
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Body of a 2xx response; error pages and 304s yield `None`.
    pub fn success_content(&self) -> Option<&str> {
        if self.is_success() {
            self.content.as_deref()
        } else {
            None
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FetchResult>;
}
