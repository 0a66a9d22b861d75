use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, RETRY_AFTER};
use reqwest::{Client, StatusCode};

use crate::app::{Result, WatcherError};
use crate::fetcher::retry::{Attempt, RetryPolicy, RetryReason};
use crate::fetcher::{FetchResult, Fetcher};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self::with_client(build_client(DEFAULT_TIMEOUT)?, RetryPolicy::default()))
    }

    pub fn with_client(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    async fn attempt(&self, url: &str, headers: &HeaderMap) -> Result<Attempt<FetchResult>> {
        let response = match self.client.get(url).headers(headers.clone()).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(timeout(e)),
            Err(e) => return Err(e.into()),
        };

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = header_string(response.headers(), RETRY_AFTER);
            return Ok(Attempt::Retry {
                reason: RetryReason::TooManyRequests { retry_after },
                error: status_error(url, status),
            });
        }

        if status.is_server_error() {
            return Ok(Attempt::Retry {
                reason: RetryReason::ServerError(status.as_u16()),
                error: status_error(url, status),
            });
        }

        let etag = header_string(response.headers(), ETAG);
        let last_modified = header_string(response.headers(), LAST_MODIFIED);

        if status == StatusCode::NOT_MODIFIED {
            tracing::debug!("{} not modified", url);
            return Ok(Attempt::Done(FetchResult {
                status_code: status.as_u16(),
                content: None,
                etag,
                last_modified,
                is_modified: false,
            }));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Ok(timeout(e)),
            Err(e) => return Err(e.into()),
        };

        Ok(Attempt::Done(FetchResult {
            status_code: status.as_u16(),
            content: Some(body),
            etag,
            last_modified,
            is_modified: true,
        }))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FetchResult> {
        let mut headers = HeaderMap::new();

        if let Some(etag) = etag {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert(IF_NONE_MATCH, value);
            }
        }

        if let Some(last_modified) = last_modified {
            if let Ok(value) = HeaderValue::from_str(last_modified) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        self.policy.run(|| self.attempt(url, &headers)).await
    }
}

pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .user_agent(concat!("blogwatch/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn timeout(err: reqwest::Error) -> Attempt<FetchResult> {
    Attempt::Retry {
        reason: RetryReason::Timeout,
        error: WatcherError::Http(err),
    }
}

fn status_error(url: &str, status: StatusCode) -> WatcherError {
    WatcherError::HttpStatus {
        url: url.to_string(),
        status: status.as_u16(),
    }
}
