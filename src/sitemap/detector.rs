use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::config::DetectorConfig;
use crate::domain::BlogState;
use crate::fetcher::Fetcher;
use crate::normalizer::{fingerprint, normalize_urls};
use crate::sitemap::discovery::robots_url;
use crate::sitemap::{detect_sitemap_urls, parse_sitemap, ParsedSitemap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapDetectionResult {
    pub sitemap_url: Option<String>,
    pub fingerprint: Option<String>,
    pub changed: bool,
    pub ok: bool,
}

impl SitemapDetectionResult {
    fn unavailable() -> Self {
        Self {
            sitemap_url: None,
            fingerprint: None,
            changed: false,
            ok: false,
        }
    }
}

pub struct SitemapChangeDetector {
    fetcher: Arc<dyn Fetcher>,
    config: DetectorConfig,
}

impl SitemapChangeDetector {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: DetectorConfig) -> Self {
        Self { fetcher, config }
    }

    /// Fingerprint the site's page URLs and compare with `previous`.
    ///
    /// Never fails: network and parse problems come back as `ok = false`.
    pub async fn detect(
        &self,
        base_url: &str,
        previous: Option<&BlogState>,
        now: DateTime<Utc>,
    ) -> SitemapDetectionResult {
        let cached_url = previous
            .filter(|state| state.is_cache_fresh(self.config.cache_ttl_days, now))
            .and_then(|state| state.sitemap_url.as_deref());

        if let Some(sitemap_url) = cached_url {
            if let Some(result) = self.try_cached(sitemap_url, previous).await {
                tracing::debug!("Using cached sitemap {} for {}", sitemap_url, base_url);
                return result;
            }
            tracing::debug!("Cached sitemap {} unusable, rediscovering", sitemap_url);
        }

        let (sitemap_url, page_urls) = match self.probe(base_url).await {
            Some(found) => found,
            None => {
                tracing::debug!("No usable sitemap for {}", base_url);
                return SitemapDetectionResult::unavailable();
            }
        };

        self.summarize(&sitemap_url, &page_urls, previous)
            .unwrap_or_else(SitemapDetectionResult::unavailable)
    }

    async fn try_cached(
        &self,
        sitemap_url: &str,
        previous: Option<&BlogState>,
    ) -> Option<SitemapDetectionResult> {
        let sitemap = self.fetch_and_parse(sitemap_url).await?;
        let page_urls = self.page_urls(sitemap).await;
        self.summarize(sitemap_url, &page_urls, previous)
    }

    /// First candidate that fetches and parses, with its page URLs resolved.
    async fn probe(&self, base_url: &str) -> Option<(String, Vec<String>)> {
        let robots = self.fetch_robots(base_url).await;

        for candidate in detect_sitemap_urls(robots.as_deref(), base_url) {
            if let Some(sitemap) = self.fetch_and_parse(&candidate).await {
                let page_urls = self.page_urls(sitemap).await;
                return Some((candidate, page_urls));
            }
        }
        None
    }

    async fn fetch_robots(&self, base_url: &str) -> Option<String> {
        let url = robots_url(base_url)?;
        match self.fetcher.fetch(&url, None, None).await {
            Ok(result) => result.success_content().map(String::from),
            Err(e) => {
                tracing::debug!("robots.txt fetch failed for {}: {}", url, e);
                None
            }
        }
    }

    async fn fetch_and_parse(&self, url: &str) -> Option<ParsedSitemap> {
        match self.fetcher.fetch(url, None, None).await {
            Ok(result) => result
                .success_content()
                .and_then(|content| parse_sitemap(content, url)),
            Err(e) => {
                tracing::debug!("Sitemap fetch failed for {}: {}", url, e);
                None
            }
        }
    }

    /// Page URLs of a urlset, or the union over an index's children.
    /// Failing children and nested indices are skipped.
    async fn page_urls(&self, sitemap: ParsedSitemap) -> Vec<String> {
        if !sitemap.is_index {
            return sitemap.page_urls;
        }

        let mut page_urls = Vec::new();
        for child_url in &sitemap.page_urls {
            match self.fetch_and_parse(child_url).await {
                Some(child) if !child.is_index => page_urls.extend(child.page_urls),
                Some(_) => tracing::debug!("Skipping nested sitemap index {}", child_url),
                None => {}
            }
        }
        page_urls
    }

    fn summarize(
        &self,
        sitemap_url: &str,
        page_urls: &[String],
        previous: Option<&BlogState>,
    ) -> Option<SitemapDetectionResult> {
        if page_urls.is_empty() {
            return None;
        }

        let normalized = match self.normalize(page_urls) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracing::debug!("Could not normalize URLs from {}: {}", sitemap_url, e);
                return None;
            }
        };
        let fingerprint = fingerprint(&normalized);

        let changed = previous
            .and_then(|state| state.url_fingerprint.as_deref())
            .filter(|old| !old.is_empty())
            .map_or(false, |old| old != fingerprint);

        Some(SitemapDetectionResult {
            sitemap_url: Some(sitemap_url.to_string()),
            fingerprint: Some(fingerprint),
            changed,
            ok: true,
        })
    }

    fn normalize(&self, page_urls: &[String]) -> Result<Vec<String>> {
        normalize_urls(page_urls, None, &self.config.normalization())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::normalizer::NormalizationConfig;
    use crate::test_support::{fast_fetcher, sitemap_index_xml, sitemap_xml};

    fn detector() -> SitemapChangeDetector {
        SitemapChangeDetector::new(Arc::new(fast_fetcher()), DetectorConfig::default())
    }

    fn pages(server: &MockServer, names: &[&str]) -> Vec<String> {
        names.iter().map(|n| format!("{}/{}", server.uri(), n)).collect()
    }

    fn expected_fingerprint(urls: &[String]) -> String {
        let config = DetectorConfig::default().normalization();
        fingerprint(&normalize_urls(urls, None, &config).unwrap())
    }

    async fn mount(server: &MockServer, route: &str, status: u16, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    fn state(fingerprint: Option<String>, sitemap_url: Option<String>, checked: DateTime<Utc>) -> BlogState {
        let mut state = BlogState::new("blog-1", checked).unwrap();
        state.url_fingerprint = fingerprint;
        state.sitemap_url = sitemap_url;
        state
    }

    #[tokio::test]
    async fn test_uses_robots_directive() {
        let server = MockServer::start().await;
        let urls = pages(&server, &["a", "b"]);
        mount(&server, "/robots.txt", 200, format!("Sitemap: {}/posts.xml\n", server.uri())).await;
        mount(&server, "/posts.xml", 200, sitemap_xml(&urls)).await;

        let result = detector().detect(&server.uri(), None, Utc::now()).await;

        assert!(result.ok);
        assert!(!result.changed);
        assert_eq!(result.sitemap_url, Some(format!("{}/posts.xml", server.uri())));
        assert_eq!(result.fingerprint, Some(expected_fingerprint(&urls)));
    }

    #[tokio::test]
    async fn test_falls_back_to_sitemap_xml_without_robots() {
        let server = MockServer::start().await;
        let urls = pages(&server, &["a"]);
        mount(&server, "/sitemap.xml", 200, sitemap_xml(&urls)).await;

        let result = detector().detect(&server.uri(), None, Utc::now()).await;

        assert!(result.ok);
        assert_eq!(result.sitemap_url, Some(format!("{}/sitemap.xml", server.uri())));
    }

    #[tokio::test]
    async fn test_changed_against_previous_fingerprint() {
        let server = MockServer::start().await;
        let urls = pages(&server, &["a", "b", "c"]);
        mount(&server, "/sitemap.xml", 200, sitemap_xml(&urls)).await;
        let previous = state(
            Some(expected_fingerprint(&pages(&server, &["a", "b"]))),
            None,
            Utc::now(),
        );

        let result = detector().detect(&server.uri(), Some(&previous), Utc::now()).await;

        assert!(result.ok);
        assert!(result.changed);
    }

    #[tokio::test]
    async fn test_unchanged_against_same_fingerprint() {
        let server = MockServer::start().await;
        let urls = pages(&server, &["a", "b"]);
        mount(&server, "/sitemap.xml", 200, sitemap_xml(&urls)).await;
        let previous = state(Some(expected_fingerprint(&urls)), None, Utc::now());

        let result = detector().detect(&server.uri(), Some(&previous), Utc::now()).await;

        assert!(!result.changed);
    }

    #[tokio::test]
    async fn test_resolves_sitemap_index_children() {
        let server = MockServer::start().await;
        let children = pages(&server, &["posts.xml", "broken.xml", "nested.xml"]);
        mount(&server, "/sitemap.xml", 200, sitemap_index_xml(&children)).await;
        mount(&server, "/posts.xml", 200, sitemap_xml(&pages(&server, &["p1", "p2"]))).await;
        mount(&server, "/broken.xml", 200, "<urlset><url>".to_string()).await;
        mount(&server, "/nested.xml", 200, sitemap_index_xml(&pages(&server, &["deeper.xml"]))).await;

        let result = detector().detect(&server.uri(), None, Utc::now()).await;

        assert!(result.ok);
        assert_eq!(result.fingerprint, Some(expected_fingerprint(&pages(&server, &["p1", "p2"]))));
        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| r.url.path() != "/deeper.xml"));
    }

    #[tokio::test]
    async fn test_index_without_pages_is_not_ok() {
        let server = MockServer::start().await;
        mount(&server, "/sitemap.xml", 200, sitemap_index_xml(&pages(&server, &["gone.xml"]))).await;
        mount(&server, "/sitemap_index.xml", 200, sitemap_xml(&pages(&server, &["a"]))).await;

        let result = detector().detect(&server.uri(), None, Utc::now()).await;

        // The first parseable candidate wins even when it yields nothing.
        assert_eq!(result, SitemapDetectionResult::unavailable());
    }

    #[tokio::test]
    async fn test_malformed_sitemap_is_not_ok() {
        let server = MockServer::start().await;
        mount(&server, "/sitemap.xml", 200, "<urlset><url><loc>oops</urlset>".to_string()).await;
        let previous = state(Some("old".into()), None, Utc::now());

        let result = detector().detect(&server.uri(), Some(&previous), Utc::now()).await;

        assert!(!result.ok);
        assert!(!result.changed);
    }

    #[tokio::test]
    async fn test_server_errors_are_absorbed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = detector().detect(&server.uri(), None, Utc::now()).await;

        assert_eq!(result, SitemapDetectionResult::unavailable());
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_discovery() {
        let server = MockServer::start().await;
        let urls = pages(&server, &["a"]);
        mount(&server, "/cached.xml", 200, sitemap_xml(&urls)).await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let cached = format!("{}/cached.xml", server.uri());
        let previous = state(
            Some(expected_fingerprint(&urls)),
            Some(cached.clone()),
            Utc::now() - Duration::days(2),
        );

        let result = detector().detect(&server.uri(), Some(&previous), Utc::now()).await;

        assert_eq!(result.sitemap_url, Some(cached));
        assert!(!result.changed);
    }

    #[tokio::test]
    async fn test_failed_cache_rediscovers() {
        let server = MockServer::start().await;
        let urls = pages(&server, &["a"]);
        mount(&server, "/cached.xml", 404, String::new()).await;
        mount(&server, "/sitemap.xml", 200, sitemap_xml(&urls)).await;
        let previous = state(None, Some(format!("{}/cached.xml", server.uri())), Utc::now());

        let result = detector().detect(&server.uri(), Some(&previous), Utc::now()).await;

        assert_eq!(result.sitemap_url, Some(format!("{}/sitemap.xml", server.uri())));
    }

    #[tokio::test]
    async fn test_normalization_applies_config() {
        let server = MockServer::start().await;
        let urls = vec![
            format!("{}/a/?utm_source=x", server.uri()),
            format!("{}/a", server.uri()),
        ];
        mount(&server, "/sitemap.xml", 200, sitemap_xml(&urls)).await;

        let result = detector().detect(&server.uri(), None, Utc::now()).await;

        let config = NormalizationConfig {
            strip_tracking_params: true,
            ..Default::default()
        };
        let only = normalize_urls([format!("{}/a", server.uri())], None, &config).unwrap();
        assert_eq!(result.fingerprint, Some(fingerprint(&only)));
    }
}
