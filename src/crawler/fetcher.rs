//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - A randomized politeness delay before every network request
//! - A small LRU cache of page bodies; cache hits skip the delay
//! - Retry logic for transient failures
//! - Error classification (a 404 is its own signal, it ends pagination)

use crate::config::{CrawlerConfig, UserAgentConfig};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Errors from fetching a page or image
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Page not found: {url}")]
    NotFound { url: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} failed: {source}")]
    Http {
        url: String,
        source: reqwest::Error,
    },
}

/// Source of page bodies for the crawl engine
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches a page as text; `FetchError::NotFound` on HTTP 404
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;

    /// Fetches raw bytes (image payloads) with the same failure signals
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Randomized wait before each uncached request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolitenessDelay {
    min: Duration,
    max: Duration,
}

impl PolitenessDelay {
    /// A delay drawn uniformly from `min..=max`; a `max` below `min` is raised to `min`
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(fastrand::u64(min..=max))
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout, the only timeout a crawl has
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Page bodies kept by a fetcher unless configured otherwise
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Recently fetched page bodies, least recently used evicted first
#[derive(Debug)]
struct PageCache {
    capacity: usize,
    pages: HashMap<String, String>,
    recency: VecDeque<String>,
}

impl PageCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pages: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    fn get(&mut self, url: &str) -> Option<String> {
        let body = self.pages.get(url)?.clone();
        self.touch(url);
        Some(body)
    }

    fn insert(&mut self, url: &str, body: String) {
        if self.capacity == 0 {
            return;
        }
        if self.pages.insert(url.to_string(), body).is_some() {
            self.touch(url);
            return;
        }

        self.recency.push_back(url.to_string());
        while self.pages.len() > self.capacity {
            match self.recency.pop_front() {
                Some(oldest) => {
                    self.pages.remove(&oldest);
                }
                None => break,
            }
        }
    }

    fn touch(&mut self, url: &str) {
        if let Some(position) = self.recency.iter().position(|cached| cached == url) {
            if let Some(entry) = self.recency.remove(position) {
                self.recency.push_back(entry);
            }
        }
    }

    fn len(&self) -> usize {
        self.pages.len()
    }

    fn bytes(&self) -> usize {
        self.pages.values().map(String::len).sum()
    }
}

/// `PageFetcher` over reqwest with delay, cache and retries
///
/// One fetcher serves one site crawl; requests through it are sequential.
/// Only text pages are cached, and at most `cache capacity` of them; image
/// payloads always go to the network.
pub struct HttpFetcher {
    client: Client,
    delay: PolitenessDelay,
    max_retries: u32,
    retry_backoff: Duration,
    cache: Mutex<PageCache>,
}

impl HttpFetcher {
    /// Creates a fetcher from the crawler and user agent configuration
    pub fn new(crawler: &CrawlerConfig, user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, Duration::from_secs(crawler.timeout_secs))?;
        let delay = PolitenessDelay::new(
            Duration::from_millis(crawler.min_delay_ms),
            Duration::from_millis(crawler.max_delay_ms),
        );
        Ok(Self::with_client(client, delay, crawler.max_retries))
    }

    pub fn with_client(client: Client, delay: PolitenessDelay, max_retries: u32) -> Self {
        Self {
            client,
            delay,
            max_retries,
            retry_backoff: Duration::from_secs(1),
            cache: Mutex::new(PageCache::new(DEFAULT_CACHE_CAPACITY)),
        }
    }

    /// Maximum number of page bodies kept; zero disables the cache
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = Mutex::new(PageCache::new(capacity));
        self
    }

    /// Base wait between retries; attempt `n` waits `n` times this long
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Number of distinct URLs held in the cache
    pub fn cached_urls(&self) -> usize {
        self.cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Total size of the cached page bodies
    pub fn cached_bytes(&self) -> usize {
        self.cache.lock().map(|cache| cache.bytes()).unwrap_or(0)
    }

    fn cached(&self, url: &str) -> Option<String> {
        self.cache.lock().ok()?.get(url)
    }

    fn remember(&self, url: &str, body: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(url, body.to_string());
        }
    }

    /// Fetches a URL with politeness delay and retry logic
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 404 | Immediate → NotFound |
    /// | HTTP 429, 5xx | Retry up to `max_retries` times |
    /// | Timeout, connect error | Retry up to `max_retries` times |
    /// | Other HTTP status | Immediate → Status |
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let pause = self.delay.sample();
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }

        let mut attempt = 0;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.max_retries && is_transient(&e) => {
                    attempt += 1;
                    tracing::warn!(
                        "Retrying {} ({}/{}) after: {}",
                        url,
                        attempt,
                        self.max_retries,
                        e
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                url: url.to_string(),
            });
        }

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        Ok(body.to_vec())
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        if let Some(body) = self.cached(url) {
            tracing::debug!("Cache hit for {}", url);
            return Ok(body);
        }

        let body = String::from_utf8_lossy(&self.fetch(url).await?).into_owned();
        self.remember(url, &body);
        Ok(body)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetch(url).await
    }
}

fn is_transient(error: &FetchError) -> bool {
    match error {
        FetchError::NotFound { .. } => false,
        FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        FetchError::Http { source, .. } => source.is_timeout() || source.is_connect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn test_fetcher(max_retries: u32) -> HttpFetcher {
        let client = build_http_client(&create_test_config(), Duration::from_secs(5)).unwrap();
        HttpFetcher::with_client(client, PolitenessDelay::none(), max_retries)
            .with_retry_backoff(Duration::ZERO)
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&create_test_config(), Duration::from_secs(30)).is_ok());
    }

    #[test]
    fn test_delay_sampling_stays_in_bounds() {
        let delay = PolitenessDelay::new(Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..100 {
            let sample = delay.sample();
            assert!(sample >= Duration::from_millis(10));
            assert!(sample <= Duration::from_millis(20));
        }

        let inverted = PolitenessDelay::new(Duration::from_millis(50), Duration::from_millis(5));
        assert_eq!(inverted.sample(), Duration::from_millis(50));
        assert_eq!(PolitenessDelay::none().sample(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_fetch_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recipes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(0);
        let body = fetcher
            .fetch_text(&format!("{}/recipes", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(3);
        let result = fetcher.fetch_text(&format!("{}/page/9", server.uri())).await;
        assert!(matches!(result, Err(FetchError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_cached_page_is_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/recipes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>list</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(0);
        let url = format!("{}/recipes", server.uri());
        assert_eq!(fetcher.fetch_text(&url).await.unwrap(), "<html>list</html>");
        assert_eq!(fetcher.fetch_text(&url).await.unwrap(), "<html>list</html>");
        assert_eq!(fetcher.cached_urls(), 1);
    }

    #[tokio::test]
    async fn test_images_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(0);
        let url = format!("{}/img.jpg", server.uri());
        assert_eq!(fetcher.fetch_bytes(&url).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(fetcher.fetch_bytes(&url).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(fetcher.cached_urls(), 0);
    }

    #[tokio::test]
    async fn test_cache_is_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(100_000)))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(0).with_cache_capacity(8);
        for i in 0..200 {
            fetcher
                .fetch_text(&format!("{}/page-{}", server.uri(), i))
                .await
                .unwrap();
        }

        assert_eq!(fetcher.cached_urls(), 8);
        assert_eq!(fetcher.cached_bytes(), 800_000);
    }

    #[test]
    fn test_page_cache_evicts_least_recently_used() {
        let mut cache = PageCache::new(2);
        cache.insert("a", "A".to_string());
        cache.insert("b", "B".to_string());
        assert_eq!(cache.get("a").as_deref(), Some("A"));

        cache.insert("c", "C".to_string());
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").as_deref(), Some("A"));
        assert_eq!(cache.get("c").as_deref(), Some("C"));

        let mut disabled = PageCache::new(0);
        disabled.insert("a", "A".to_string());
        assert_eq!(disabled.len(), 0);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let fetcher = test_fetcher(2);
        let body = fetcher.fetch_text(&format!("{}/flaky", server.uri())).await.unwrap();
        assert_eq!(body, "recovered");
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(2);
        let result = fetcher.fetch_text(&format!("{}/down", server.uri())).await;
        assert!(matches!(
            result,
            Err(FetchError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = test_fetcher(5);
        let result = fetcher.fetch_text(&format!("{}/private", server.uri())).await;
        assert!(matches!(
            result,
            Err(FetchError::Status { status: 403, .. })
        ));
    }
}
