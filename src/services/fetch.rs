// src/services/fetch.rs

//! Resilient single-request fetcher.
//!
//! Wraps `reqwest` with the anti-blocking measures the target site requires:
//! per-request identity rotation, proxy fallback, soft-block detection, and
//! a politeness throttle. Classifies every outcome into success, a local
//! retry, `NotFound` (pagination exhausted), or `Blocked` (no further
//! progress possible with the current resources).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::{Rng, thread_rng};
use reqwest::{Client, Method, StatusCode, header};

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::utils::http::{create_client, random_identity};
use crate::utils::join_endpoint;

/// A single-request fetch operation.
///
/// The catalog resolver is generic over this trait so tests can script
/// responses without a network.
#[async_trait]
pub trait Fetch: Send {
    /// Fetch `endpoint` relative to the configured base URL and return the
    /// raw response body.
    async fn fetch(
        &mut self,
        method: Method,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<String>;

    /// Fetch and deserialize a JSON body.
    async fn fetch_json(
        &mut self,
        method: Method,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<serde_json::Value> {
        let body = self.fetch(method, endpoint, query).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Outcome of a single request attempt, before retry policy is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Usable response body
    Success,
    /// HTTP 404, the designed pagination-exhausted signal
    NotFound,
    /// Anti-bot challenge page, retry with a fresh identity
    SoftBlocked,
    /// Anything else, counts against the hard retry ceiling
    Failed,
}

/// Classify a response. The 404 check precedes the marker check so a
/// missing page is never mistaken for a challenge.
fn classify(status: StatusCode, body: &str, marker: &str) -> Attempt {
    if status == StatusCode::NOT_FOUND {
        return Attempt::NotFound;
    }
    if !marker.is_empty() && body.contains(marker) {
        return Attempt::SoftBlocked;
    }
    if !status.is_success() {
        return Attempt::Failed;
    }
    Attempt::Success
}

/// HTTP fetcher with per-instance rotation state.
///
/// Each category worker owns its own `Fetcher`; the request counter and
/// proxy cursor are never shared between instances.
pub struct Fetcher {
    config: Arc<Config>,
    client: Client,
    request_count: u64,
    proxy_cursor: usize,
}

impl Fetcher {
    /// Create a fetcher connected directly or through the first configured
    /// proxy.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let client = create_client(
            &config.crawler,
            config.crawler.proxies.first().map(String::as_str),
        )?;
        Ok(Self {
            config,
            client,
            request_count: 0,
            proxy_cursor: 0,
        })
    }

    /// Advance the proxy cursor and rebuild the client for the new proxy.
    ///
    /// The cursor never wraps: once the list is exhausted the fetcher is
    /// blocked for the rest of its lifetime.
    fn advance_proxy(&mut self) -> Result<()> {
        self.proxy_cursor += 1;
        match self.config.crawler.proxies.get(self.proxy_cursor) {
            Some(endpoint) => {
                log::info!("Transport failure, switching proxy to {}", endpoint);
                self.client = create_client(&self.config.crawler, Some(endpoint))
                    .map_err(|e| AppError::blocked(format!("proxy client build failed: {e}")))?;
                Ok(())
            }
            None => Err(AppError::blocked("proxy list exhausted")),
        }
    }

    /// Sleep the randomized politeness delay on every Nth request.
    async fn throttle(&mut self) {
        self.request_count += 1;
        let crawler = &self.config.crawler;
        if self.request_count % crawler.requests_to_delay == 0 {
            let secs = thread_rng().gen_range(crawler.delay_min_secs..=crawler.delay_max_secs);
            log::info!("Waiting {} seconds, for avoiding blocking", secs);
            tokio::time::sleep(Duration::from_secs(secs)).await;
        }
    }
}

#[async_trait]
impl Fetch for Fetcher {
    async fn fetch(
        &mut self,
        method: Method,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<String> {
        self.throttle().await;

        let crawler = &self.config.crawler;
        let url = join_endpoint(&crawler.base_url, endpoint);

        let mut failures: u32 = 0;
        let mut soft_blocks: u32 = 0;

        loop {
            let request = self
                .client
                .request(method.clone(), &url)
                .header(header::USER_AGENT, random_identity())
                .query(query);

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() || e.is_connect() => {
                    self.advance_proxy()?;
                    continue;
                }
                Err(e) => {
                    failures += 1;
                    if failures >= self.config.crawler.max_attempts {
                        return Err(AppError::blocked(format!(
                            "retry ceiling reached for {url}: {e}"
                        )));
                    }
                    log::warn!("Request to {} failed: {}", url, e);
                    continue;
                }
            };

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(AppError::not_found(url));
            }

            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    failures += 1;
                    if failures >= self.config.crawler.max_attempts {
                        return Err(AppError::blocked(format!(
                            "retry ceiling reached for {url}: {e}"
                        )));
                    }
                    log::warn!("Reading body from {} failed: {}", url, e);
                    continue;
                }
            };

            match classify(status, &body, &self.config.crawler.block_marker) {
                Attempt::Success => return Ok(body),
                Attempt::NotFound => return Err(AppError::not_found(url)),
                Attempt::SoftBlocked => {
                    soft_blocks += 1;
                    if soft_blocks > self.config.crawler.max_softblock_retries {
                        return Err(AppError::blocked(format!(
                            "soft-block budget exhausted for {url}"
                        )));
                    }
                    log::debug!("Challenge page from {}, rotating identity", url);
                    continue;
                }
                Attempt::Failed => {
                    failures += 1;
                    if failures >= self.config.crawler.max_attempts {
                        return Err(AppError::blocked(format!(
                            "retry ceiling reached for {url}: HTTP {status}"
                        )));
                    }
                    log::warn!("Request to {} returned HTTP {}", url, status);
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;

    fn config_with_proxies(proxies: &[&str]) -> Arc<Config> {
        let mut config = Config::default();
        config.crawler.proxies = proxies.iter().map(|s| s.to_string()).collect();
        Arc::new(config)
    }

    #[test]
    fn test_cursor_exhausts_without_wrapping() {
        let config = config_with_proxies(&["http://127.0.0.1:3128", "http://127.0.0.1:3129"]);
        let mut fetcher = Fetcher::new(config).unwrap();

        // Two proxies: one switch succeeds, the next raises Blocked.
        assert!(fetcher.advance_proxy().is_ok());
        assert!(fetcher.advance_proxy().unwrap_err().is_blocked());
        // Still blocked afterwards, the cursor does not wrap.
        assert!(fetcher.advance_proxy().unwrap_err().is_blocked());
    }

    #[test]
    fn test_empty_proxy_list_blocks_on_first_rotation() {
        let mut fetcher = Fetcher::new(config_with_proxies(&[])).unwrap();
        assert!(fetcher.advance_proxy().unwrap_err().is_blocked());
    }

    #[test]
    fn test_classify_marker_is_never_success() {
        let body = "<html>IWAF challenge</html>";
        assert_eq!(
            classify(StatusCode::OK, body, "IWAF"),
            Attempt::SoftBlocked
        );
        assert_eq!(
            classify(StatusCode::FORBIDDEN, body, "IWAF"),
            Attempt::SoftBlocked
        );
    }

    #[test]
    fn test_classify_not_found_wins_over_marker() {
        assert_eq!(
            classify(StatusCode::NOT_FOUND, "IWAF", "IWAF"),
            Attempt::NotFound
        );
    }

    #[test]
    fn test_classify_plain_outcomes() {
        assert_eq!(classify(StatusCode::OK, "<html/>", "IWAF"), Attempt::Success);
        assert_eq!(
            classify(StatusCode::INTERNAL_SERVER_ERROR, "oops", "IWAF"),
            Attempt::Failed
        );
    }
}
