// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Backend endpoint paths and query parameters
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// CSS selectors for the catalog pages
    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.base_url.trim().is_empty() {
            return Err(AppError::validation("crawler.base_url is empty"));
        }
        url::Url::parse(&self.crawler.base_url)?;
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.requests_to_delay == 0 {
            return Err(AppError::validation(
                "crawler.requests_to_delay must be > 0",
            ));
        }
        if self.crawler.delay_min_secs > self.crawler.delay_max_secs {
            return Err(AppError::validation(
                "crawler.delay_min_secs must not exceed crawler.delay_max_secs",
            ));
        }
        if self.crawler.max_attempts == 0 {
            return Err(AppError::validation("crawler.max_attempts must be > 0"));
        }
        if self.crawler.concurrency == 0 {
            return Err(AppError::validation("crawler.concurrency must be > 0"));
        }
        if self.endpoints.page_param.trim().is_empty() {
            return Err(AppError::validation("endpoints.page_param is empty"));
        }
        Ok(())
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Base URL of the target site
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Proxy endpoints, tried in order; empty means direct connection
    #[serde(default)]
    pub proxies: Vec<String>,

    /// Every Nth request triggers the politeness delay
    #[serde(default = "defaults::requests_to_delay")]
    pub requests_to_delay: u64,

    /// Lower bound of the randomized politeness delay, seconds
    #[serde(default = "defaults::delay_min")]
    pub delay_min_secs: u64,

    /// Upper bound of the randomized politeness delay, seconds
    #[serde(default = "defaults::delay_max")]
    pub delay_max_secs: u64,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Hard retry ceiling per fetch before giving up as blocked
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Identity-rotation budget per fetch for anti-bot challenge pages
    #[serde(default = "defaults::max_softblock_retries")]
    pub max_softblock_retries: u32,

    /// Marker substring identifying the anti-bot challenge page
    #[serde(default = "defaults::block_marker")]
    pub block_marker: String,

    /// Number of categories crawled concurrently per batch
    #[serde(default = "defaults::concurrency")]
    pub concurrency: usize,

    /// Quiescence pause between category batches, seconds
    #[serde(default = "defaults::batch_pause")]
    pub batch_pause_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            proxies: Vec::new(),
            requests_to_delay: defaults::requests_to_delay(),
            delay_min_secs: defaults::delay_min(),
            delay_max_secs: defaults::delay_max(),
            timeout_secs: defaults::timeout(),
            max_attempts: defaults::max_attempts(),
            max_softblock_retries: defaults::max_softblock_retries(),
            block_marker: defaults::block_marker(),
            concurrency: defaults::concurrency(),
            batch_pause_secs: defaults::batch_pause(),
        }
    }
}

/// Backend endpoint paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Path of the catalog root page
    #[serde(default = "defaults::catalog_path")]
    pub catalog_path: String,

    /// Query parameter carrying the listing page number
    #[serde(default = "defaults::page_param")]
    pub page_param: String,

    /// Product detail endpoint, `{id}` is replaced with the product id
    #[serde(default = "defaults::product_details")]
    pub product_details: String,

    /// Offer detail endpoint, `{id}` is replaced with the offer id
    #[serde(default = "defaults::offer_details")]
    pub offer_details: String,
}

impl EndpointConfig {
    /// Endpoint path for one product's details.
    pub fn product_details_path(&self, id: &str) -> String {
        self.product_details.replace("{id}", id)
    }

    /// Endpoint path for one offer's details.
    pub fn offer_details_path(&self, id: &str) -> String {
        self.offer_details.replace("{id}", id)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            catalog_path: defaults::catalog_path(),
            page_param: defaults::page_param(),
            product_details: defaults::product_details(),
            offer_details: defaults::offer_details(),
        }
    }
}

/// CSS selectors for the catalog pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Top-level section block on the catalog root
    #[serde(default = "defaults::section")]
    pub section: String,

    /// Section name element within a section block
    #[serde(default = "defaults::section_name")]
    pub section_name: String,

    /// Section link element within a section block
    #[serde(default = "defaults::section_link")]
    pub section_link: String,

    /// Nested subsection block within a section block
    #[serde(default = "defaults::subsection")]
    pub subsection: String,

    /// Product card element on a listing page
    #[serde(default = "defaults::product_card")]
    pub product_card: String,

    /// Attribute of the product card carrying the product id
    #[serde(default = "defaults::product_id_attr")]
    pub product_id_attr: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            section: defaults::section(),
            section_name: defaults::section_name(),
            section_link: defaults::section_link(),
            subsection: defaults::subsection(),
            product_card: defaults::product_card(),
            product_id_attr: defaults::product_id_attr(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn base_url() -> String {
        "https://www.bethowen.ru".into()
    }
    pub fn requests_to_delay() -> u64 {
        50
    }
    pub fn delay_min() -> u64 {
        30
    }
    pub fn delay_max() -> u64 {
        60
    }
    pub fn timeout() -> u64 {
        10
    }
    pub fn max_attempts() -> u32 {
        10
    }
    pub fn max_softblock_retries() -> u32 {
        20
    }
    pub fn block_marker() -> String {
        "IWAF".into()
    }
    pub fn concurrency() -> usize {
        4
    }
    pub fn batch_pause() -> u64 {
        100
    }

    // Endpoint defaults
    pub fn catalog_path() -> String {
        "catalogue".into()
    }
    pub fn page_param() -> String {
        "PAGEN_1".into()
    }
    pub fn product_details() -> String {
        "api/local/v1/catalog/products/{id}/details".into()
    }
    pub fn offer_details() -> String {
        "api/local/v1/catalog/offers/{id}/details".into()
    }

    // Selector defaults
    pub fn section() -> String {
        ".section_info".into()
    }
    pub fn section_name() -> String {
        ".name".into()
    }
    pub fn section_link() -> String {
        "a".into()
    }
    pub fn subsection() -> String {
        ".sect".into()
    }
    pub fn product_card() -> String {
        ".bth-card-element".into()
    }
    pub fn product_id_attr() -> String {
        "data-product-id".into()
    }
}
