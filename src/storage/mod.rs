// src/storage/mod.rs

//! Storage abstractions for crawl bookkeeping and extracted records.
//!
//! Two concerns share one local backend:
//!
//! - the **dedup ledger**: a durable set of already-processed
//!   `(category-url, page)` keys, so reruns skip completed pages;
//! - the **category snapshot**: a versioned checkpoint of the discovered
//!   category tree, so reruns skip re-discovery.
//!
//! Extracted products go to a [`ProductSink`], invoked once per resolved
//! page.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml         # Crawler configuration
//! ├── ledger.json         # Dedup ledger (page completion keys)
//! ├── categories.json     # Versioned category snapshot
//! └── products.jsonl      # Extracted products, one JSON object per line
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Category, CategorySnapshot, PageKey, Product};

// Re-export for convenience
pub use local::{JsonlSink, LocalStore};

/// Durable crawl bookkeeping: dedup ledger plus category checkpoint.
#[async_trait]
pub trait CrawlStore: Send + Sync {
    /// True when the page behind `key` has already been processed.
    async fn is_done(&self, key: &PageKey) -> Result<bool>;

    /// Mark the page behind `key` as processed. Durable before return;
    /// concurrent callers never observe a partially marked key.
    async fn mark_done(&self, key: &PageKey) -> Result<()>;

    /// Load the category checkpoint, None when absent or from an older
    /// checkpoint format.
    async fn load_categories(&self) -> Result<Option<CategorySnapshot>>;

    /// Persist the category checkpoint.
    async fn save_categories(&self, snapshot: &CategorySnapshot) -> Result<()>;
}

/// Destination for extracted product records.
#[async_trait]
pub trait ProductSink: Send + Sync {
    /// Emit one resolved page's products. Called once per page, not per
    /// item; an empty page is not emitted by the resolver.
    async fn write_page(&self, category: &Category, page: u32, products: &[Product])
    -> Result<()>;
}
