// src/pipeline/crawl.rs

//! Crawl scheduling pipeline.
//!
//! Categories are launched in fixed-size batches with a quiescence pause
//! between launches. The pause does not wait for a batch to finish, so
//! instantaneous concurrency can exceed the batch width; every worker is
//! awaited before the run returns. One worker per category, each with its
//! own fetcher, so rotation state is never shared.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinError;

use crate::error::{AppError, Result};
use crate::models::{CategorySnapshot, Config};
use crate::services::{CatalogResolver, Fetcher};
use crate::storage::{CrawlStore, ProductSink};

/// Aggregated result of a crawl run.
#[derive(Debug, Default)]
pub struct CrawlSummary {
    pub categories: usize,
    pub completed: usize,
    pub blocked: usize,
    pub failed: usize,
    pub pages_crawled: usize,
    pub pages_skipped: usize,
    pub products: usize,
}

/// Launch `worker` for every item, `width` items per batch, pausing
/// between batch launches. Results come back in item order; a worker
/// panic surfaces as that item's `JoinError` without touching siblings.
pub(crate) async fn run_batches<T, F, Fut, R>(
    items: Vec<T>,
    width: usize,
    pause: Duration,
    worker: F,
) -> Vec<std::result::Result<R, JoinError>>
where
    T: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
    R: Send + 'static,
{
    let total_batches = items.len().div_ceil(width.max(1));
    let mut handles = Vec::with_capacity(items.len());

    let mut items = items.into_iter().peekable();
    let mut batch_no = 0;
    while items.peek().is_some() {
        batch_no += 1;
        let batch: Vec<T> = items.by_ref().take(width.max(1)).collect();
        log::info!(
            "Launching batch {}/{} ({} workers)",
            batch_no,
            total_batches,
            batch.len()
        );

        for item in batch {
            handles.push(tokio::spawn(worker(item)));
        }

        if items.peek().is_some() && !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }

    join_all(handles).await
}

/// Run a full crawl: load or discover the category tree, then fan the
/// categories out in batches.
pub async fn run_crawl(
    config: Arc<Config>,
    store: Arc<dyn CrawlStore>,
    sink: Arc<dyn ProductSink>,
    skip_discovery: bool,
) -> Result<CrawlSummary> {
    let categories = match store.load_categories().await? {
        Some(snapshot) if !snapshot.categories.is_empty() => {
            log::info!(
                "Loaded {} categories from snapshot ({})",
                snapshot.count,
                snapshot.saved_at
            );
            snapshot.categories
        }
        _ if skip_discovery => {
            return Err(AppError::config(
                "No category snapshot available; run without --skip-discovery first",
            ));
        }
        _ => {
            log::info!("Discovering categories...");
            let fetcher = Fetcher::new(Arc::clone(&config))?;
            let mut resolver = CatalogResolver::new(Arc::clone(&config), fetcher);
            let categories = resolver.resolve_categories().await?;

            store
                .save_categories(&CategorySnapshot::new(categories.clone()))
                .await?;
            log::info!("Discovered and checkpointed {} categories", categories.len());
            categories
        }
    };

    let names: Vec<String> = categories.iter().map(|c| c.name_path()).collect();
    let width = config.crawler.concurrency.max(1);
    let pause = Duration::from_secs(config.crawler.batch_pause_secs);

    let results = run_batches(categories, width, pause, |category| {
        let config = Arc::clone(&config);
        let store = Arc::clone(&store);
        let sink = Arc::clone(&sink);
        async move {
            let fetcher = Fetcher::new(Arc::clone(&config))?;
            let mut resolver = CatalogResolver::new(config, fetcher);
            resolver
                .crawl_category(&category, store.as_ref(), sink.as_ref())
                .await
        }
    })
    .await;

    let mut summary = CrawlSummary {
        categories: names.len(),
        ..CrawlSummary::default()
    };

    for (name, joined) in names.iter().zip(results) {
        match joined {
            Ok(Ok(outcome)) => {
                summary.completed += 1;
                summary.pages_crawled += outcome.pages_crawled;
                summary.pages_skipped += outcome.pages_skipped;
                summary.products += outcome.products;
            }
            Ok(Err(e)) if e.is_blocked() => {
                summary.blocked += 1;
                log::warn!("Category {} blocked: {}", name, e);
            }
            Ok(Err(e)) => {
                summary.failed += 1;
                log::error!("Category {} failed: {}", name, e);
            }
            Err(e) => {
                summary.failed += 1;
                log::error!("Category {} worker panicked: {}", name, e);
            }
        }
    }

    log::info!(
        "Crawl complete: {}/{} categories, {} pages crawled ({} skipped), {} products, {} blocked, {} failed",
        summary.completed,
        summary.categories,
        summary.pages_crawled,
        summary.pages_skipped,
        summary.products,
        summary.blocked,
        summary.failed
    );

    Ok(summary)
}
