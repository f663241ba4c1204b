// src/pipeline/clean.rs

//! Run-reset pipeline.

use crate::error::Result;
use crate::storage::{JsonlSink, LocalStore};

/// Clear the dedup ledger, the category snapshot, and the product output.
///
/// The next run starts from scratch: full re-discovery, every page
/// fetched again.
pub async fn run_clean(store: &LocalStore, sink: &JsonlSink) -> Result<()> {
    store.clear().await?;
    sink.clear().await?;
    log::info!("Cleared ledger, category snapshot, and product output");
    Ok(())
}
