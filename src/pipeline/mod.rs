// src/pipeline/mod.rs

//! Pipeline entry points for crawler operations.
//!
//! - `run_crawl`: category discovery (or checkpoint load) followed by the
//!   batched category fan-out
//! - `run_clean`: reset ledger, snapshot and output

pub mod clean;
pub mod crawl;

pub use clean::run_clean;
pub use crawl::{CrawlSummary, run_crawl};
