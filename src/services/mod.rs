// src/services/mod.rs

//! Service layer for the crawler application.
//!
//! This module contains the business logic for:
//! - Resilient HTTP fetching (`Fetcher`)
//! - Page extraction (`extract`)
//! - Category/page/product resolution (`CatalogResolver`)

pub mod catalog;
pub mod extract;
pub mod fetch;

pub use catalog::{CatalogResolver, CategoryOutcome, PageCursor};
pub use fetch::{Fetch, Fetcher};
