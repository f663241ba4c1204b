// src/models/category.rs

//! Category tree, dedup key, and category checkpoint structures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current checkpoint format version. Snapshots with a different version
/// are ignored and discovery runs again.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A node in the site's catalog taxonomy.
///
/// Categories form a tree of arbitrary depth (the reference site exposes
/// two levels). A node holds a shared reference to its parent; the parent
/// chain is serialized inline when a snapshot is written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    /// Display name as shown on the catalog page
    pub name: String,

    /// Listing page URL (relative to the base URL)
    pub url: String,

    /// Parent category, None for a top-level section
    #[serde(default)]
    pub parent: Option<Arc<Category>>,
}

impl Category {
    /// Create a top-level category.
    pub fn root(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            parent: None,
        }
    }

    /// Create a category nested under a parent.
    pub fn child(name: impl Into<String>, url: impl Into<String>, parent: Arc<Category>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            parent: Some(parent),
        }
    }

    /// Walk the parent chain up to the top-level section.
    pub fn top_level(&self) -> &Category {
        let mut current = self;
        while let Some(parent) = current.parent.as_deref() {
            current = parent;
        }
        current
    }

    /// Full name path from the top-level section down to this node.
    pub fn name_path(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{} / {}", parent.name_path(), self.name),
            None => self.name.clone(),
        }
    }
}

/// Dedup key for one listing page of one category.
///
/// The string form matches the reference deployment's cache key so an
/// existing ledger stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub category_url: String,
    pub page: u32,
}

impl PageKey {
    pub fn new(category: &Category, page: u32) -> Self {
        Self {
            category_url: category.url.clone(),
            page,
        }
    }

    /// Canonical string form: `{category_url}_{page}`.
    pub fn cache_key(&self) -> String {
        format!("{}_{}", self.category_url, self.page)
    }
}

/// Versioned checkpoint of a discovered category tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySnapshot {
    /// Checkpoint format version
    pub version: u32,

    /// ISO 8601 timestamp of the discovery run
    pub saved_at: DateTime<Utc>,

    /// Total category count
    pub count: usize,

    /// The flattened category list, parent links intact
    pub categories: Vec<Category>,
}

impl CategorySnapshot {
    pub fn new(categories: Vec<Category>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            count: categories.len(),
            categories,
        }
    }

    /// True when the snapshot was written by this checkpoint format.
    pub fn is_current(&self) -> bool {
        self.version == SNAPSHOT_VERSION
    }
}
