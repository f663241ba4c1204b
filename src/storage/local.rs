// src/storage/local.rs

//! Local filesystem storage backend.
//!
//! JSON files under one root directory, written atomically (temp file,
//! then rename). The ledger lives in memory behind a mutex and is
//! persisted on every new mark, so check-then-mark is atomic per key
//! even with many category workers running.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Category, CategorySnapshot, PageKey, Product};
use crate::storage::{CrawlStore, ProductSink};

const LEDGER_FILE: &str = "ledger.json";
const SNAPSHOT_FILE: &str = "categories.json";
const PRODUCTS_FILE: &str = "products.jsonl";

/// Local filesystem crawl store.
pub struct LocalStore {
    root_dir: PathBuf,
    ledger: Mutex<HashSet<String>>,
}

impl LocalStore {
    /// Open a store rooted at the given directory, loading any existing
    /// ledger.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        tokio::fs::create_dir_all(&root_dir).await?;

        let store = Self {
            root_dir,
            ledger: Mutex::new(HashSet::new()),
        };

        let entries: Option<Vec<String>> = store.read_json(LEDGER_FILE).await?;
        if let Some(entries) = entries {
            let mut ledger = store.ledger.lock().await;
            ledger.extend(entries);
            log::info!("Loaded {} ledger entries", ledger.len());
        }

        Ok(store)
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Persist the ledger set. Sorted for stable files.
    async fn persist_ledger(&self, ledger: &HashSet<String>) -> Result<()> {
        let mut entries: Vec<&String> = ledger.iter().collect();
        entries.sort();
        self.write_json(LEDGER_FILE, &entries).await
    }

    /// Number of ledger entries.
    pub async fn ledger_len(&self) -> usize {
        self.ledger.lock().await.len()
    }

    /// Drop the ledger and the category snapshot. Maintenance operation
    /// behind the `clean` command; entries never expire otherwise.
    pub async fn clear(&self) -> Result<()> {
        let mut ledger = self.ledger.lock().await;
        ledger.clear();

        for file in [LEDGER_FILE, SNAPSHOT_FILE] {
            match tokio::fs::remove_file(self.path(file)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(AppError::Io(e)),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CrawlStore for LocalStore {
    async fn is_done(&self, key: &PageKey) -> Result<bool> {
        Ok(self.ledger.lock().await.contains(&key.cache_key()))
    }

    async fn mark_done(&self, key: &PageKey) -> Result<()> {
        let mut ledger = self.ledger.lock().await;
        if ledger.insert(key.cache_key()) {
            // Persist while holding the lock so a concurrent check never
            // races a half-written ledger.
            self.persist_ledger(&ledger).await?;
        }
        Ok(())
    }

    async fn load_categories(&self) -> Result<Option<CategorySnapshot>> {
        match self.read_json::<CategorySnapshot>(SNAPSHOT_FILE).await? {
            Some(snapshot) if snapshot.is_current() => Ok(Some(snapshot)),
            Some(snapshot) => {
                log::warn!(
                    "Ignoring category snapshot with version {} (current is {})",
                    snapshot.version,
                    crate::models::SNAPSHOT_VERSION
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn save_categories(&self, snapshot: &CategorySnapshot) -> Result<()> {
        self.write_json(SNAPSHOT_FILE, snapshot).await
    }
}

/// One product line in the JSONL output.
#[derive(Serialize)]
struct ProductRecord<'a> {
    category: String,
    category_url: &'a str,
    page: u32,
    #[serde(flatten)]
    product: &'a Product,
}

/// Append-only JSON Lines product sink.
pub struct JsonlSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSink {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: root_dir.into().join(PRODUCTS_FILE),
            write_lock: Mutex::new(()),
        }
    }

    /// Remove the output file. Maintenance operation behind `clean`.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl ProductSink for JsonlSink {
    async fn write_page(
        &self,
        category: &Category,
        page: u32,
        products: &[Product],
    ) -> Result<()> {
        let mut buffer = String::new();
        for product in products {
            let record = ProductRecord {
                category: category.name_path(),
                category_url: &category.url,
                page,
                product,
            };
            buffer.push_str(&serde_json::to_string(&record)?);
            buffer.push('\n');
        }

        // One page is appended as one contiguous block.
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
