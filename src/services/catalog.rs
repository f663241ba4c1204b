// src/services/catalog.rs

//! Catalog resolver service.
//!
//! Orchestrates the fetcher and the extractor: one-shot category
//! discovery, per-page product resolution, and the ledger-gated
//! pagination loop for a single category.

use std::sync::Arc;

use reqwest::Method;
use scraper::Html;

use crate::error::Result;
use crate::models::{Category, Config, PageKey, Product};
use crate::services::extract;
use crate::services::fetch::Fetch;
use crate::storage::{CrawlStore, ProductSink};

/// Pagination state of one category crawl.
///
/// Pages advance strictly in increasing order; the only exit from
/// `Paging` is the listing endpoint answering 404.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCursor {
    NotStarted,
    Paging(u32),
    Exhausted,
}

impl PageCursor {
    /// The page to process next, None once exhausted.
    pub fn current_page(self) -> Option<u32> {
        match self {
            Self::NotStarted => Some(1),
            Self::Paging(page) => Some(page),
            Self::Exhausted => None,
        }
    }

    /// Advance past a completed (or skipped) page.
    pub fn advance(self) -> Self {
        match self {
            Self::NotStarted => Self::Paging(2),
            Self::Paging(page) => Self::Paging(page + 1),
            Self::Exhausted => Self::Exhausted,
        }
    }
}

/// Counters for one category's crawl.
#[derive(Debug, Default)]
pub struct CategoryOutcome {
    pub pages_crawled: usize,
    pub pages_skipped: usize,
    pub products: usize,
}

/// Service resolving categories, listing pages, and products.
///
/// Generic over [`Fetch`] so tests can drive it with scripted responses.
pub struct CatalogResolver<F: Fetch> {
    config: Arc<Config>,
    fetcher: F,
}

impl<F: Fetch> CatalogResolver<F> {
    pub fn new(config: Arc<Config>, fetcher: F) -> Self {
        Self { config, fetcher }
    }

    /// Discover the full category list from the catalog root.
    ///
    /// One-shot per run; callers are expected to checkpoint the result.
    pub async fn resolve_categories(&mut self) -> Result<Vec<Category>> {
        let endpoint = self.config.endpoints.catalog_path.clone();
        let body = self.fetcher.fetch(Method::GET, &endpoint, &[]).await?;

        let document = Html::parse_document(&body);
        extract::extract_categories(&document, &self.config.selectors)
    }

    /// Resolve one product id into a full record, offers included.
    ///
    /// One detail fetch plus one fetch per offer, sequential to bound
    /// load on the site.
    async fn resolve_product(&mut self, product_id: &str) -> Result<Product> {
        log::info!("Getting product {}", product_id);

        let endpoint = self.config.endpoints.product_details_path(product_id);
        let raw = self.fetcher.fetch_json(Method::GET, &endpoint, &[]).await?;
        let (mut product, offer_ids) = extract::extract_product(&raw)?;

        for offer_id in &offer_ids {
            let endpoint = self.config.endpoints.offer_details_path(offer_id);
            let raw = self.fetcher.fetch_json(Method::GET, &endpoint, &[]).await?;
            product.offers.push(extract::extract_offer(&raw));
        }

        Ok(product)
    }

    /// Fetch one listing page and resolve every product on it, in
    /// document order.
    pub async fn resolve_page(&mut self, category: &Category, page: u32) -> Result<Vec<Product>> {
        log::info!(
            "Getting products with category {} and page {}",
            category.name,
            page
        );

        let query = [(self.config.endpoints.page_param.clone(), page.to_string())];
        let body = self.fetcher.fetch(Method::GET, &category.url, &query).await?;

        let ids = {
            let document = Html::parse_document(&body);
            extract::extract_product_ids(&document, &self.config.selectors)?
        };

        let mut products = Vec::with_capacity(ids.len());
        for id in &ids {
            products.push(self.resolve_product(id).await?);
        }
        Ok(products)
    }

    /// Crawl one category from page 1 until the listing endpoint reports
    /// 404.
    ///
    /// Pages already in the ledger are skipped without fetching. Each
    /// successful page is emitted to the sink and marked done before the
    /// next page starts, so an interrupted crawl resumes where it
    /// stopped. `Blocked` propagates to the caller.
    pub async fn crawl_category(
        &mut self,
        category: &Category,
        store: &dyn CrawlStore,
        sink: &dyn ProductSink,
    ) -> Result<CategoryOutcome> {
        let mut outcome = CategoryOutcome::default();
        let mut cursor = PageCursor::NotStarted;

        while let Some(page) = cursor.current_page() {
            let key = PageKey::new(category, page);

            if store.is_done(&key).await? {
                log::info!("Skipped {} (already exists)", key.cache_key());
                outcome.pages_skipped += 1;
                cursor = cursor.advance();
                continue;
            }

            match self.resolve_page(category, page).await {
                Ok(products) => {
                    if !products.is_empty() {
                        sink.write_page(category, page, &products).await?;
                    }
                    outcome.products += products.len();
                    outcome.pages_crawled += 1;
                    store.mark_done(&key).await?;
                    cursor = cursor.advance();
                }
                Err(e) if e.is_not_found() => {
                    log::info!(
                        "Category {} exhausted at page {}",
                        category.name_path(),
                        page
                    );
                    cursor = PageCursor::Exhausted;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::error::AppError;
    use crate::storage::{JsonlSink, LocalStore};

    enum MockResponse {
        Body(String),
        NotFound,
        Blocked,
    }

    /// Scripted fetch: unrouted endpoints answer 404, calls are recorded.
    struct MockFetch {
        routes: HashMap<String, MockResponse>,
        calls: Vec<String>,
    }

    impl MockFetch {
        fn new() -> Self {
            Self {
                routes: HashMap::new(),
                calls: Vec::new(),
            }
        }

        fn key(endpoint: &str, query: &[(String, String)]) -> String {
            if query.is_empty() {
                return endpoint.to_string();
            }
            let pairs: Vec<String> = query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!("{}?{}", endpoint, pairs.join("&"))
        }

        fn route(mut self, key: &str, response: MockResponse) -> Self {
            self.routes.insert(key.to_string(), response);
            self
        }
    }

    #[async_trait]
    impl Fetch for MockFetch {
        async fn fetch(
            &mut self,
            _method: Method,
            endpoint: &str,
            query: &[(String, String)],
        ) -> Result<String> {
            let key = Self::key(endpoint, query);
            self.calls.push(key.clone());
            match self.routes.get(&key) {
                Some(MockResponse::Body(body)) => Ok(body.clone()),
                Some(MockResponse::Blocked) => Err(AppError::blocked("scripted block")),
                Some(MockResponse::NotFound) | None => Err(AppError::not_found(key)),
            }
        }
    }

    fn listing_body(ids: &[u64]) -> String {
        let cards: String = ids
            .iter()
            .map(|id| format!(r#"<div class="bth-card-element" data-product-id="{id}"></div>"#))
            .collect();
        format!("<html><body>{cards}</body></html>")
    }

    fn product_body(id: u64, offer_ids: &[u64]) -> String {
        let offers: Vec<String> = offer_ids.iter().map(|id| format!(r#"{{"id": {id}}}"#)).collect();
        format!(
            r#"{{"id": {id}, "name": "Product {id}", "offers": [{}]}}"#,
            offers.join(",")
        )
    }

    fn offer_body(code: &str) -> String {
        format!(
            r#"{{
                "code": "{code}",
                "size": "1 кг",
                "retail_price": 500.0,
                "discount_price": 450.0,
                "availability_info": {{
                    "offer_store_amount": [
                        {{"address": "Москва", "availability": {{"text": "в наличии"}}}}
                    ]
                }}
            }}"#
        )
    }

    fn test_category() -> Category {
        Category::root("Кошки", "/catalogue/koshki/")
    }

    fn resolver(fetch: MockFetch) -> CatalogResolver<MockFetch> {
        CatalogResolver::new(Arc::new(Config::default()), fetch)
    }

    /// Two listing pages with one product (one offer, one shop) each;
    /// page 3 is not routed and answers 404.
    fn two_page_fetch() -> MockFetch {
        MockFetch::new()
            .route(
                "/catalogue/koshki/?PAGEN_1=1",
                MockResponse::Body(listing_body(&[101])),
            )
            .route(
                "/catalogue/koshki/?PAGEN_1=2",
                MockResponse::Body(listing_body(&[202])),
            )
            .route("/catalogue/koshki/?PAGEN_1=3", MockResponse::NotFound)
            .route(
                "api/local/v1/catalog/products/101/details",
                MockResponse::Body(product_body(101, &[7])),
            )
            .route(
                "api/local/v1/catalog/products/202/details",
                MockResponse::Body(product_body(202, &[8])),
            )
            .route(
                "api/local/v1/catalog/offers/7/details",
                MockResponse::Body(offer_body("BTH-7")),
            )
            .route(
                "api/local/v1/catalog/offers/8/details",
                MockResponse::Body(offer_body("BTH-8")),
            )
    }

    #[test]
    fn test_page_cursor_transitions() {
        let cursor = PageCursor::NotStarted;
        assert_eq!(cursor.current_page(), Some(1));

        let cursor = cursor.advance();
        assert_eq!(cursor, PageCursor::Paging(2));
        assert_eq!(cursor.advance(), PageCursor::Paging(3));

        assert_eq!(PageCursor::Exhausted.current_page(), None);
        assert_eq!(PageCursor::Exhausted.advance(), PageCursor::Exhausted);
    }

    #[tokio::test]
    async fn test_resolve_categories_from_root() {
        let fixture = r#"
            <div class="section_info">
                <div class="name">Кошки</div>
                <a href="/catalogue/koshki/"></a>
                <div class="sect"><a href="/catalogue/koshki/korm/">Корм</a></div>
            </div>
        "#;
        let fetch =
            MockFetch::new().route("catalogue", MockResponse::Body(fixture.to_string()));

        let mut resolver = resolver(fetch);
        let categories = resolver.resolve_categories().await.unwrap();

        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].parent.as_deref().unwrap().name, "Кошки");
    }

    #[tokio::test]
    async fn test_resolve_page_orders_products() {
        let fetch = MockFetch::new()
            .route(
                "/catalogue/koshki/?PAGEN_1=1",
                MockResponse::Body(listing_body(&[202, 101])),
            )
            .route(
                "api/local/v1/catalog/products/202/details",
                MockResponse::Body(product_body(202, &[])),
            )
            .route(
                "api/local/v1/catalog/products/101/details",
                MockResponse::Body(product_body(101, &[])),
            );

        let mut resolver = resolver(fetch);
        let products = resolver.resolve_page(&test_category(), 1).await.unwrap();

        let ids: Vec<u64> = products.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![202, 101]);
    }

    #[tokio::test]
    async fn test_pagination_stops_at_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();
        let sink = JsonlSink::new(tmp.path());

        let mut resolver = resolver(two_page_fetch());
        let outcome = resolver
            .crawl_category(&test_category(), &store, &sink)
            .await
            .unwrap();

        assert_eq!(outcome.pages_crawled, 2);
        assert_eq!(outcome.products, 2);
        assert_eq!(store.ledger_len().await, 2);
        assert!(
            store
                .is_done(&PageKey::new(&test_category(), 2))
                .await
                .unwrap()
        );
        assert!(
            !store
                .is_done(&PageKey::new(&test_category(), 3))
                .await
                .unwrap()
        );

        // Pagination probed page 3, nothing beyond it.
        let listing_calls: Vec<&String> = resolver
            .fetcher
            .calls
            .iter()
            .filter(|c| c.contains("PAGEN_1"))
            .collect();
        assert_eq!(
            listing_calls,
            vec![
                "/catalogue/koshki/?PAGEN_1=1",
                "/catalogue/koshki/?PAGEN_1=2",
                "/catalogue/koshki/?PAGEN_1=3",
            ]
        );
    }

    #[tokio::test]
    async fn test_rerun_resolves_no_pages() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();
        let sink = JsonlSink::new(tmp.path());

        let mut resolver = resolver(two_page_fetch());
        resolver
            .crawl_category(&test_category(), &store, &sink)
            .await
            .unwrap();

        // Second run against the populated ledger: both pages skipped,
        // only the terminating probe goes out, nothing new is emitted.
        let mut rerun = self::resolver(two_page_fetch());
        let outcome = rerun
            .crawl_category(&test_category(), &store, &sink)
            .await
            .unwrap();

        assert_eq!(outcome.pages_crawled, 0);
        assert_eq!(outcome.pages_skipped, 2);
        assert_eq!(outcome.products, 0);
        assert_eq!(rerun.fetcher.calls, vec!["/catalogue/koshki/?PAGEN_1=3"]);

        let content = std::fs::read_to_string(tmp.path().join("products.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_end_to_end_two_pages_one_product_each() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();
        let sink = JsonlSink::new(tmp.path());

        let mut resolver = resolver(two_page_fetch());
        let outcome = resolver
            .crawl_category(&test_category(), &store, &sink)
            .await
            .unwrap();

        assert_eq!(outcome.products, 2);
        assert_eq!(store.ledger_len().await, 2);

        let content = std::fs::read_to_string(tmp.path().join("products.jsonl")).unwrap();
        let records: Vec<serde_json::Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0]["id"], 101);
        assert_eq!(records[0]["page"], 1);
        assert_eq!(records[0]["offers"][0]["code"], "BTH-7");
        assert_eq!(
            records[0]["offers"][0]["shops"][0]["availability"],
            "в наличии"
        );
        assert_eq!(records[1]["id"], 202);
        assert_eq!(records[1]["page"], 2);
    }

    #[tokio::test]
    async fn test_blocked_leaves_completed_pages_marked() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path()).await.unwrap();
        let sink = JsonlSink::new(tmp.path());

        let fetch = MockFetch::new()
            .route(
                "/catalogue/koshki/?PAGEN_1=1",
                MockResponse::Body(listing_body(&[101])),
            )
            .route(
                "api/local/v1/catalog/products/101/details",
                MockResponse::Body(product_body(101, &[])),
            )
            .route("/catalogue/koshki/?PAGEN_1=2", MockResponse::Blocked);

        let mut resolver = resolver(fetch);
        let err = resolver
            .crawl_category(&test_category(), &store, &sink)
            .await
            .unwrap_err();

        assert!(err.is_blocked());
        // Page 1 survived: marked done and emitted, resumable later.
        assert!(
            store
                .is_done(&PageKey::new(&test_category(), 1))
                .await
                .unwrap()
        );
        let content = std::fs::read_to_string(tmp.path().join("products.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
