//! Lazy Pager
//!
//! Fetches one page of a large collection at a time and caches each page
//! through the cache manager.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::manager::CacheManager;

/// Filter set passed through to the data source.
pub type Filters = BTreeMap<String, serde_json::Value>;

/// TTL for cached pages unless overridden.
pub const DEFAULT_PAGE_TTL: Duration = Duration::from_secs(1800);

// == Data Source ==
/// One slice of the upstream collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

/// Upstream collection the pager reads from.
#[async_trait]
pub trait DataSource: Send + Sync {
    type Item: Serialize + DeserializeOwned + Send;

    /// Stable identity; part of every page key.
    fn name(&self) -> &str;

    async fn fetch(
        &self,
        offset: u64,
        limit: u64,
        filters: &Filters,
    ) -> anyhow::Result<FetchResult<Self::Item>>;
}

// == Page ==
/// A cached page together with the totals reported alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub page: u64,
    pub items: Vec<T>,
    pub total_count: u64,
    pub total_pages: u64,
}

// == Pager State ==
/// Navigation state owned by one consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerState {
    pub current_page: u64,
    pub page_size: u64,
    /// Zero until the first page has been loaded
    pub total_pages: u64,
    pub total_count: u64,
}

impl PagerState {
    pub fn is_loaded(&self) -> bool {
        self.total_pages > 0
    }

    pub fn last_page(&self) -> u64 {
        self.total_pages.saturating_sub(1)
    }

    fn clamp(&self, page: u64) -> u64 {
        page.min(self.last_page())
    }
}

// == Lazy Pager ==
pub struct LazyPager<S: DataSource> {
    manager: Arc<CacheManager>,
    source: S,
    filters: Filters,
    ttl: Duration,
    state: PagerState,
}

impl<S: DataSource> LazyPager<S> {
    /// Creates an idle pager positioned at page 0.
    pub fn new(manager: Arc<CacheManager>, source: S, page_size: u64) -> Result<Self> {
        if page_size == 0 {
            return Err(CacheError::Configuration(
                "page size must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            manager,
            source,
            filters: Filters::new(),
            ttl: DEFAULT_PAGE_TTL,
            state: PagerState {
                current_page: 0,
                page_size,
                total_pages: 0,
                total_count: 0,
            },
        })
    }

    /// Page size and page TTL from configuration.
    pub fn from_config(manager: Arc<CacheManager>, source: S, config: &Config) -> Result<Self> {
        Ok(Self::new(manager, source, config.page_size)?.with_ttl(config.page_ttl()))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    pub fn state(&self) -> PagerState {
        self.state
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Replaces the filter set and returns to an idle page 0.
    pub fn set_filters(&mut self, filters: Filters) {
        self.filters = filters;
        self.reset();
    }

    /// Back to idle at page 0. Cached pages are left alone.
    pub fn reset(&mut self) {
        self.state = PagerState {
            current_page: 0,
            page_size: self.state.page_size,
            total_pages: 0,
            total_count: 0,
        };
    }

    // == Load Page ==
    /// Loads page `page` from the cache, fetching it on a miss.
    ///
    /// A page past the end resolves to the last page once the totals are
    /// known; out-of-range pages are never cached. On success the pager
    /// moves to the returned page. On a fetch failure nothing is cached
    /// and the state is left untouched.
    pub async fn load_page(&mut self, page: u64) -> Result<Page<S::Item>> {
        let mut page = page;
        let loaded = loop {
            let loaded = self.cached_or_fetched(page).await?;
            let last = loaded.total_pages.saturating_sub(1);
            if page <= last {
                break loaded;
            }
            debug!(
                "{} page {} out of range, using last page {}",
                self.source.name(),
                page,
                last
            );
            page = last;
        };

        self.state.current_page = loaded.page;
        self.state.total_pages = loaded.total_pages;
        self.state.total_count = loaded.total_count;
        Ok(loaded)
    }

    async fn cached_or_fetched(&self, page: u64) -> Result<Page<S::Item>> {
        let name = format!("lazy_page:{}", self.source.name());
        let params = json!({
            "page": page,
            "page_size": self.state.page_size,
            "filters": self.filters,
        });

        if let Some(cached) = self.manager.get::<Page<S::Item>, _>(&name, &params).await? {
            return Ok(cached);
        }

        let size = self.state.page_size;
        let offset = page.saturating_mul(size);
        debug!("Fetching {} page {} (offset {})", self.source.name(), page, offset);

        let fetched = self
            .source
            .fetch(offset, size, &self.filters)
            .await
            .map_err(CacheError::PageFetch)?;

        let page_data = Page {
            page,
            total_pages: total_pages(fetched.total_count, size),
            total_count: fetched.total_count,
            items: fetched.items,
        };
        if page < page_data.total_pages {
            self.manager
                .set(&name, &page_data, Some(self.ttl), &params)
                .await?;
        }
        Ok(page_data)
    }

    // == Navigation ==
    pub async fn current(&mut self) -> Result<Page<S::Item>> {
        self.load_page(self.state.current_page).await
    }

    pub async fn first(&mut self) -> Result<Page<S::Item>> {
        self.navigate(|_| 0).await
    }

    pub async fn previous(&mut self) -> Result<Page<S::Item>> {
        self.navigate(|state| state.current_page.saturating_sub(1)).await
    }

    pub async fn next(&mut self) -> Result<Page<S::Item>> {
        self.navigate(|state| state.current_page.saturating_add(1)).await
    }

    pub async fn last(&mut self) -> Result<Page<S::Item>> {
        self.navigate(PagerState::last_page).await
    }

    /// Moves to `target(state)` clamped to `[0, total_pages - 1]`.
    ///
    /// An idle pager loads its current page first to learn the totals.
    /// At a boundary the current page is returned again.
    async fn navigate<F>(&mut self, target: F) -> Result<Page<S::Item>>
    where
        F: FnOnce(&PagerState) -> u64,
    {
        if !self.state.is_loaded() {
            let current = self.current().await?;
            let page = self.state.clamp(target(&self.state));
            if page == current.page {
                return Ok(current);
            }
            return self.load_page(page).await;
        }

        let page = self.state.clamp(target(&self.state));
        self.load_page(page).await
    }
}

/// Pages needed for `total_count` records, never less than one.
fn total_pages(total_count: u64, page_size: u64) -> u64 {
    total_count.div_ceil(page_size).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// 0..total as an in-memory table, counting fetches.
    struct Numbers {
        total: u64,
        fetches: AtomicUsize,
        fail: AtomicBool,
    }

    impl Numbers {
        fn new(total: u64) -> Self {
            Self {
                total,
                fetches: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DataSource for Arc<Numbers> {
        type Item = u64;

        fn name(&self) -> &str {
            "numbers"
        }

        async fn fetch(
            &self,
            offset: u64,
            limit: u64,
            filters: &Filters,
        ) -> anyhow::Result<FetchResult<u64>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                bail!("upstream unavailable");
            }

            let even_only = filters.get("even").and_then(|v| v.as_bool()).unwrap_or(false);
            let rows: Vec<u64> = (0..self.total).filter(|n| !even_only || n % 2 == 0).collect();
            Ok(FetchResult {
                total_count: rows.len() as u64,
                items: rows
                    .into_iter()
                    .skip(offset as usize)
                    .take(limit as usize)
                    .collect(),
            })
        }
    }

    fn pager(total: u64, page_size: u64) -> (LazyPager<Arc<Numbers>>, Arc<Numbers>) {
        let cache = Arc::new(CacheManager::builder().namespace("pager").build().unwrap());
        let source = Arc::new(Numbers::new(total));
        (LazyPager::new(cache, source.clone(), page_size).unwrap(), source)
    }

    #[tokio::test]
    async fn test_load_page_fetches_window() {
        let (mut pager, source) = pager(25, 10);

        let page = pager.load_page(2).await.unwrap();
        assert_eq!(page.items, vec![20, 21, 22, 23, 24]);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_count, 25);
        assert_eq!(pager.state().current_page, 2);
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_load_page_past_end_lands_on_last() {
        let (mut pager, source) = pager(25, 10);

        let page = pager.load_page(10).await.unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.items, vec![20, 21, 22, 23, 24]);
        assert_eq!(pager.state().current_page, 2);
        assert_eq!(source.fetches(), 2, "past-end fetch then last page");

        let fetches = source.fetches();
        assert_eq!(pager.next().await.unwrap().page, 2);
        assert_eq!(source.fetches(), fetches);

        // Only the in-range page was cached.
        assert_eq!(pager.load_page(10).await.unwrap().page, 2);
        assert_eq!(source.fetches(), fetches + 1);
    }

    #[tokio::test]
    async fn test_first_at_zero_is_noop() {
        let (mut pager, source) = pager(25, 10);
        pager.load_page(0).await.unwrap();

        let page = pager.first().await.unwrap();
        assert_eq!(page.page, 0);
        assert_eq!(pager.state().current_page, 0);
        assert_eq!(source.fetches(), 1);

        pager.previous().await.unwrap();
        assert_eq!(pager.state().current_page, 0);
    }

    #[tokio::test]
    async fn test_next_at_last_is_noop() {
        let (mut pager, source) = pager(25, 10);

        pager.last().await.unwrap();
        assert_eq!(pager.state().current_page, 2);
        let fetches = source.fetches();

        let page = pager.next().await.unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(pager.state().current_page, 2);
        assert_eq!(source.fetches(), fetches);
    }

    #[tokio::test]
    async fn test_forward_then_back_uses_cache() {
        let (mut pager, source) = pager(25, 10);

        let original = pager.current().await.unwrap();
        pager.next().await.unwrap();
        assert_eq!(source.fetches(), 2);

        let back = pager.previous().await.unwrap();
        assert_eq!(back, original);
        assert_eq!(source.fetches(), 2, "no extra fetch going back");
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_state() {
        let (mut pager, source) = pager(25, 10);
        pager.load_page(0).await.unwrap();

        source.fail.store(true, Ordering::SeqCst);
        let result = pager.next().await;
        assert!(matches!(result, Err(CacheError::PageFetch(_))));
        assert_eq!(pager.state().current_page, 0);

        source.fail.store(false, Ordering::SeqCst);
        let page = pager.next().await.unwrap();
        assert_eq!(page.page, 1);
    }

    #[tokio::test]
    async fn test_filters_are_part_of_the_key() {
        let (mut pager, source) = pager(25, 10);
        pager.load_page(0).await.unwrap();

        let mut filters = Filters::new();
        filters.insert("even".to_string(), json!(true));
        pager.set_filters(filters);
        assert!(!pager.state().is_loaded());

        let page = pager.current().await.unwrap();
        assert_eq!(page.items, vec![0, 2, 4, 6, 8, 10, 12, 14, 16, 18]);
        assert_eq!(page.total_pages, 2);
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_empty_source_has_one_page() {
        let (mut pager, _) = pager(0, 10);
        let page = pager.last().await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
        assert_eq!(pager.next().await.unwrap().page, 0);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let cache = Arc::new(CacheManager::builder().build().unwrap());
        let result = LazyPager::new(cache, Arc::new(Numbers::new(1)), 0);
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_from_config_uses_page_settings() {
        let config = Config {
            page_size: 7,
            ..Config::default()
        };
        let cache = Arc::new(CacheManager::builder().build().unwrap());
        let mut pager = LazyPager::from_config(cache, Arc::new(Numbers::new(20)), &config).unwrap();

        let page = pager.current().await.unwrap();
        assert_eq!(page.items.len(), 7);
        assert_eq!(pager.state().total_pages, 3);
    }

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }
}
