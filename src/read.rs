// src/read.rs
// Read path: every query is answered from the article store alone. This
// module has no handle to the upstream clients, by construction — an
// empty cache yields empty results, never a live fetch.

use std::sync::Arc;

use serde::Serialize;

use crate::article::NewsArticle;
use crate::store::{
    ArticleStore, PageOptions, QueryFilters, SourceCount, StoreResult, StoreStats,
};

const MAX_PAGE_LIMIT: usize = 100;
const DEFAULT_PAGE_LIMIT: usize = 20;

#[derive(Debug, Serialize)]
pub struct PagedArticles {
    pub records: Vec<NewsArticle>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[derive(Clone)]
pub struct ReadService {
    store: Arc<ArticleStore>,
}

impl ReadService {
    pub fn new(store: Arc<ArticleStore>) -> Self {
        Self { store }
    }

    pub fn latest(
        &self,
        filters: QueryFilters,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> StoreResult<PagedArticles> {
        let page_opts = clamp(page, limit);
        let records = self.store.find_recent(None, &filters, page_opts)?;
        let total = self.store.count_matching(None, &filters)?;
        Ok(paged(records, total, page_opts))
    }

    pub fn search(
        &self,
        query: &str,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> StoreResult<PagedArticles> {
        let page_opts = clamp(page, limit);
        let (records, total) = self.store.search_full_text(query, page_opts)?;
        Ok(paged(records, total, page_opts))
    }

    /// Most recent N, no filters.
    pub fn trending(&self, limit: Option<usize>) -> StoreResult<Vec<NewsArticle>> {
        let page_opts = clamp(Some(1), limit);
        self.store
            .find_recent(None, &QueryFilters::default(), page_opts)
    }

    pub fn by_category(
        &self,
        categories: Vec<String>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> StoreResult<PagedArticles> {
        let page_opts = clamp(page, limit);
        let (records, total) = self.store.find_by_category(&categories, page_opts)?;
        Ok(paged(records, total, page_opts))
    }

    pub fn by_country(
        &self,
        countries: Vec<String>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> StoreResult<PagedArticles> {
        let page_opts = clamp(page, limit);
        let (records, total) = self.store.find_by_country(&countries, page_opts)?;
        Ok(paged(records, total, page_opts))
    }

    pub fn sources(&self) -> StoreResult<Vec<SourceCount>> {
        self.store.aggregate_source_stats()
    }

    pub fn stats(&self) -> StoreResult<StoreStats> {
        self.store.stats()
    }
}

fn clamp(page: Option<usize>, limit: Option<usize>) -> PageOptions {
    PageOptions {
        page: page.unwrap_or(1).max(1),
        limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
    }
}

fn paged(records: Vec<NewsArticle>, total: usize, opts: PageOptions) -> PagedArticles {
    PagedArticles {
        records,
        total,
        page: opts.page,
        limit: opts.limit,
    }
}
