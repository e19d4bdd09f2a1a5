// src/store.rs
// Persistent article collection over sled: one primary tree keyed by
// article_id plus key-ordered secondary trees standing in for the query
// indices (publishedAt desc, category+publishedAt, country+publishedAt).

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::article::{NewsArticle, ProviderTag};

const TREE_ARTICLES: &str = "articles";
const TREE_PUBLISHED: &str = "published_idx";
const TREE_CATEGORY: &str = "category_idx";
const TREE_COUNTRY: &str = "country_idx";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store itself cannot be reached or a read/write failed at the
    /// storage layer. Read endpoints surface this as service-unavailable.
    #[error("article store unavailable: {0}")]
    Unavailable(String),

    #[error("record encoding failed: {0}")]
    Codec(String),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for StoreError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        StoreError::Codec(e.to_string())
    }
}

/// One record that failed storage-level validation inside a bulk upsert.
#[derive(Debug, Clone, Serialize)]
pub struct RecordError {
    pub article_id: String,
    pub reason: String,
}

/// Outcome of a bulk upsert. Partial failure tolerant: `errors` lists the
/// records that were dropped, the rest committed.
#[derive(Debug, Default, Serialize)]
pub struct UpsertReport {
    pub inserted: usize,
    pub updated: usize,
    pub errors: Vec<RecordError>,
}

impl UpsertReport {
    pub fn committed(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Optional filters shared by the recency queries.
#[derive(Debug, Default, Clone)]
pub struct QueryFilters {
    pub category: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
}

impl QueryFilters {
    fn matches(&self, a: &NewsArticle) -> bool {
        if let Some(c) = &self.category {
            if !a.matches_category(std::slice::from_ref(c)) {
                return false;
            }
        }
        if let Some(c) = &self.country {
            if !a.matches_country(std::slice::from_ref(c)) {
                return false;
            }
        }
        if let Some(l) = &self.language {
            if !a.language.eq_ignore_ascii_case(l) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageOptions {
    pub page: usize,
    pub limit: usize,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl PageOptions {
    fn skip(&self) -> usize {
        self.page.saturating_sub(1) * self.limit
    }
}

/// Distinct publisher with article count.
#[derive(Debug, Clone, Serialize)]
pub struct SourceCount {
    pub id: Option<String>,
    pub name: String,
    pub count: usize,
}

/// Store-wide totals for the stats endpoint.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub total_articles: usize,
    pub newsdata_articles: usize,
    pub newsapi_articles: usize,
    pub last_24h_articles: usize,
}

pub struct ArticleStore {
    articles: sled::Tree,
    published_idx: sled::Tree,
    category_idx: sled::Tree,
    country_idx: sled::Tree,
    // Keeps the Db alive for flushing on drop.
    _db: sled::Db,
}

impl ArticleStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            articles: db.open_tree(TREE_ARTICLES)?,
            published_idx: db.open_tree(TREE_PUBLISHED)?,
            category_idx: db.open_tree(TREE_CATEGORY)?,
            country_idx: db.open_tree(TREE_COUNTRY)?,
            _db: db,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn total_articles(&self) -> usize {
        self.articles.len()
    }

    /// Upsert a batch keyed by `article_id`. One malformed record does not
    /// abort the batch; it is reported in the returned error list.
    ///
    /// Concurrent calls are safe: each record write is atomic per key at
    /// the storage layer, and concurrent upserts of the same id converge
    /// to whichever write commits last. A staler upstream copy can
    /// overwrite a fresher one if it commits later; this is accepted
    /// weak consistency, not a bug to paper over here.
    pub fn bulk_upsert(&self, records: &[NewsArticle]) -> StoreResult<UpsertReport> {
        let mut report = UpsertReport::default();

        for record in records {
            if let Err(reason) = record.validate() {
                report.errors.push(RecordError {
                    article_id: record.article_id.clone(),
                    reason,
                });
                continue;
            }

            let key = record.article_id.as_bytes();
            let previous = match self.articles.get(key)? {
                Some(raw) => Some(decode(&raw)?),
                None => None,
            };

            let mut next = record.clone();
            if let Some(prev) = &previous {
                // The soft-delete flag is owned by external housekeeping;
                // a re-fetch must not resurrect a deleted record.
                next.is_deleted = prev.is_deleted;
                self.remove_index_entries(prev)?;
            }

            self.articles.insert(key, bincode::serialize(&next)?)?;
            self.insert_index_entries(&next)?;

            if previous.is_some() {
                report.updated += 1;
            } else {
                report.inserted += 1;
            }
        }

        self.articles.flush().map_err(StoreError::from)?;
        Ok(report)
    }

    pub fn get(&self, article_id: &str) -> StoreResult<Option<NewsArticle>> {
        match self.articles.get(article_id.as_bytes())? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Soft delete. Never called by the ingestion path; exposed for
    /// external housekeeping. Returns false for an unknown id.
    pub fn soft_delete(&self, article_id: &str) -> StoreResult<bool> {
        let Some(raw) = self.articles.get(article_id.as_bytes())? else {
            return Ok(false);
        };
        let mut record = decode(&raw)?;
        record.is_deleted = true;
        self.articles
            .insert(article_id.as_bytes(), bincode::serialize(&record)?)?;
        Ok(true)
    }

    /// Records ordered newest `published_at` first, optionally bounded to
    /// a trailing window. Soft-deleted records are excluded.
    pub fn find_recent(
        &self,
        within: Option<Duration>,
        filters: &QueryFilters,
        page: PageOptions,
    ) -> StoreResult<Vec<NewsArticle>> {
        let cutoff = within.map(|d| Utc::now() - d);
        let mut out = Vec::with_capacity(page.limit);
        let mut seen = 0usize;

        for entry in self.published_idx.iter() {
            let (_, id) = entry?;
            let Some(article) = self.load_indexed(&id)? else {
                continue;
            };
            if let Some(cutoff) = cutoff {
                // The index is ordered newest-first, so the first record
                // past the cutoff ends the scan.
                if article.published_at < cutoff {
                    break;
                }
            }
            if article.is_deleted || !filters.matches(&article) {
                continue;
            }
            if seen >= page.skip() {
                out.push(article);
                if out.len() >= page.limit {
                    break;
                }
            }
            seen += 1;
        }
        Ok(out)
    }

    pub fn find_by_category(
        &self,
        categories: &[String],
        page: PageOptions,
    ) -> StoreResult<(Vec<NewsArticle>, usize)> {
        self.find_by_index(&self.category_idx, categories, page)
    }

    pub fn find_by_country(
        &self,
        countries: &[String],
        page: PageOptions,
    ) -> StoreResult<(Vec<NewsArticle>, usize)> {
        self.find_by_index(&self.country_idx, countries, page)
    }

    /// Ranked full-text search over title/description/content with title
    /// matches weighted highest, ties broken by `published_at` desc.
    pub fn search_full_text(
        &self,
        query: &str,
        page: PageOptions,
    ) -> StoreResult<(Vec<NewsArticle>, usize)> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let mut scored: Vec<(u32, NewsArticle)> = Vec::new();
        for entry in self.articles.iter() {
            let (_, raw) = entry?;
            let article = decode(&raw)?;
            if article.is_deleted {
                continue;
            }
            let score = relevance_score(&article, &terms);
            if score > 0 {
                scored.push((score, article));
            }
        }

        scored.sort_by(|(sa, a), (sb, b)| {
            sb.cmp(sa).then_with(|| b.published_at.cmp(&a.published_at))
        });

        let total = scored.len();
        let records = scored
            .into_iter()
            .skip(page.skip())
            .take(page.limit)
            .map(|(_, a)| a)
            .collect();
        Ok((records, total))
    }

    /// Matching-record count for pagination metadata.
    pub fn count_matching(
        &self,
        within: Option<Duration>,
        filters: &QueryFilters,
    ) -> StoreResult<usize> {
        let cutoff = within.map(|d| Utc::now() - d);
        let mut n = 0usize;
        for entry in self.published_idx.iter() {
            let (_, id) = entry?;
            let Some(article) = self.load_indexed(&id)? else {
                continue;
            };
            if let Some(cutoff) = cutoff {
                if article.published_at < cutoff {
                    break;
                }
            }
            if !article.is_deleted && filters.matches(&article) {
                n += 1;
            }
        }
        Ok(n)
    }

    /// Distinct sources with article counts, largest first.
    pub fn aggregate_source_stats(&self) -> StoreResult<Vec<SourceCount>> {
        let mut counts: HashMap<String, (Option<String>, usize)> = HashMap::new();
        for entry in self.articles.iter() {
            let (_, raw) = entry?;
            let article = decode(&raw)?;
            if article.is_deleted {
                continue;
            }
            let slot = counts
                .entry(article.source.name.clone())
                .or_insert((article.source.id.clone(), 0));
            slot.1 += 1;
        }
        let mut out: Vec<SourceCount> = counts
            .into_iter()
            .map(|(name, (id, count))| SourceCount { id, name, count })
            .collect();
        out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        Ok(out)
    }

    pub fn stats(&self) -> StoreResult<StoreStats> {
        let day_ago = Utc::now() - Duration::hours(24);
        let mut stats = StoreStats {
            total_articles: 0,
            newsdata_articles: 0,
            newsapi_articles: 0,
            last_24h_articles: 0,
        };
        for entry in self.articles.iter() {
            let (_, raw) = entry?;
            let article = decode(&raw)?;
            if article.is_deleted {
                continue;
            }
            stats.total_articles += 1;
            match article.provider {
                ProviderTag::Newsdata => stats.newsdata_articles += 1,
                ProviderTag::Newsapi => stats.newsapi_articles += 1,
            }
            if article.published_at >= day_ago {
                stats.last_24h_articles += 1;
            }
        }
        Ok(stats)
    }

    /// Newest `fetched_at` among non-deleted records matching the filter.
    /// Drives the freshness check; None when nothing matches.
    pub fn latest_fetched_at(
        &self,
        filters: &QueryFilters,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let mut newest: Option<DateTime<Utc>> = None;
        for entry in self.articles.iter() {
            let (_, raw) = entry?;
            let article = decode(&raw)?;
            if article.is_deleted || !filters.matches(&article) {
                continue;
            }
            if newest.map_or(true, |t| article.fetched_at > t) {
                newest = Some(article.fetched_at);
            }
        }
        Ok(newest)
    }

    // ---- index plumbing ----

    fn find_by_index(
        &self,
        tree: &sled::Tree,
        values: &[String],
        page: PageOptions,
    ) -> StoreResult<(Vec<NewsArticle>, usize)> {
        // Merge the per-value ranges: each index key embeds the inverted
        // publish timestamp, so a BTreeMap over the ordering suffix gives
        // a newest-first merge with id-level dedup.
        let mut merged: BTreeMap<Vec<u8>, String> = BTreeMap::new();
        for value in values {
            let prefix = index_prefix(value);
            for entry in tree.scan_prefix(&prefix) {
                let (key, id) = entry?;
                let suffix = key[prefix.len()..].to_vec();
                merged.insert(suffix, String::from_utf8_lossy(&id).into_owned());
            }
        }

        let mut matched = Vec::new();
        let mut seen_ids = std::collections::HashSet::new();
        for id in merged.into_values() {
            if !seen_ids.insert(id.clone()) {
                continue;
            }
            if let Some(article) = self.load_indexed(id.as_bytes())? {
                if !article.is_deleted {
                    matched.push(article);
                }
            }
        }

        let total = matched.len();
        let records = matched
            .into_iter()
            .skip(page.skip())
            .take(page.limit)
            .collect();
        Ok((records, total))
    }

    fn load_indexed(&self, id: &[u8]) -> StoreResult<Option<NewsArticle>> {
        match self.articles.get(id)? {
            Some(raw) => Ok(Some(decode(&raw)?)),
            // Dangling index entry (record replaced concurrently): skip.
            None => Ok(None),
        }
    }

    fn insert_index_entries(&self, a: &NewsArticle) -> StoreResult<()> {
        let id = a.article_id.as_bytes();
        self.published_idx
            .insert(published_key(a.published_at, &a.article_id), id)?;
        for c in &a.category {
            self.category_idx
                .insert(value_key(c, a.published_at, &a.article_id), id)?;
        }
        for c in &a.country {
            self.country_idx
                .insert(value_key(c, a.published_at, &a.article_id), id)?;
        }
        Ok(())
    }

    fn remove_index_entries(&self, a: &NewsArticle) -> StoreResult<()> {
        self.published_idx
            .remove(published_key(a.published_at, &a.article_id))?;
        for c in &a.category {
            self.category_idx
                .remove(value_key(c, a.published_at, &a.article_id))?;
        }
        for c in &a.country {
            self.country_idx
                .remove(value_key(c, a.published_at, &a.article_id))?;
        }
        Ok(())
    }
}

fn decode(raw: &[u8]) -> StoreResult<NewsArticle> {
    Ok(bincode::deserialize(raw)?)
}

/// Big-endian inverted millis: lexicographic key order == newest first.
fn inverted_millis(ts: DateTime<Utc>) -> [u8; 8] {
    let millis = ts.timestamp_millis().max(0) as u64;
    (u64::MAX - millis).to_be_bytes()
}

fn published_key(ts: DateTime<Utc>, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + id.len());
    key.extend_from_slice(&inverted_millis(ts));
    key.extend_from_slice(id.as_bytes());
    key
}

fn index_prefix(value: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(value.len() + 1);
    key.extend_from_slice(value.to_ascii_lowercase().as_bytes());
    key.push(0);
    key
}

fn value_key(value: &str, ts: DateTime<Utc>, id: &str) -> Vec<u8> {
    let mut key = index_prefix(value);
    key.extend_from_slice(&inverted_millis(ts));
    key.extend_from_slice(id.as_bytes());
    key
}

fn tokenize(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Title hits weigh 3, description 2, content 1.
fn relevance_score(a: &NewsArticle, terms: &[String]) -> u32 {
    let title = a.title.to_lowercase();
    let description = a.description.to_lowercase();
    let content = a.content.to_lowercase();
    let mut score = 0u32;
    for term in terms {
        if title.contains(term.as_str()) {
            score += 3;
        }
        if description.contains(term.as_str()) {
            score += 2;
        }
        if content.contains(term.as_str()) {
            score += 1;
        }
    }
    score
}
