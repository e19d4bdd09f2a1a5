// src/ingest/mod.rs
pub mod config;
pub mod freshness;
pub mod providers;
pub mod scheduler;
pub mod types;

use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::article::{
    NewsArticle, ProviderTag, SourceRef, CONTENT_MAX_CHARS, CURRENT_SCHEMA_VERSION,
    DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS,
};
use crate::ingest::providers::{newsapi::NewsapiArticle, newsdata::NewsdataArticle};
use crate::ingest::types::{FetchParams, RawArticle};

/// One-time metrics registration (so series show up wherever the operator
/// wires an exporter).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_articles_total",
            "Raw articles parsed from provider responses."
        );
        describe_counter!(
            "ingest_rejected_total",
            "Raw articles dropped by required-field validation."
        );
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_counter!("ingest_slot_runs_total", "Slot executions started.");
        describe_counter!("ingest_articles_saved_total", "Records committed to the store.");
        describe_histogram!("ingest_parse_ms", "Provider response parse time in ms.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts of the last completed slot execution."
        );
    });
}

/// Why a raw article was not turned into a record. Rejections are dropped
/// from the batch, they never fail it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("missing title")]
    MissingTitle,
    #[error("missing url")]
    MissingUrl,
    #[error("unparseable published timestamp: {0:?}")]
    BadTimestamp(Option<String>),
}

/// Map one raw provider article onto the canonical record.
///
/// The dedup key is `<provider>_<native-id-or-url>`: the URL is the only
/// field both providers guarantee, and it is stable across re-fetches of
/// the same story.
pub fn normalize(raw: &RawArticle, ctx: &FetchParams) -> Result<NewsArticle, NormalizeError> {
    match raw {
        RawArticle::Newsdata(a) => normalize_newsdata(a, ctx),
        RawArticle::Newsapi(a) => normalize_newsapi(a, ctx),
    }
}

/// Normalize a whole fetch batch, dropping rejects. Returns the records
/// plus the reject count for telemetry.
pub fn normalize_batch(raws: &[RawArticle], ctx: &FetchParams) -> (Vec<NewsArticle>, usize) {
    let mut out = Vec::with_capacity(raws.len());
    let mut rejected = 0usize;
    for raw in raws {
        match normalize(raw, ctx) {
            Ok(record) => out.push(record),
            Err(e) => {
                rejected += 1;
                tracing::debug!(provider = %raw.provider(), error = %e, "raw article rejected");
            }
        }
    }
    if rejected > 0 {
        counter!("ingest_rejected_total").increment(rejected as u64);
    }
    (out, rejected)
}

fn normalize_newsdata(
    a: &NewsdataArticle,
    ctx: &FetchParams,
) -> Result<NewsArticle, NormalizeError> {
    let title = clean_text(a.title.as_deref().unwrap_or_default(), TITLE_MAX_CHARS);
    if title.is_empty() {
        return Err(NormalizeError::MissingTitle);
    }
    let url = a
        .link
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(NormalizeError::MissingUrl)?
        .to_string();
    let published_at = parse_timestamp(a.pub_date.as_deref())
        .ok_or_else(|| NormalizeError::BadTimestamp(a.pub_date.clone()))?;

    let native_id = a.article_id.as_deref().filter(|s| !s.is_empty());
    let article_id = derive_article_id(ProviderTag::Newsdata, native_id, &url);

    Ok(NewsArticle {
        article_id,
        title,
        description: clean_text(
            a.description.as_deref().unwrap_or_default(),
            DESCRIPTION_MAX_CHARS,
        ),
        content: clean_text(a.content.as_deref().unwrap_or_default(), CONTENT_MAX_CHARS),
        url,
        image_url: a.image_url.clone().filter(|u| !u.is_empty()),
        video_url: a.video_url.clone().filter(|u| !u.is_empty()),
        published_at,
        source: SourceRef {
            id: a.source_id.clone(),
            name: a
                .source_name
                .clone()
                .or_else(|| a.source_id.clone())
                .unwrap_or_else(|| "unknown".to_string()),
        },
        author: a
            .creator
            .as_ref()
            .and_then(|c| c.first().cloned())
            .filter(|s| !s.is_empty()),
        // Provider A reports category/country per article.
        category: dedup_set(a.category.iter()),
        country: dedup_set(a.country.iter()),
        language: a
            .language
            .clone()
            .or_else(|| ctx.language.clone())
            .unwrap_or_else(|| "en".to_string()),
        keywords: dedup_set(a.keywords.iter().flatten()),
        provider: ProviderTag::Newsdata,
        fetched_at: Utc::now(),
        is_deleted: false,
        schema_version: CURRENT_SCHEMA_VERSION,
    })
}

fn normalize_newsapi(
    a: &NewsapiArticle,
    ctx: &FetchParams,
) -> Result<NewsArticle, NormalizeError> {
    let title = clean_text(a.title.as_deref().unwrap_or_default(), TITLE_MAX_CHARS);
    if title.is_empty() {
        return Err(NormalizeError::MissingTitle);
    }
    let url = a
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(NormalizeError::MissingUrl)?
        .to_string();
    let published_at = parse_timestamp(a.published_at.as_deref())
        .ok_or_else(|| NormalizeError::BadTimestamp(a.published_at.clone()))?;

    // No native article id on this wire; the URL carries the dedup key.
    let article_id = derive_article_id(ProviderTag::Newsapi, None, &url);

    Ok(NewsArticle {
        article_id,
        title,
        description: clean_text(
            a.description.as_deref().unwrap_or_default(),
            DESCRIPTION_MAX_CHARS,
        ),
        content: clean_text(a.content.as_deref().unwrap_or_default(), CONTENT_MAX_CHARS),
        url,
        image_url: a.url_to_image.clone().filter(|u| !u.is_empty()),
        video_url: None,
        published_at,
        source: SourceRef {
            id: a.source.id.clone(),
            name: a
                .source
                .name
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        },
        author: a.author.clone().filter(|s| !s.is_empty()),
        // The headline endpoint omits category/country per article; they
        // come from the request context that produced this fetch.
        category: dedup_set(ctx.category.iter()),
        country: dedup_set(ctx.country.iter()),
        language: ctx.language.clone().unwrap_or_else(|| "en".to_string()),
        keywords: Vec::new(),
        provider: ProviderTag::Newsapi,
        fetched_at: Utc::now(),
        is_deleted: false,
        schema_version: CURRENT_SCHEMA_VERSION,
    })
}

pub fn derive_article_id(tag: ProviderTag, native_id: Option<&str>, url: &str) -> String {
    format!("{}_{}", tag.as_str(), native_id.unwrap_or(url))
}

/// Strip markup, collapse whitespace, cap length.
pub fn clean_text(s: &str, max_chars: usize) -> String {
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());

    let mut out = re_tags.replace_all(s, " ").to_string();
    out = re_ws.replace_all(&out, " ").trim().to_string();
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }
    out
}

/// Accepts RFC 3339 ("2024-01-15T10:30:00Z") and the space-separated
/// variant provider A emits ("2024-01-15 10:30:00", UTC implied).
pub fn parse_timestamp(s: Option<&str>) -> Option<DateTime<Utc>> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn dedup_set<'a>(values: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut set: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
    for v in values {
        let t = v.trim().to_lowercase();
        if !t.is_empty() {
            set.insert(t);
        }
    }
    set.into_iter().collect()
}
