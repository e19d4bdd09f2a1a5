// src/article.rs
// Canonical article record shared by the ingest and read paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bounds applied by the normalizer before a record is committed.
pub const TITLE_MAX_CHARS: usize = 500;
pub const DESCRIPTION_MAX_CHARS: usize = 2_000;
pub const CONTENT_MAX_CHARS: usize = 20_000;

pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Which upstream produced a record. Used as the dedup-key prefix, so the
/// same URL fetched through both providers can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    Newsdata,
    Newsapi,
}

impl ProviderTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::Newsdata => "newsdata",
            ProviderTag::Newsapi => "newsapi",
        }
    }
}

impl std::fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publisher identity as reported upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: Option<String>,
    pub name: String,
}

/// One normalized news item, regardless of upstream origin.
///
/// `article_id` is derived as `<provider>_<native-id-or-url>` and is the
/// upsert key; a later fetch of the same story updates the stored record
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub article_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    pub url: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub source: SourceRef,
    pub author: Option<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub country: Vec<String>,
    pub language: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub provider: ProviderTag,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

impl NewsArticle {
    /// Storage-level validation: a record that fails here is reported in
    /// the bulk-upsert error list and never written.
    pub fn validate(&self) -> Result<(), String> {
        if self.article_id.is_empty() {
            return Err("empty article_id".into());
        }
        if self.title.trim().is_empty() {
            return Err("empty title".into());
        }
        if !is_http_url(&self.url) {
            return Err(format!("malformed url: {}", self.url));
        }
        if let Some(u) = &self.image_url {
            if !is_http_url(u) {
                return Err(format!("malformed image_url: {u}"));
            }
        }
        if let Some(u) = &self.video_url {
            if !is_http_url(u) {
                return Err(format!("malformed video_url: {u}"));
            }
        }
        Ok(())
    }

    pub fn matches_category(&self, wanted: &[String]) -> bool {
        set_intersects(&self.category, wanted)
    }

    pub fn matches_country(&self, wanted: &[String]) -> bool {
        set_intersects(&self.country, wanted)
    }
}

/// Membership filter: a record matches when its set intersects the query set.
fn set_intersects(have: &[String], wanted: &[String]) -> bool {
    wanted
        .iter()
        .any(|w| have.iter().any(|h| h.eq_ignore_ascii_case(w)))
}

/// Well-formed absolute http/https URL.
pub fn is_http_url(s: &str) -> bool {
    match url::Url::parse(s) {
        Ok(u) => matches!(u.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewsArticle {
        NewsArticle {
            article_id: "newsapi_https://example.com/a".into(),
            title: "Example".into(),
            description: String::new(),
            content: String::new(),
            url: "https://example.com/a".into(),
            image_url: None,
            video_url: None,
            published_at: Utc::now(),
            source: SourceRef {
                id: None,
                name: "Example".into(),
            },
            author: None,
            category: vec!["business".into()],
            country: vec!["us".into()],
            language: "en".into(),
            keywords: vec![],
            provider: ProviderTag::Newsapi,
            fetched_at: Utc::now(),
            is_deleted: false,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    #[test]
    fn validate_rejects_bad_urls() {
        let mut a = sample();
        assert!(a.validate().is_ok());
        a.url = "notaurl".into();
        assert!(a.validate().is_err());
        a.url = "ftp://example.com/x".into();
        assert!(a.validate().is_err());
    }

    #[test]
    fn category_match_is_case_insensitive_intersection() {
        let a = sample();
        assert!(a.matches_category(&["Business".into(), "tech".into()]));
        assert!(!a.matches_category(&["sports".into()]));
        assert!(a.matches_country(&["US".into()]));
    }
}
