// src/ingest/types.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::article::ProviderTag;
use crate::ingest::providers::{newsapi::NewsapiArticle, newsdata::NewsdataArticle};

/// Abstract filter bag shared by both upstream clients. Each client maps
/// these onto its own wire parameters (token-based vs numeric paging,
/// differing query-param names).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchParams {
    pub query: Option<String>,
    pub category: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    /// Opaque page cursor: a continuation token for provider A, a numeric
    /// page for provider B. Callers treat it as a black box.
    pub page: Option<String>,
}

impl FetchParams {
    pub fn for_slot(category: &str, country: &str, language: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            country: Some(country.to_string()),
            language: Some(language.to_string()),
            ..Self::default()
        }
    }

    /// Compact rendering for logs and error attribution.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(q) = &self.query {
            parts.push(format!("q={q}"));
        }
        if let Some(c) = &self.category {
            parts.push(format!("category={c}"));
        }
        if let Some(c) = &self.country {
            parts.push(format!("country={c}"));
        }
        if let Some(l) = &self.language {
            parts.push(format!("language={l}"));
        }
        if parts.is_empty() {
            "unfiltered".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// Raw article exactly as one provider returned it, before normalization.
/// Explicit tagged variants so field mapping stays exhaustive instead of
/// dictionary-poking.
#[derive(Debug, Clone)]
pub enum RawArticle {
    Newsdata(NewsdataArticle),
    Newsapi(NewsapiArticle),
}

impl RawArticle {
    pub fn provider(&self) -> ProviderTag {
        match self {
            RawArticle::Newsdata(_) => ProviderTag::Newsdata,
            RawArticle::Newsapi(_) => ProviderTag::Newsapi,
        }
    }
}

/// Typed failure surfaced by an upstream client. Never leaves the
/// scheduler boundary except as aggregate counters.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} returned HTTP {status}")]
    Http { provider: ProviderTag, status: u16 },

    #[error("{provider} network failure: {message}")]
    Network {
        provider: ProviderTag,
        message: String,
    },

    #[error("{provider} response decode failed: {message}")]
    Decode {
        provider: ProviderTag,
        message: String,
    },

    #[error("{provider} api error: {message}")]
    Api {
        provider: ProviderTag,
        message: String,
    },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderTag {
        match self {
            ProviderError::Http { provider, .. }
            | ProviderError::Network { provider, .. }
            | ProviderError::Decode { provider, .. }
            | ProviderError::Api { provider, .. } => *provider,
        }
    }
}

/// Upstream client seam. One implementation per provider, plus test
/// doubles in the integration suite.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    fn tag(&self) -> ProviderTag;
    async fn fetch(&self, params: &FetchParams) -> Result<Vec<RawArticle>, ProviderError>;
}
