// src/ingest/providers/newsdata.rs
// Provider A: NewsData-style latest-news endpoint. Query-param API key,
// opaque `nextPage` continuation token, per-article category/country.

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::article::ProviderTag;
use crate::ingest::types::{FetchParams, NewsProvider, ProviderError, RawArticle};

const DEFAULT_BASE_URL: &str = "https://newsdata.io/api/1";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// One article exactly as the wire returns it. All fields optional; the
/// normalizer decides what is acceptable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsdataArticle {
    pub article_id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub source_id: Option<String>,
    pub source_name: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub country: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub creator: Option<Vec<String>>,
}

pub struct NewsdataClient {
    mode: Mode,
}

enum Mode {
    /// Canned response body, for tests and offline runs.
    Fixture(String),
    Http {
        base_url: String,
        api_key: String,
        client: reqwest::Client,
    },
}

impl NewsdataClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            mode: Mode::Http {
                base_url: base_url.into(),
                api_key: api_key.into(),
                client: reqwest::Client::new(),
            },
        }
    }

    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn parse_response(body: &str) -> Result<Vec<RawArticle>, ProviderError> {
        let t0 = std::time::Instant::now();

        let value: serde_json::Value =
            serde_json::from_str(body).map_err(|e| ProviderError::Decode {
                provider: ProviderTag::Newsdata,
                message: e.to_string(),
            })?;

        let status = value.get("status").and_then(|s| s.as_str()).unwrap_or("");
        if status != "success" {
            // Error envelopes carry the diagnostic under results.message.
            let message = value
                .pointer("/results/message")
                .and_then(|m| m.as_str())
                .unwrap_or("status was not success")
                .to_string();
            return Err(ProviderError::Api {
                provider: ProviderTag::Newsdata,
                message,
            });
        }

        let articles: Vec<NewsdataArticle> = match value.get("results") {
            Some(results) if results.is_array() => serde_json::from_value(results.clone())
                .map_err(|e| ProviderError::Decode {
                    provider: ProviderTag::Newsdata,
                    message: e.to_string(),
                })?,
            _ => Vec::new(),
        };
        let out: Vec<RawArticle> = articles.into_iter().map(RawArticle::Newsdata).collect();

        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_articles_total", "provider" => "newsdata").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl NewsProvider for NewsdataClient {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Newsdata
    }

    async fn fetch(&self, params: &FetchParams) -> Result<Vec<RawArticle>, ProviderError> {
        match &self.mode {
            Mode::Fixture(body) => Self::parse_response(body),
            Mode::Http {
                base_url,
                api_key,
                client,
            } => {
                let mut query: Vec<(&str, String)> = vec![("apikey", api_key.clone())];
                if let Some(q) = &params.query {
                    query.push(("q", q.clone()));
                }
                if let Some(c) = &params.category {
                    query.push(("category", c.clone()));
                }
                if let Some(c) = &params.country {
                    query.push(("country", c.clone()));
                }
                if let Some(l) = &params.language {
                    query.push(("language", l.clone()));
                }
                if let Some(token) = &params.page {
                    query.push(("page", token.clone()));
                }

                let response = client
                    .get(format!("{base_url}/latest"))
                    .query(&query)
                    .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                    .send()
                    .await
                    .map_err(|e| ProviderError::Network {
                        provider: ProviderTag::Newsdata,
                        message: e.to_string(),
                    })?;

                let status = response.status();
                let body = response.text().await.map_err(|e| ProviderError::Network {
                    provider: ProviderTag::Newsdata,
                    message: e.to_string(),
                })?;

                if !status.is_success() {
                    counter!("ingest_provider_errors_total", "provider" => "newsdata")
                        .increment(1);
                    return Err(ProviderError::Http {
                        provider: ProviderTag::Newsdata,
                        status: status.as_u16(),
                    });
                }

                Self::parse_response(&body)
            }
        }
    }
}
