// src/ingest/providers/newsapi.rs
// Provider B: NewsAPI-style top-headlines endpoint. Header API key,
// numeric page/pageSize pagination. The headline endpoint does not echo
// category/country per article; the normalizer takes them from the
// request context instead.

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;

use crate::article::ProviderTag;
use crate::ingest::types::{FetchParams, NewsProvider, ProviderError, RawArticle};

const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2";
const REQUEST_TIMEOUT_SECS: u64 = 15;
const PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsapiSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsapiArticle {
    #[serde(default)]
    pub source: NewsapiSource,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "urlToImage")]
    pub url_to_image: Option<String>,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsapiEnvelope {
    status: String,
    #[serde(default)]
    articles: Option<Vec<NewsapiArticle>>,
    code: Option<String>,
    message: Option<String>,
}

pub struct NewsapiClient {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        base_url: String,
        api_key: String,
        client: reqwest::Client,
    },
}

impl NewsapiClient {
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

        let envelope: NewsapiEnvelope =
            serde_json::from_str(body).map_err(|e| ProviderError::Decode {
                provider: ProviderTag::Newsapi,
                message: e.to_string(),
            })?;

        if envelope.status != "ok" {
            let message = match (envelope.code, envelope.message) {
                (Some(code), Some(msg)) => format!("{code}: {msg}"),
                (_, Some(msg)) => msg,
                (Some(code), None) => code,
                (None, None) => "status was not ok".to_string(),
            };
            return Err(ProviderError::Api {
                provider: ProviderTag::Newsapi,
                message,
            });
        }

        let out: Vec<RawArticle> = envelope
            .articles
            .unwrap_or_default()
            .into_iter()
            .map(RawArticle::Newsapi)
            .collect();

        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_articles_total", "provider" => "newsapi").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl NewsProvider for NewsapiClient {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Newsapi
    }

    async fn fetch(&self, params: &FetchParams) -> Result<Vec<RawArticle>, ProviderError> {
        match &self.mode {
            Mode::Fixture(body) => Self::parse_response(body),
            Mode::Http {
                base_url,
                api_key,
                client,
            } => {
                let mut query: Vec<(&str, String)> =
                    vec![("pageSize", PAGE_SIZE.to_string())];
                if let Some(q) = &params.query {
                    query.push(("q", q.clone()));
                }
                if let Some(c) = &params.category {
                    query.push(("category", c.clone()));
                }
                if let Some(c) = &params.country {
                    query.push(("country", c.clone()));
                }
                if let Some(page) = &params.page {
                    query.push(("page", page.clone()));
                }

                let response = client
                    .get(format!("{base_url}/top-headlines"))
                    .header("X-Api-Key", api_key)
                    .query(&query)
                    .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                    .send()
                    .await
                    .map_err(|e| ProviderError::Network {
                        provider: ProviderTag::Newsapi,
                        message: e.to_string(),
                    })?;

                let status = response.status();
                let body = response.text().await.map_err(|e| ProviderError::Network {
                    provider: ProviderTag::Newsapi,
                    message: e.to_string(),
                })?;

                if !status.is_success() {
                    counter!("ingest_provider_errors_total", "provider" => "newsapi")
                        .increment(1);
                    return Err(ProviderError::Http {
                        provider: ProviderTag::Newsapi,
                        status: status.as_u16(),
                    });
                }

                Self::parse_response(&body)
            }
        }
    }
}
