//! newsgrid — Binary Entrypoint
//! Boots the Axum HTTP server and the ingestion scheduler: upstream news
//! APIs are pulled on a fixed daily timetable into the embedded store,
//! and every client read is answered from that store alone.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsgrid::api::{self, AppState};
use newsgrid::ingest::config::{self, AppConfig};
use newsgrid::ingest::providers::{newsapi::NewsapiClient, newsdata::NewsdataClient};
use newsgrid::ingest::scheduler::IngestScheduler;
use newsgrid::ingest::types::NewsProvider;
use newsgrid::read::ReadService;
use newsgrid::store::ArticleStore;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newsgrid=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Arc::new(AppConfig::load_default().context("loading configuration")?);
    let store = Arc::new(ArticleStore::open(&config.db_path).context("opening article store")?);

    let keys = config::api_keys_from_env();
    if keys.newsdata.is_none() {
        tracing::warn!("NEWSDATA_API_KEY not set; provider A fetches will fail and be skipped");
    }
    if keys.newsapi.is_none() {
        tracing::warn!("NEWSAPI_API_KEY not set; provider B fetches will fail and be skipped");
    }
    let provider_a: Arc<dyn NewsProvider> =
        Arc::new(NewsdataClient::new(keys.newsdata.unwrap_or_default()));
    let provider_b: Arc<dyn NewsProvider> =
        Arc::new(NewsapiClient::new(keys.newsapi.unwrap_or_default()));

    let scheduler = IngestScheduler::new(
        Arc::clone(&store),
        provider_a,
        provider_b,
        config.slots.clone(),
    );
    scheduler.start();

    let state = AppState {
        read: ReadService::new(Arc::clone(&store)),
        scheduler: scheduler.clone(),
        store,
        config: Arc::clone(&config),
    };
    let router = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "newsgrid listening");
    axum::serve(listener, router).await.context("serving http")?;

    Ok(())
}
