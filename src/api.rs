// src/api.rs
// Thin HTTP surface: request parsing and response envelopes only. All
// read queries go through ReadService, all control operations through
// the scheduler.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::ingest::config::AppConfig;
use crate::ingest::freshness::{self, CreditEstimate, FreshnessCheck};
use crate::ingest::scheduler::{IngestScheduler, IngestStats, SchedulerError, SlotStatus};
use crate::ingest::types::FetchParams;
use crate::read::{PagedArticles, ReadService};
use crate::store::{ArticleStore, QueryFilters, StoreError, UpsertReport};

#[derive(Clone)]
pub struct AppState {
    pub read: ReadService,
    pub scheduler: IngestScheduler,
    pub store: Arc<ArticleStore>,
    pub config: Arc<AppConfig>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/news/latest", get(latest))
        .route("/api/news/search", get(search))
        .route("/api/news/trending", get(trending))
        .route("/api/news/category/{name}", get(by_category))
        .route("/api/news/country/{code}", get(by_country))
        .route("/api/news/sources", get(sources))
        .route("/api/news/stats", get(stats))
        .route("/api/cache/freshness", get(cache_freshness))
        .route("/api/cache/refresh", post(refresh))
        .route("/api/scheduler/status", get(scheduler_status))
        .route("/api/scheduler/start", post(scheduler_start))
        .route("/api/scheduler/stop", post(scheduler_stop))
        .route("/api/scheduler/trigger/{slot}", post(scheduler_trigger))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(_) => ApiError(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            StoreError::Codec(_) => ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        ApiError(StatusCode::NOT_FOUND, e.to_string())
    }
}

#[derive(Deserialize)]
struct ListQuery {
    country: Option<String>,
    category: Option<String>,
    language: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

impl ListQuery {
    fn filters(&self) -> QueryFilters {
        QueryFilters {
            category: self.category.clone(),
            country: self.country.clone(),
            language: self.language.clone(),
        }
    }
}

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<usize>,
    limit: Option<usize>,
}

async fn latest(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<PagedArticles>, ApiError> {
    Ok(Json(state.read.latest(q.filters(), q.page, q.limit)?))
}

async fn search(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<PagedArticles>, ApiError> {
    let query = q
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError(StatusCode::BAD_REQUEST, "missing query parameter q".into()))?;
    Ok(Json(state.read.search(query, q.page, q.limit)?))
}

async fn trending(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let records = state.read.trending(q.limit)?;
    Ok(Json(json!({ "records": records })))
}

async fn by_category(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(q): Query<PageQuery>,
) -> Result<Json<PagedArticles>, ApiError> {
    Ok(Json(state.read.by_category(vec![name], q.page, q.limit)?))
}

async fn by_country(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(q): Query<PageQuery>,
) -> Result<Json<PagedArticles>, ApiError> {
    Ok(Json(state.read.by_country(vec![code], q.page, q.limit)?))
}

async fn sources(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let sources = state.read.sources()?;
    Ok(Json(json!({ "sources": sources })))
}

async fn stats(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let stats = state.read.stats()?;
    Ok(Json(serde_json::to_value(stats).unwrap_or_default()))
}

async fn cache_freshness(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<FreshnessCheck>, ApiError> {
    let check = freshness::check_freshness(
        &state.store,
        &q.filters(),
        state.config.cache_expiry_minutes,
    )?;
    Ok(Json(check))
}

/// Ad-hoc synchronous fetch-and-commit, outside the slot system.
async fn refresh(
    State(state): State<AppState>,
    Json(params): Json<FetchParams>,
) -> Result<Json<UpsertReport>, ApiError> {
    let report = state.scheduler.refresh_now(params).await?;
    Ok(Json(report))
}

#[derive(Serialize)]
struct SchedulerStatusResponse {
    running: bool,
    slots: Vec<SlotStatus>,
    stats: IngestStats,
    credits: CreditEstimate,
}

async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatusResponse> {
    Json(SchedulerStatusResponse {
        running: state.scheduler.is_running(),
        slots: state.scheduler.slot_statuses(),
        stats: state.scheduler.stats_snapshot(),
        credits: freshness::estimate_daily_credits(&state.config),
    })
}

async fn scheduler_start(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.scheduler.start();
    Json(json!({ "running": true }))
}

async fn scheduler_stop(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.scheduler.stop();
    Json(json!({ "running": false }))
}

/// Fire-and-forget: acknowledges immediately, execution proceeds in the
/// background. Poll /api/scheduler/status for the outcome.
async fn scheduler_trigger(
    State(state): State<AppState>,
    Path(slot): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.scheduler.trigger_manual(&slot)?;
    Ok(Json(json!({ "triggered": slot })))
}
