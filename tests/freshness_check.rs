// tests/freshness_check.rs
use chrono::{Duration, Utc};
use newsgrid::article::{NewsArticle, ProviderTag, SourceRef};
use newsgrid::ingest::config::AppConfig;
use newsgrid::ingest::freshness::{check_freshness, estimate_for_slots};
use newsgrid::store::{ArticleStore, QueryFilters};

fn fetched_minutes_ago(id: &str, minutes: i64) -> NewsArticle {
    NewsArticle {
        article_id: id.to_string(),
        title: "Cached story".into(),
        description: String::new(),
        content: String::new(),
        url: format!("https://example.com/{id}"),
        image_url: None,
        video_url: None,
        published_at: Utc::now() - Duration::hours(2),
        source: SourceRef {
            id: None,
            name: "Example Wire".into(),
        },
        author: None,
        category: vec!["business".into()],
        country: vec!["us".into()],
        language: "en".into(),
        keywords: vec![],
        provider: ProviderTag::Newsdata,
        fetched_at: Utc::now() - Duration::minutes(minutes),
        is_deleted: false,
        schema_version: 1,
    }
}

fn business_filter() -> QueryFilters {
    QueryFilters {
        category: Some("business".into()),
        ..QueryFilters::default()
    }
}

#[test]
fn recently_fetched_filter_is_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArticleStore::open(dir.path().join("db")).unwrap();
    store
        .bulk_upsert(&[fetched_minutes_ago("newsdata_fresh", 10)])
        .unwrap();

    let check = check_freshness(&store, &business_filter(), 30).unwrap();
    assert!(check.fresh);
    assert_eq!(check.age_minutes, Some(10));
}

#[test]
fn expired_filter_is_stale() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArticleStore::open(dir.path().join("db")).unwrap();
    store
        .bulk_upsert(&[fetched_minutes_ago("newsdata_stale", 40)])
        .unwrap();

    let check = check_freshness(&store, &business_filter(), 30).unwrap();
    assert!(!check.fresh);
    assert_eq!(check.age_minutes, Some(40));
}

#[test]
fn unmatched_filter_is_stale_with_no_age() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArticleStore::open(dir.path().join("db")).unwrap();
    store
        .bulk_upsert(&[fetched_minutes_ago("newsdata_other", 5)])
        .unwrap();

    let sports = QueryFilters {
        category: Some("sports".into()),
        ..QueryFilters::default()
    };
    let check = check_freshness(&store, &sports, 30).unwrap();
    assert!(!check.fresh);
    assert_eq!(check.age_minutes, None);
}

#[test]
fn default_slot_plan_stays_inside_the_daily_budgets() {
    let cfg = AppConfig::default();
    let est = estimate_for_slots(&cfg.slots, cfg.newsdata_daily_limit, cfg.newsapi_daily_limit);
    assert!(est.within_budget());
    assert!(est.newsdata_requests_per_day > 0);
    assert!(est.newsapi_requests_per_day > 0);
}
