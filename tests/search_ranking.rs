// tests/search_ranking.rs
use chrono::{Duration, Utc};
use newsgrid::article::{NewsArticle, ProviderTag, SourceRef};
use newsgrid::store::{ArticleStore, PageOptions};

fn article(id: &str, title: &str, description: &str, content: &str, hours_ago: i64) -> NewsArticle {
    NewsArticle {
        article_id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        content: content.to_string(),
        url: format!("https://example.com/{id}"),
        image_url: None,
        video_url: None,
        published_at: Utc::now() - Duration::hours(hours_ago),
        source: SourceRef {
            id: None,
            name: "Example Wire".into(),
        },
        author: None,
        category: vec![],
        country: vec![],
        language: "en".into(),
        keywords: vec![],
        provider: ProviderTag::Newsapi,
        fetched_at: Utc::now(),
        is_deleted: false,
        schema_version: 1,
    }
}

#[test]
fn title_match_outranks_newer_body_matches() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArticleStore::open(dir.path().join("db")).unwrap();
    store
        .bulk_upsert(&[
            // Newest, but the term only appears in content.
            article("newsapi_c", "Unrelated headline", "", "quantum computing advances", 1),
            // Oldest, term in the title: must rank first.
            article("newsapi_t", "Quantum breakthrough announced", "", "", 20),
            // Middle, term in description.
            article("newsapi_d", "Another headline", "a quantum result", "", 5),
        ])
        .unwrap();

    let (records, total) = store
        .search_full_text("quantum", PageOptions { page: 1, limit: 10 })
        .unwrap();
    assert_eq!(total, 3);
    let ids: Vec<_> = records.iter().map(|a| a.article_id.as_str()).collect();
    assert_eq!(ids, vec!["newsapi_t", "newsapi_d", "newsapi_c"]);
}

#[test]
fn equal_relevance_ties_break_by_publish_time() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArticleStore::open(dir.path().join("db")).unwrap();
    store
        .bulk_upsert(&[
            article("newsapi_old", "Solar farm opens", "", "", 10),
            article("newsapi_new", "Solar prices drop", "", "", 1),
        ])
        .unwrap();

    let (records, _) = store
        .search_full_text("solar", PageOptions { page: 1, limit: 10 })
        .unwrap();
    assert_eq!(records[0].article_id, "newsapi_new");
    assert_eq!(records[1].article_id, "newsapi_old");
}

#[test]
fn multi_term_queries_accumulate_scores() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArticleStore::open(dir.path().join("db")).unwrap();
    store
        .bulk_upsert(&[
            article("newsapi_both", "Rates and markets", "", "", 5),
            article("newsapi_one", "Markets wobble", "", "", 1),
            article("newsapi_none", "Weather report", "", "", 1),
        ])
        .unwrap();

    let (records, total) = store
        .search_full_text("rates markets", PageOptions { page: 1, limit: 10 })
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(records[0].article_id, "newsapi_both");
}
