// tests/normalize.rs
use newsgrid::article::ProviderTag;
use newsgrid::ingest::providers::newsapi::NewsapiArticle;
use newsgrid::ingest::providers::newsdata::NewsdataArticle;
use newsgrid::ingest::types::{FetchParams, RawArticle};
use newsgrid::ingest::{normalize, normalize_batch, NormalizeError};

fn newsdata_raw(native_id: Option<&str>, url: &str) -> RawArticle {
    RawArticle::Newsdata(NewsdataArticle {
        article_id: native_id.map(str::to_string),
        title: Some("A perfectly fine title".into()),
        link: Some(url.to_string()),
        pub_date: Some("2024-05-01 08:30:00".into()),
        source_id: Some("examplewire".into()),
        source_name: Some("Example Wire".into()),
        language: Some("en".into()),
        country: vec!["us".into()],
        category: vec!["business".into()],
        ..NewsdataArticle::default()
    })
}

fn newsapi_raw(url: &str) -> RawArticle {
    RawArticle::Newsapi(NewsapiArticle {
        title: Some("A headline".into()),
        url: Some(url.to_string()),
        published_at: Some("2024-05-01T09:45:00Z".into()),
        ..NewsapiArticle::default()
    })
}

#[test]
fn same_native_id_yields_same_article_id() {
    let ctx = FetchParams::default();
    let a = normalize(&newsdata_raw(Some("nd-1"), "https://x.com/a"), &ctx).unwrap();
    let b = normalize(&newsdata_raw(Some("nd-1"), "https://x.com/other-url"), &ctx).unwrap();
    assert_eq!(a.article_id, b.article_id);
    assert_eq!(a.article_id, "newsdata_nd-1");
}

#[test]
fn url_is_the_fallback_dedup_key() {
    let ctx = FetchParams::default();
    let a = normalize(&newsdata_raw(None, "https://x.com/a"), &ctx).unwrap();
    let b = normalize(&newsdata_raw(None, "https://x.com/a"), &ctx).unwrap();
    assert_eq!(a.article_id, b.article_id);
}

#[test]
fn identical_urls_from_different_providers_never_collide() {
    let ctx = FetchParams::for_slot("business", "us", "en");
    let a = normalize(&newsdata_raw(None, "https://x.com/same"), &ctx).unwrap();
    let b = normalize(&newsapi_raw("https://x.com/same"), &ctx).unwrap();
    assert_ne!(a.article_id, b.article_id);
    assert!(a.article_id.starts_with("newsdata_"));
    assert!(b.article_id.starts_with("newsapi_"));
}

#[test]
fn missing_required_fields_are_rejected() {
    let ctx = FetchParams::default();

    let mut no_title = newsdata_raw(Some("nd-2"), "https://x.com/b");
    if let RawArticle::Newsdata(a) = &mut no_title {
        a.title = None;
    }
    assert_eq!(normalize(&no_title, &ctx), Err(NormalizeError::MissingTitle));

    let mut no_url = newsdata_raw(Some("nd-3"), "https://x.com/c");
    if let RawArticle::Newsdata(a) = &mut no_url {
        a.link = None;
    }
    assert_eq!(normalize(&no_url, &ctx), Err(NormalizeError::MissingUrl));

    let mut bad_date = newsapi_raw("https://x.com/d");
    if let RawArticle::Newsapi(a) = &mut bad_date {
        a.published_at = Some("not-a-date".into());
    }
    assert!(matches!(
        normalize(&bad_date, &ctx),
        Err(NormalizeError::BadTimestamp(_))
    ));
}

#[test]
fn provider_b_takes_category_and_country_from_request_context() {
    let ctx = FetchParams::for_slot("Technology", "US", "en");
    let record = normalize(&newsapi_raw("https://x.com/ctx"), &ctx).unwrap();
    assert_eq!(record.category, vec!["technology"]);
    assert_eq!(record.country, vec!["us"]);
    assert_eq!(record.language, "en");
    assert_eq!(record.provider, ProviderTag::Newsapi);
}

#[test]
fn provider_a_keeps_its_per_article_category_and_country() {
    // Context says sports/gb; the article body wins for provider A.
    let ctx = FetchParams::for_slot("sports", "gb", "en");
    let record = normalize(&newsdata_raw(Some("nd-4"), "https://x.com/e"), &ctx).unwrap();
    assert_eq!(record.category, vec!["business"]);
    assert_eq!(record.country, vec!["us"]);
}

#[test]
fn batch_drops_rejects_and_keeps_the_rest() {
    let ctx = FetchParams::for_slot("business", "us", "en");
    let mut no_title = newsapi_raw("https://x.com/f");
    if let RawArticle::Newsapi(a) = &mut no_title {
        a.title = Some("   ".into());
    }
    let raws = vec![
        newsdata_raw(Some("nd-5"), "https://x.com/g"),
        no_title,
        newsapi_raw("https://x.com/h"),
    ];
    let (records, rejected) = normalize_batch(&raws, &ctx);
    assert_eq!(records.len(), 2);
    assert_eq!(rejected, 1);
}
