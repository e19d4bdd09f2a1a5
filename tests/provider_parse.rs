// tests/provider_parse.rs
use newsgrid::article::ProviderTag;
use newsgrid::ingest::providers::newsapi::NewsapiClient;
use newsgrid::ingest::providers::newsdata::NewsdataClient;
use newsgrid::ingest::types::{FetchParams, NewsProvider, ProviderError, RawArticle};
use newsgrid::ingest::{normalize, normalize_batch};

#[tokio::test]
async fn newsdata_fixture_parses_and_normalizes() {
    let body = include_str!("fixtures/newsdata_latest.json");
    let client = NewsdataClient::from_fixture(body);

    let raw = client.fetch(&FetchParams::default()).await.unwrap();
    assert_eq!(raw.len(), 3);

    // The untitled third item falls out at normalization.
    let (records, rejected) = normalize_batch(&raw, &FetchParams::default());
    assert_eq!(records.len(), 2);
    assert_eq!(rejected, 1);

    let first = &records[0];
    assert_eq!(first.article_id, "newsdata_nd-1001");
    assert_eq!(first.provider, ProviderTag::Newsdata);
    assert_eq!(first.source.name, "Example Wire");
    assert_eq!(first.author.as_deref(), Some("A. Reporter"));
    assert_eq!(first.category, vec!["business"]);
    assert_eq!(first.keywords, vec!["markets", "rates"]);
    assert!(first.image_url.is_some());
}

#[tokio::test]
async fn newsapi_fixture_parses_and_normalizes_with_context() {
    let body = include_str!("fixtures/newsapi_headlines.json");
    let client = NewsapiClient::from_fixture(body);

    let ctx = FetchParams::for_slot("general", "us", "en");
    let raw = client.fetch(&ctx).await.unwrap();
    assert_eq!(raw.len(), 2);

    let record = normalize(&raw[0], &ctx).unwrap();
    assert_eq!(record.article_id, "newsapi_https://times.example.com/budget");
    assert_eq!(record.source.id.as_deref(), Some("example-times"));
    // Headline wire has no category/country; the slot context fills them.
    assert_eq!(record.category, vec!["general"]);
    assert_eq!(record.country, vec!["us"]);
    // Upstream truncation marker is carried through as-is.
    assert!(record.content.contains("[+1234 chars]"));

    // The second item has an unparseable timestamp.
    assert!(normalize(&raw[1], &ctx).is_err());
}

#[tokio::test]
async fn newsapi_error_envelope_is_a_typed_api_failure() {
    let body = include_str!("fixtures/newsapi_error.json");
    let client = NewsapiClient::from_fixture(body);

    let err = client.fetch(&FetchParams::default()).await.unwrap_err();
    match err {
        ProviderError::Api { provider, message } => {
            assert_eq!(provider, ProviderTag::Newsapi);
            assert!(message.contains("apiKeyInvalid"));
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[test]
fn newsdata_error_status_is_a_typed_api_failure() {
    let body = r#"{"status":"error","results":{"message":"API key missing","code":"Unauthorized"}}"#;
    let err = NewsdataClient::parse_response(body).unwrap_err();
    match err {
        ProviderError::Api { provider, message } => {
            assert_eq!(provider, ProviderTag::Newsdata);
            assert!(message.contains("API key missing"));
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[test]
fn garbage_body_is_a_decode_failure() {
    let err = NewsdataClient::parse_response("<html>not json</html>").unwrap_err();
    assert!(matches!(err, ProviderError::Decode { .. }));

    let err = NewsapiClient::parse_response("{}").unwrap_err();
    // Envelope without a status string is an api-shape failure, not a panic.
    assert!(matches!(
        err,
        ProviderError::Api { .. } | ProviderError::Decode { .. }
    ));
}

#[test]
fn raw_article_carries_its_provider_tag() {
    let body = include_str!("fixtures/newsdata_latest.json");
    let raw = NewsdataClient::parse_response(body).unwrap();
    assert!(raw.iter().all(|r| matches!(r, RawArticle::Newsdata(_))));
    assert!(raw.iter().all(|r| r.provider() == ProviderTag::Newsdata));
}
