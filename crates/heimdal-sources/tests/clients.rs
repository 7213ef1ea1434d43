//! Integration tests for the source clients using wiremock HTTP mocks.

use std::time::Duration;

use heimdal_core::Secret;
use heimdal_sources::{
    FacebookClient, GoogleTrendsClient, SourceError, TikTokClient, TwitterClient,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ---------------------------------------------------------------------------
// Twitter
// ---------------------------------------------------------------------------

fn twitter(base_url: &str) -> TwitterClient {
    TwitterClient::with_base_url(Secret::new("test-bearer"), 5, base_url)
        .expect("client construction should not fail")
}

#[tokio::test]
async fn twitter_trends_are_parsed_and_malformed_items_counted() {
    let server = MockServer::start().await;
    let body = serde_json::json!([{
        "trends": [
            {"name": "#RustLang", "url": "http://twitter.com/search?q=%23RustLang", "tweet_volume": 12000},
            {"name": "Ferris", "tweet_volume": null},
            {"tweet_volume": 5}
        ],
        "as_of": "2026-10-18T00:00:00Z",
        "locations": [{"name": "Worldwide", "woeid": 1}]
    }]);

    Mock::given(method("GET"))
        .and(path("/1.1/trends/place.json"))
        .and(query_param("id", "1"))
        .and(header("authorization", "Bearer test-bearer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let fetched = twitter(&server.uri())
        .fetch_place_trends(1)
        .await
        .expect("should parse trends");

    assert_eq!(fetched.items.len(), 2);
    assert_eq!(fetched.items[0].name, "#RustLang");
    assert_eq!(fetched.items[0].tweet_volume, Some(12_000));
    assert_eq!(fetched.items[1].tweet_volume, None);
    assert_eq!(fetched.malformed, 1);
}

#[tokio::test]
async fn twitter_401_maps_to_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"errors\":[]}"))
        .mount(&server)
        .await;

    let err = twitter(&server.uri()).fetch_place_trends(1).await.unwrap_err();
    assert!(matches!(err, SourceError::Auth { status: 401, .. }), "got {err:?}");
}

#[tokio::test]
async fn twitter_5xx_maps_to_upstream_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("over capacity"))
        .mount(&server)
        .await;

    let err = twitter(&server.uri()).fetch_place_trends(1).await.unwrap_err();
    match err {
        SourceError::Upstream { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "over capacity");
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_upstream_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = TwitterClient::with_base_url(Secret::new("t"), 1, &server.uri()).unwrap();
    let err = client.fetch_place_trends(1).await.unwrap_err();
    assert!(matches!(err, SourceError::Timeout { .. }), "got {err:?}");
    assert!(err.is_transient());
}

// ---------------------------------------------------------------------------
// Facebook
// ---------------------------------------------------------------------------

fn facebook(base_url: &str) -> FacebookClient {
    FacebookClient::with_base_url(Secret::new("fb-token"), 5, base_url)
        .expect("client construction should not fail")
}

#[tokio::test]
async fn facebook_follows_paging_next() {
    let server = MockServer::start().await;
    let next = format!("{}/v19.0/meta/posts?after=CURSOR2&access_token=fb-token", server.uri());

    Mock::given(method("GET"))
        .and(path("/v19.0/meta/posts"))
        .and(query_param("after", "CURSOR2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "3", "message": "third"}],
            "paging": {}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v19.0/meta/posts"))
        .and(query_param("access_token", "fb-token"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [
                {"id": "1", "message": "first", "likes": {"summary": {"total_count": 4}}},
                {"id": "2", "shares": {"count": 2}}
            ],
            "paging": {"next": next}
        })))
        .mount(&server)
        .await;

    let fetched = facebook(&server.uri())
        .fetch_page_posts("meta")
        .await
        .expect("should fetch posts");

    let ids: Vec<_> = fetched.items.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(fetched.items[0].like_count(), Some(4));
    assert_eq!(fetched.items[1].share_count(), Some(2));
}

#[tokio::test]
async fn facebook_stops_on_repeating_cursor() {
    let server = MockServer::start().await;
    let uri = server.uri();
    // `next` points back at the page just served.
    let same = format!("{uri}/v19.0/meta/posts?after=LOOP&access_token=fb-token");

    Mock::given(method("GET"))
        .and(path("/v19.0/meta/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "1"}],
            "paging": {"next": same}
        })))
        .mount(&server)
        .await;

    let fetched = facebook(&uri).fetch_page_posts("meta").await.unwrap();
    // First page plus the `after=LOOP` page, then the loop is detected.
    assert_eq!(fetched.items.len(), 2);
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn facebook_mid_sequence_error_keeps_earlier_pages() {
    let server = MockServer::start().await;
    let next = format!("{}/v19.0/meta/posts?after=BROKEN&access_token=fb-token", server.uri());

    Mock::given(method("GET"))
        .and(query_param("after", "BROKEN"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("limit", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{"id": "1"}, {"id": "2"}],
            "paging": {"next": next}
        })))
        .mount(&server)
        .await;

    let fetched = facebook(&server.uri()).fetch_page_posts("meta").await.unwrap();
    assert_eq!(fetched.items.len(), 2);
}

#[tokio::test]
async fn facebook_first_page_403_is_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = facebook(&server.uri()).fetch_page_posts("meta").await.unwrap_err();
    match err {
        SourceError::Auth { status, url } => {
            assert_eq!(status, 403);
            assert!(!url.contains("fb-token"), "token leaked into error: {url}");
        }
        other => panic!("expected Auth, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// TikTok
// ---------------------------------------------------------------------------

fn tiktok(base_url: &str) -> TikTokClient {
    TikTokClient::with_base_url(Secret::new("tt-key"), 5, base_url)
        .expect("client construction should not fail")
}

#[tokio::test]
async fn tiktok_trending_hashtags_are_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/hashtag/trending"))
        .and(header("authorization", "Bearer tt-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"hashtags": [
                {"name": "fyp", "view_count": 1000, "video_count": 3},
                {"name": "dance"}
            ]}
        })))
        .mount(&server)
        .await;

    let fetched = tiktok(&server.uri()).fetch_trending_hashtags().await.unwrap();
    assert_eq!(fetched.items.len(), 2);
    assert_eq!(fetched.items[0].view_count, Some(1000));
    assert_eq!(fetched.items[1].video_count, None);
}

#[tokio::test]
async fn tiktok_missing_data_is_empty_not_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/hashtag/trending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(&server)
        .await;

    let fetched = tiktok(&server.uri()).fetch_trending_hashtags().await.unwrap();
    assert!(fetched.items.is_empty());
}

#[tokio::test]
async fn tiktok_videos_follow_cursor_until_has_more_is_false() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/video/list"))
        .and(query_param("cursor", "0"))
        .and(query_param("count", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "videos": [{"id": "v1", "like_count": 10}],
                "cursor": 20,
                "has_more": true
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/video/list"))
        .and(query_param("cursor", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "videos": [{"id": "v2"}, {"id": 7}],
                "cursor": 40,
                "has_more": false
            }
        })))
        .mount(&server)
        .await;

    let fetched = tiktok(&server.uri()).fetch_videos().await.unwrap();
    let ids: Vec<_> = fetched.items.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["v1", "v2"]);
    assert_eq!(fetched.malformed, 1);
}

#[tokio::test]
async fn tiktok_non_advancing_cursor_stops_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/video/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"videos": [{"id": "v1"}], "cursor": 0, "has_more": true}
        })))
        .mount(&server)
        .await;

    let fetched = tiktok(&server.uri()).fetch_videos().await.unwrap();
    assert_eq!(fetched.items.len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Google Trends
// ---------------------------------------------------------------------------

async fn mount_trends(server: &MockServer, explore_status: u16) {
    let explore = serde_json::json!({
        "widgets": [
            {"id": "TIMESERIES", "token": "ts-token", "request": {"time": "now 7-d"}},
            {"id": "RELATED_QUERIES", "token": "rq0", "request": {"k": 0}},
            {"id": "RELATED_QUERIES_1", "token": "rq1", "request": {"k": 1}}
        ]
    });
    Mock::given(method("GET"))
        .and(path("/trends/api/explore"))
        .respond_with(
            ResponseTemplate::new(explore_status).set_body_string(format!(")]}}'\n{explore}")),
        )
        .mount(server)
        .await;

    let multiline = serde_json::json!({
        "default": {"timelineData": [
            {"time": "1", "value": [40, 0], "hasData": [true, false]},
            {"time": "2", "value": [55, 0], "hasData": [true, false]}
        ]}
    });
    Mock::given(method("GET"))
        .and(path("/trends/api/widgetdata/multiline"))
        .and(query_param("token", "ts-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(")]}}',\n{multiline}")))
        .mount(server)
        .await;

    let related = serde_json::json!({
        "default": {"rankedList": [
            {"rankedKeyword": [{"query": "a", "value": 100}, {"query": "b", "value": 25}]},
            {"rankedKeyword": [{"query": "c", "value": 5000}]}
        ]}
    });
    Mock::given(method("GET"))
        .and(path("/trends/api/widgetdata/relatedsearches"))
        .and(query_param("token", "rq0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(")]}}',\n{related}")))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/trends/api/widgetdata/relatedsearches"))
        .and(query_param("token", "rq1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(server)
        .await;
}

#[tokio::test]
async fn google_trends_returns_only_keywords_with_data() {
    let server = MockServer::start().await;
    mount_trends(&server, 200).await;

    let client = GoogleTrendsClient::with_base_url(5, &server.uri()).unwrap();
    let keywords = vec!["SEO".to_string(), "obscure phrase".to_string()];
    let interest = client.fetch_interest(&keywords, "DK").await.unwrap();

    assert_eq!(interest.len(), 1);
    assert_eq!(interest[0].keyword, "SEO");
    assert!((interest[0].trend_score - 55.0).abs() < f64::EPSILON);
    assert_eq!(interest[0].related_volume, Some(125));
}

#[tokio::test]
async fn google_trends_explore_rate_limit_is_upstream_error() {
    let server = MockServer::start().await;
    mount_trends(&server, 429).await;

    let client = GoogleTrendsClient::with_base_url(5, &server.uri()).unwrap();
    let err = client
        .fetch_interest(&["SEO".to_string()], "DK")
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Upstream { status: 429, .. }), "got {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn google_trends_without_timeseries_widget_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trends/api/explore"))
        .respond_with(ResponseTemplate::new(200).set_body_string(")]}'\n{\"widgets\":[]}"))
        .mount(&server)
        .await;

    let client = GoogleTrendsClient::with_base_url(5, &server.uri()).unwrap();
    let err = client
        .fetch_interest(&["SEO".to_string()], "DK")
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Protocol { .. }), "got {err:?}");
}

#[tokio::test]
async fn google_trends_later_group_failure_keeps_earlier_scores() {
    let server = MockServer::start().await;
    let explore = serde_json::json!({
        "widgets": [{"id": "TIMESERIES", "token": "ts-token", "request": {"time": "now 7-d"}}]
    });
    Mock::given(method("GET"))
        .and(path("/trends/api/explore"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(")]}}'\n{explore}")))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/trends/api/explore"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;
    let multiline = serde_json::json!({
        "default": {"timelineData": [
            {"time": "1", "value": [10, 20, 30, 40, 50], "hasData": [true, true, true, true, true]}
        ]}
    });
    Mock::given(method("GET"))
        .and(path("/trends/api/widgetdata/multiline"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(")]}}',\n{multiline}")))
        .mount(&server)
        .await;

    let client = GoogleTrendsClient::with_base_url(5, &server.uri()).unwrap();
    let keywords: Vec<String> = (1..=6).map(|i| format!("kw{i}")).collect();
    let interest = client.fetch_interest(&keywords, "DK").await.unwrap();

    let names: Vec<_> = interest.iter().map(|k| k.keyword.as_str()).collect();
    assert_eq!(names, vec!["kw1", "kw2", "kw3", "kw4", "kw5"]);
    assert!((interest[4].trend_score - 50.0).abs() < f64::EPSILON);
    let explores = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/trends/api/explore")
        .count();
    assert_eq!(explores, 2);
}
