#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "integration test — panics are the assertion mechanism")]

use cardfeed_core::{
    CardFeedManager, DataSource, HttpDataSource, HttpSourceProvider, NotificationHub,
    QueryRequest,
};
use cardfeed_types::contract::{FEED_READ_PERM, FEED_WRITE_PERM};
use cardfeed_types::models::SourceEndpointConfig;
use cardfeed_types::{FeedConfig, RawNotification, SourceDescriptor, SourceError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FEED: &str = "com.example.feed";

fn source(server: &MockServer, timeout: Duration) -> HttpDataSource {
    let base = Url::parse(&format!("{}/feed", server.uri())).expect("base url");
    HttpDataSource::new(FEED, base, NotificationHub::new(), timeout).expect("client")
}

fn descriptor() -> SourceDescriptor {
    SourceDescriptor::new(FEED).expect("descriptor")
}

#[tokio::test]
async fn test_collection_query_passes_projection_and_sort() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed/datacard"))
        .and(query_param("sort", "priority ASC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"_id": 2, "title_text": "two", "priority": 1},
            {"_id": 1, "title_text": "one", "priority": 5}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let rows = source(&server, Duration::from_secs(2))
        .query(&QueryRequest::all_cards(&descriptor()))
        .await
        .expect("rows");

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["_id"], json!(2));
}

#[tokio::test]
async fn test_missing_item_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed/datacard/9"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let rows = source(&server, Duration::from_secs(2))
        .query(&QueryRequest::card_item(descriptor().cards_uri.item(9)))
        .await
        .expect("rows");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_server_error_maps_to_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = source(&server, Duration::from_secs(2))
        .query(&QueryRequest::all_images(&descriptor()))
        .await
        .expect_err("503");
    assert_eq!(err, SourceError::Http { source_id: FEED.to_string(), status: 503 });
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = source(&server, Duration::from_millis(100))
        .query(&QueryRequest::all_cards(&descriptor()))
        .await
        .expect_err("timeout");
    assert!(matches!(err, SourceError::Timeout { after_ms: 100, .. }));
}

#[tokio::test]
async fn test_non_array_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": []})))
        .mount(&server)
        .await;

    let err = source(&server, Duration::from_secs(2))
        .query(&QueryRequest::all_cards(&descriptor()))
        .await
        .expect_err("malformed");
    assert!(matches!(err, SourceError::Malformed { .. }));
}

#[tokio::test]
async fn test_remote_source_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed/datacard"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"_id": 1, "title_text": "first"}])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed/datacardimage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed/datacard/2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"_id": 2, "title_text": "second"}])),
        )
        .mount(&server)
        .await;

    let mut config = FeedConfig::new();
    config.sources.push(SourceEndpointConfig {
        source_id: FEED.to_string(),
        base_url: format!("{}/feed", server.uri()),
        read_permission: Some(FEED_READ_PERM.to_string()),
        write_permission: Some(FEED_WRITE_PERM.to_string()),
    });

    let hub = NotificationHub::new();
    let provider = HttpSourceProvider::new(&config, hub.clone()).expect("provider");
    let manager = CardFeedManager::new(Arc::new(provider), config);
    manager.initialize().await.expect("initialize");
    manager.ready().await;

    assert!(manager.has_card(FEED, 1));
    assert_eq!(hub.route_count(), 2);

    let delivered =
        hub.deliver(RawNotification::external("content://com.example.feed/datacard/2")).await;
    assert!(delivered);
    manager.flush().await;
    assert_eq!(
        manager.get_card(FEED, 2).and_then(|c| c.title).as_deref(),
        Some("second")
    );

    manager.teardown().await;
    assert_eq!(hub.route_count(), 0);
}
