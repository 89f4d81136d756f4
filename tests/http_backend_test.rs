//! HTTP backend tests using wiremock
//!
//! Real requests against a local mock server: query parameters, both body
//! shapes, and every failure mapping.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lookup::dispatch::search_url;
use lookup::{
    BindingSpec, ElementId, EngineConfig, HttpBackend, Lookup, RecordingWriter, SearchBackend,
};

// =============================================================================
// HELPERS
// =============================================================================

fn config_for(server: &MockServer) -> EngineConfig {
    EngineConfig::default().with_base_url(server.uri())
}

fn url(server: &MockServer, p: &str, text: &str, limit: usize) -> Url {
    let base = Url::parse(&format!("{}{}", server.uri(), p)).unwrap();
    search_url(&base, text, limit)
}

// =============================================================================
// BACKEND
// =============================================================================

#[tokio::test]
async fn sends_query_and_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/lookup/items"))
        .and(query_param("q", "appl"))
        .and(query_param("limit", "50"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "Apple juice" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&config_for(&server)).unwrap();
    let body = backend
        .search(&url(&server, "/api/lookup/items", "appl", 50))
        .await
        .unwrap();
    assert_eq!(body[0]["name"], "Apple juice");
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&config_for(&server)).unwrap();
    let err = backend
        .search(&url(&server, "/api/lookup/items", "x", 10))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "LOOKUP-021");
    assert!(err.is_recoverable());
}

#[tokio::test]
async fn malformed_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let backend = HttpBackend::new(&config_for(&server)).unwrap();
    let err = backend
        .search(&url(&server, "/api/lookup/items", "x", 10))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "LOOKUP-022");
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = config_for(&server).with_search_timeout(Duration::from_millis(200));
    let backend = HttpBackend::new(&config).unwrap();
    let err = backend
        .search(&url(&server, "/api/lookup/items", "x", 10))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "LOOKUP-023");
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let config = EngineConfig::default().with_base_url("http://127.0.0.1:1");
    let backend = HttpBackend::new(&config).unwrap();
    let err = backend
        .search(&Url::parse("http://127.0.0.1:1/api/lookup/items?q=x").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "LOOKUP-020");
}

// =============================================================================
// ENGINE OVER HTTP
// =============================================================================

#[tokio::test]
async fn fetch_only_reads_items_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/lookup/customers"))
        .and(query_param("q", "ann"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": "c-1", "name": "Anna", "code": "ANN" },
                { "id": "c-2", "name": "Annika" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = Lookup::new(config_for(&server), Arc::new(RecordingWriter::new())).unwrap();
    let rows = lookup.fetch_only("client", "ann", 20, None).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].secondary().as_deref(), Some("ANN"));

    // Second call is a cache hit
    let again = lookup.fetch_only("customers", "ann", 20, None).await;
    assert_eq!(again.len(), 2);
}

#[tokio::test]
async fn endpoint_override_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/legacy/rooms.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 101 }])))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = Lookup::new(config_for(&server), Arc::new(RecordingWriter::new())).unwrap();
    let rows = lookup
        .fetch_only("room", "10", 5, Some("/legacy/rooms.php"))
        .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].label(), "101");
}

#[tokio::test]
async fn bound_input_reaches_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/lookup/items"))
        .and(query_param("q", "bolt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 9, "name": "Bolt M8", "price": "0.20" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let lookup = Lookup::new(config_for(&server), Arc::new(RecordingWriter::new())).unwrap();
    let line = ElementId::from("#line-1");
    lookup.bind(
        line.clone(),
        BindingSpec::new("product").debounce(Duration::from_millis(10)),
    );
    lookup.input(&line, "bolt");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !lookup.is_open(&line) && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(lookup.panel(&line).unwrap().labels(), vec!["Bolt M8"]);
}
