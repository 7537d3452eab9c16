//! Backend client integration tests against a stubbed HTTP engine.

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use estatehub_config::BackendConfig;
use estatehub_search::{Cancellation, QueryDoc, SearchBackend, SearchError};

fn backend_for(server: &MockServer) -> SearchBackend {
    let config = BackendConfig {
        hosts: vec![server.uri()],
        request_timeout: 5,
        max_retries: 2,
        ..Default::default()
    };
    SearchBackend::new(&config).unwrap()
}

#[tokio::test]
async fn ensure_index_creates_missing_index() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/properties"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/properties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let body = json!({"settings": {}, "mappings": {"properties": {"listing_id": {"type": "keyword"}}}});
    backend.ensure_index("properties", &body, false).await.unwrap();
}

#[tokio::test]
async fn incompatible_existing_mapping_is_a_schema_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/properties"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/properties/_mapping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {"mappings": {"properties": {"price": {"type": "keyword"}}}}
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let body = json!({"settings": {}, "mappings": {"properties": {"price": {"type": "double"}}}});
    let result = backend.ensure_index("properties", &body, false).await;
    match result {
        Err(SearchError::SchemaConflict { index, detail }) => {
            assert_eq!(index, "properties");
            assert!(detail.contains("price"));
        }
        other => panic!("expected SchemaConflict, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn force_recreate_deletes_and_recreates() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/properties"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/properties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/properties"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let body = json!({"settings": {}, "mappings": {"properties": {}}});
    backend.ensure_index("properties", &body, true).await.unwrap();
}

#[tokio::test]
async fn bulk_write_reports_per_item_outcomes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": true,
            "items": [
                {"index": {"_id": "p1", "status": 201}},
                {"index": {"_id": "p2", "status": 400,
                           "error": {"type": "mapper_parsing_exception", "reason": "bad field"}}}
            ]
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let docs = vec![
        ("p1".to_string(), json!({"listing_id": "p1"})),
        ("p2".to_string(), json!({"listing_id": "p2"})),
    ];
    let outcome = backend
        .bulk_write("properties", &docs, false, &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(outcome.indexed, 1);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.errors[0].id, "p2");
    assert_eq!(outcome.errors[0].reason, "bad field");
}

#[tokio::test]
async fn transient_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/properties/_search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/properties/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 3,
            "hits": {"total": {"value": 1}, "hits": [
                {"_id": "p1", "_index": "properties", "_score": 1.0, "_source": {"listing_id": "p1"}}
            ]}
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let doc = QueryDoc::new(json!({"query": {"match_all": {}}}));
    let response = backend
        .search(&["properties"], &doc, &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(response.hits.len(), 1);
}

#[tokio::test]
async fn bad_request_is_a_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/properties/_search"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"type": "parsing_exception"}
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let doc = QueryDoc::new(json!({"query": {"bad": {}}}));
    let result = backend.search(&["properties"], &doc, &Cancellation::new()).await;
    assert!(matches!(result, Err(SearchError::Validation(_))));
}

#[tokio::test]
async fn cancelled_token_issues_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/properties/_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": {"hits": []}})))
        .expect(0)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let cancel = Cancellation::new();
    cancel.cancel();
    let doc = QueryDoc::new(json!({"query": {"match_all": {}}}));
    let result = backend.search(&["properties"], &doc, &cancel).await;
    assert!(matches!(result, Err(SearchError::Cancelled)));
}

#[tokio::test]
async fn search_sends_body_and_parses_aggregations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/properties/_search"))
        .and(body_string_contains("price_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 4,
            "hits": {"total": {"value": 12}, "hits": []},
            "aggregations": {
                "price_stats": {"count": 12, "min": 1.0, "max": 9.0, "avg": 4.0, "sum": 48.0}
            }
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let doc = QueryDoc::new(json!({"size": 0, "aggs": {"price_stats": {"stats": {"field": "price"}}}}));
    let response = backend
        .search(&["properties"], &doc, &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(response.total, 12);
    assert!(response.hits.is_empty());
    assert!(response.aggregations.is_some());
}
