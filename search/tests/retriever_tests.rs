//! Hybrid retrieval engine tests: native and client-side fusion paths,
//! filter parity on the wire, and cancellation purity.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use estatehub_config::{BackendConfig, HybridConfig};
use estatehub_models::SearchFilters;
use estatehub_search::{
    Cancellation, EmbeddingProvider, HybridSearchEngine, SearchBackend, SearchError,
};

struct FakeEmbedder {
    dimension: usize,
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|_| vec![0.1; self.dimension]).collect())
    }
}

fn backend_for(server: &MockServer) -> SearchBackend {
    let config = BackendConfig {
        hosts: vec![server.uri()],
        request_timeout: 5,
        max_retries: 0,
        ..Default::default()
    };
    SearchBackend::new(&config).unwrap()
}

fn property_hit(id: &str, score: f64) -> serde_json::Value {
    json!({
        "_id": id,
        "_index": "properties",
        "_score": score,
        "_source": {
            "listing_id": id,
            "address": {"street": "1 Elm St", "city": "San Francisco", "state": "CA", "zip": "94100"},
            "property_type": "condo",
            "price": 750000.0,
            "bedrooms": 2,
            "bathrooms": 1.0,
            "description": "test"
        }
    })
}

fn engine(backend: SearchBackend) -> HybridSearchEngine {
    HybridSearchEngine::new(
        Arc::new(backend),
        Arc::new(FakeEmbedder { dimension: 4 }),
        HybridConfig::default(),
        "properties",
    )
}

#[tokio::test]
async fn native_path_issues_one_fused_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/properties/_search"))
        .and(body_string_contains("\"rrf\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 9,
            "hits": {"total": {"value": 2}, "hits": [property_hit("p1", 0.031), property_hit("p2", 0.027)]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(backend_for(&server));
    let retrieval = engine
        .hybrid_search(
            "modern kitchen with stainless steel appliances in San Francisco",
            &SearchFilters::default(),
            10,
            &Cancellation::new(),
        )
        .await
        .unwrap();

    assert_eq!(retrieval.hits.len(), 2);
    assert_eq!(retrieval.hits[0].id, "p1");
    assert!(retrieval.hits[0].hybrid_score.is_some());
    let intent = retrieval.intent.unwrap();
    assert_eq!(intent.city.as_deref(), Some("san francisco"));
    assert_eq!(intent.state.as_deref(), Some("CA"));
    assert_eq!(intent.cleaned_query, "modern kitchen with stainless steel appliances");
}

#[tokio::test]
async fn native_request_carries_location_filter_on_both_retrievers() {
    let server = MockServer::start().await;
    // Match only when both the standard and knn retrievers carry the shared
    // location filter terms.
    Mock::given(method("POST"))
        .and(path("/properties/_search"))
        .and(body_partial_json(json!({
            "retriever": {"rrf": {"retrievers": [
                {"standard": {"query": {"bool": {"filter": [
                    {"bool": {"filter": [
                        {"term": {"address.city": "san francisco"}},
                        {"term": {"address.state": "CA"}}
                    ]}}
                ]}}}},
                {"knn": {"filter": {"bool": {"filter": [
                    {"term": {"address.city": "san francisco"}},
                    {"term": {"address.state": "CA"}}
                ]}}}}
            ]}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 2,
            "hits": {"total": {"value": 0}, "hits": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine(backend_for(&server));
    engine
        .hybrid_search(
            "modern kitchen in San Francisco",
            &SearchFilters::default(),
            10,
            &Cancellation::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn client_side_path_runs_both_legs_and_fuses() {
    let server = MockServer::start().await;
    // Lexical leg: body has a top-level "query"
    Mock::given(method("POST"))
        .and(path("/properties/_search"))
        .and(body_string_contains("multi_match"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 5,
            "hits": {"total": {"value": 3}, "hits": [
                property_hit("a", 9.0), property_hit("b", 7.0), property_hit("c", 5.0)
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;
    // Semantic leg: body has a top-level "knn"
    Mock::given(method("POST"))
        .and(path("/properties/_search"))
        .and(body_string_contains("query_vector"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 7,
            "hits": {"total": {"value": 2}, "hits": [
                property_hit("b", 0.97), property_hit("d", 0.91)
            ]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server).without_native_rrf();
    let engine = engine(backend);
    let retrieval = engine
        .hybrid_search("bright kitchen", &SearchFilters::default(), 10, &Cancellation::new())
        .await
        .unwrap();

    // b appears in both lists and must fuse to the top
    assert_eq!(retrieval.hits[0].id, "b");
    let expected = 1.0 / 62.0 + 1.0 / 61.0;
    assert!((retrieval.hits[0].hybrid_score.unwrap() - expected).abs() < 1e-12);
    assert_eq!(retrieval.hits[0].sources, vec!["lexical", "semantic"]);
    assert_eq!(retrieval.hits.len(), 4);
    assert_eq!(retrieval.took_ms, 7);
}

#[tokio::test]
async fn semantic_search_hits_have_no_hybrid_score() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/properties/_search"))
        .and(body_string_contains("query_vector"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "took": 4,
            "hits": {"total": {"value": 1}, "hits": [property_hit("p1", 0.93)]}
        })))
        .mount(&server)
        .await;

    let engine = engine(backend_for(&server));
    let retrieval = engine
        .semantic_search("cozy home", &SearchFilters::default(), 10, &Cancellation::new())
        .await
        .unwrap();
    assert_eq!(retrieval.hits.len(), 1);
    assert!(retrieval.hits[0].hybrid_score.is_none());
    assert_eq!(retrieval.hits[0].score, Some(0.93));
}

#[tokio::test]
async fn cancelled_hybrid_query_issues_nothing_and_returns_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let engine = engine(backend_for(&server));
    let cancel = Cancellation::new();
    cancel.cancel();
    let result = engine
        .hybrid_search("anything in Oakland", &SearchFilters::default(), 10, &cancel)
        .await;
    assert!(matches!(result, Err(SearchError::Cancelled)));
}
