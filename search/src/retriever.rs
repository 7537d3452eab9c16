//! Hybrid retrieval engine
//!
//! Executes the dual-retriever hybrid plan: extract location intent, build
//! lexical and k-NN legs under one shared filter, run them, fuse with RRF.
//! When the backend supports a native fusion retriever the whole plan is a
//! single request; otherwise both legs run concurrently and fusion happens
//! client-side. Cancellation discards partial results.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use estatehub_config::HybridConfig;
use estatehub_models::SearchFilters;

use crate::backend::{SearchBackend, SearchResponse};
use crate::cancel::Cancellation;
use crate::embedding::EmbeddingProvider;
use crate::error::SearchError;
use crate::fusion;
use crate::location::{LocationExtractor, LocationIntent};
use crate::query;

/// One retrieved document. `hybrid_score` is present exactly when the hit
/// came out of a fusion; raw per-retriever scores are not guaranteed.
#[derive(Debug, Clone)]
pub struct RetrievedHit {
    pub id: String,
    pub score: Option<f64>,
    pub hybrid_score: Option<f64>,
    pub source: Value,
    pub highlights: Vec<String>,
    /// Which retrievers produced this hit ("lexical", "semantic")
    pub sources: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Retrieval {
    pub hits: Vec<RetrievedHit>,
    pub total: u64,
    pub took_ms: u64,
    pub intent: Option<LocationIntent>,
}

#[derive(Clone)]
pub struct HybridSearchEngine {
    backend: Arc<SearchBackend>,
    embedder: Arc<dyn EmbeddingProvider>,
    extractor: LocationExtractor,
    hybrid: HybridConfig,
    index: String,
}

impl HybridSearchEngine {
    pub fn new(
        backend: Arc<SearchBackend>,
        embedder: Arc<dyn EmbeddingProvider>,
        hybrid: HybridConfig,
        index: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            embedder,
            extractor: LocationExtractor::new(),
            hybrid,
            index: index.into(),
        }
    }

    pub fn extractor(&self) -> &LocationExtractor {
        &self.extractor
    }

    /// Full hybrid search: location-aware lexical + k-NN under RRF.
    pub async fn hybrid_search(
        &self,
        query_text: &str,
        filters: &SearchFilters,
        size: usize,
        cancel: &Cancellation,
    ) -> Result<Retrieval, SearchError> {
        cancel.check()?;
        let intent = self.extractor.extract(query_text);
        let shared = query::combined_filter(Some(&intent), filters);

        cancel.check()?;
        let vector = self.embedder.embed_one(&intent.cleaned_query).await?;

        let plan = query::hybrid_query(
            &intent.cleaned_query,
            &vector,
            shared.as_ref(),
            &self.hybrid,
            size,
        );

        if self.backend.supports_native_rrf() {
            debug!("hybrid search via native fusion retriever");
            let response = self.backend.search(&[&self.index], &plan.native, cancel).await?;
            cancel.check()?;
            let hits = response
                .hits
                .iter()
                .map(|hit| RetrievedHit {
                    id: hit.id.clone(),
                    score: None,
                    hybrid_score: hit.score,
                    source: hit.source.clone(),
                    highlights: hit.highlights.clone(),
                    sources: vec!["hybrid".to_string()],
                })
                .collect();
            return Ok(Retrieval {
                hits,
                total: response.total,
                took_ms: response.took_ms,
                intent: Some(intent),
            });
        }

        debug!("hybrid search via client-side fusion");
        let indices = [self.index.as_str()];
        let (lexical, semantic) = tokio::join!(
            self.backend.search(&indices, &plan.lexical_leg, cancel),
            self.backend.search(&indices, &plan.knn_leg, cancel),
        );
        let lexical = lexical?;
        let semantic = semantic?;
        // A cancellation racing the join discards whatever arrived.
        cancel.check()?;

        let took_ms = lexical.took_ms.max(semantic.took_ms);
        let (hits, total) = fuse_legs(&lexical, &semantic, &self.hybrid, size);
        Ok(Retrieval {
            hits,
            total,
            took_ms,
            intent: Some(intent),
        })
    }

    /// Lexical-only retrieval with the same location filter the hybrid path
    /// would apply.
    pub async fn lexical_search(
        &self,
        query_text: &str,
        filters: &SearchFilters,
        size: usize,
        cancel: &Cancellation,
    ) -> Result<Retrieval, SearchError> {
        cancel.check()?;
        let intent = self.extractor.extract(query_text);
        let shared = query::combined_filter(Some(&intent), filters);
        let doc = query::lexical_query(&intent.cleaned_query, shared.as_ref(), size);
        let response = self.backend.search(&[&self.index], &doc, cancel).await?;
        Ok(single_retriever_result(response, intent, "lexical"))
    }

    /// k-NN-only retrieval. `k` follows the requested size; `hybrid_score`
    /// is absent on the hits.
    pub async fn semantic_search(
        &self,
        query_text: &str,
        filters: &SearchFilters,
        size: usize,
        cancel: &Cancellation,
    ) -> Result<Retrieval, SearchError> {
        cancel.check()?;
        let intent = self.extractor.extract(query_text);
        let shared = query::combined_filter(Some(&intent), filters);

        cancel.check()?;
        let vector = self.embedder.embed_one(&intent.cleaned_query).await?;
        let doc = query::knn_query(&vector, size, shared.as_ref(), size);
        let response = self.backend.search(&[&self.index], &doc, cancel).await?;
        Ok(single_retriever_result(response, intent, "semantic"))
    }
}

fn single_retriever_result(
    response: SearchResponse,
    intent: LocationIntent,
    source: &str,
) -> Retrieval {
    let hits = response
        .hits
        .iter()
        .map(|hit| RetrievedHit {
            id: hit.id.clone(),
            score: hit.score,
            hybrid_score: None,
            source: hit.source.clone(),
            highlights: hit.highlights.clone(),
            sources: vec![source.to_string()],
        })
        .collect();
    Retrieval {
        hits,
        total: response.total,
        took_ms: response.took_ms,
        intent: Some(intent),
    }
}

/// Client-side fusion of the two legs: RRF over ranked ids, then hit
/// payloads resolved from whichever leg carried them.
fn fuse_legs(
    lexical: &SearchResponse,
    semantic: &SearchResponse,
    hybrid: &HybridConfig,
    size: usize,
) -> (Vec<RetrievedHit>, u64) {
    let lexical_ids: Vec<String> = lexical.hits.iter().map(|h| h.id.clone()).collect();
    let semantic_ids: Vec<String> = semantic.hits.iter().map(|h| h.id.clone()).collect();

    let fused = fusion::reciprocal_rank_fusion(
        &[("lexical", lexical_ids), ("semantic", semantic_ids)],
        hybrid.rank_constant,
        hybrid.rank_window_size,
        None,
    );

    let mut payloads: HashMap<&str, &crate::backend::Hit> = HashMap::new();
    for hit in semantic.hits.iter().chain(lexical.hits.iter()) {
        // Lexical wins on collision: it carries highlights
        payloads.insert(hit.id.as_str(), hit);
    }

    let total = fused.len() as u64;
    let hits = fused
        .into_iter()
        .take(size)
        .filter_map(|fused_hit| {
            payloads.get(fused_hit.id.as_str()).map(|payload| RetrievedHit {
                id: fused_hit.id.clone(),
                score: None,
                hybrid_score: Some(fused_hit.score),
                source: payload.source.clone(),
                highlights: payload.highlights.clone(),
                sources: fused_hit.sources,
            })
        })
        .collect();

    (hits, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Hit;
    use serde_json::json;

    fn hit(id: &str, score: f64) -> Hit {
        Hit {
            id: id.to_string(),
            index: "properties".to_string(),
            score: Some(score),
            source: json!({"listing_id": id}),
            highlights: vec![],
            sort: None,
        }
    }

    fn response(hits: Vec<Hit>) -> SearchResponse {
        SearchResponse {
            took_ms: 5,
            total: hits.len() as u64,
            hits,
            aggregations: None,
        }
    }

    #[test]
    fn fuse_legs_prefers_docs_in_both_lists() {
        let lexical = response(vec![hit("a", 9.0), hit("b", 7.0), hit("c", 5.0)]);
        let semantic = response(vec![hit("b", 0.97), hit("d", 0.91)]);
        let hybrid = HybridConfig::default();

        let (hits, total) = fuse_legs(&lexical, &semantic, &hybrid, 10);
        assert_eq!(total, 4);
        assert_eq!(hits[0].id, "b");
        assert!(hits[0].hybrid_score.is_some());
        assert!(hits[0].score.is_none());
        let expected = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((hits[0].hybrid_score.unwrap() - expected).abs() < 1e-12);
        assert_eq!(hits[0].sources, vec!["lexical", "semantic"]);
    }

    #[test]
    fn fuse_legs_truncates_to_requested_size() {
        let lexical = response(vec![hit("a", 3.0), hit("b", 2.0), hit("c", 1.0)]);
        let semantic = response(vec![]);
        let (hits, total) = fuse_legs(&lexical, &semantic, &HybridConfig::default(), 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(total, 3);
    }
}
