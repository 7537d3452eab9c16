//! Built-in demos
//!
//! One demo per query family, each returning the typed result that owns its
//! rendering. Numbers are stable; the CLI addresses demos by them.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use estatehub_models::{
    DistanceUnit, GeoFilter, GeoPoint, PriceRange, PropertyRelationships, PropertyType, SearchFilters,
};

use crate::backend::SearchResponse;
use crate::error::SearchError;
use crate::query::{self, QueryDoc};

use super::results::{
    AggregationResult, ComparisonResult, MixedEntityResult, PropertyResult, Render,
    SemanticBatchResult,
};
use super::{Demo, DemoCategory, DemoContext, DemoRegistry, DemoSpec, QueryDemo, QueryDemoAdapter};

pub fn standard_registry() -> DemoRegistry {
    DemoRegistry::new(vec![
        Arc::new(QueryDemoAdapter(BasicSearchDemo)),
        Arc::new(QueryDemoAdapter(FilteredSearchDemo)),
        Arc::new(QueryDemoAdapter(PriceRangeDemo)),
        Arc::new(QueryDemoAdapter(GeoSearchDemo)),
        Arc::new(QueryDemoAdapter(MarketOverviewDemo)),
        Arc::new(QueryDemoAdapter(WikipediaSearchDemo)),
        Arc::new(SemanticSearchDemo),
        Arc::new(HybridSearchDemo),
        Arc::new(LexicalVsSemanticDemo),
        Arc::new(SemanticBatchDemo),
        Arc::new(RelationshipDemo),
    ])
}

/// 1. Plain lexical search over the boosted property fields.
struct BasicSearchDemo;

const BASIC_QUERY: &str = "modern kitchen with stainless steel appliances";

#[async_trait]
impl QueryDemo for BasicSearchDemo {
    fn spec(&self) -> DemoSpec {
        DemoSpec {
            number: 1,
            name: "basic-search",
            category: DemoCategory::Basic,
            description: "Lexical multi-field property search",
        }
    }

    fn indices(&self, ctx: &DemoContext) -> Vec<String> {
        vec![ctx.indices.property.clone()]
    }

    async fn build_query(&self, _ctx: &DemoContext, size: usize) -> Result<QueryDoc, SearchError> {
        Ok(query::lexical_query(BASIC_QUERY, None, size))
    }

    fn to_result(
        &self,
        _ctx: &DemoContext,
        size: usize,
        response: SearchResponse,
    ) -> Result<Box<dyn Render>, SearchError> {
        Ok(Box::new(PropertyResult::from_response(
            "Basic Property Search",
            Some(BASIC_QUERY.to_string()),
            &response,
            size,
        )))
    }
}

/// 2. Structured filters only, no scoring.
struct FilteredSearchDemo;

impl FilteredSearchDemo {
    fn filters() -> SearchFilters {
        SearchFilters {
            price_range: PriceRange::between(500_000.0, 1_500_000.0),
            bedrooms_min: Some(2),
            property_types: vec![PropertyType::SingleFamily, PropertyType::Condo],
            ..Default::default()
        }
    }
}

#[async_trait]
impl QueryDemo for FilteredSearchDemo {
    fn spec(&self) -> DemoSpec {
        DemoSpec {
            number: 2,
            name: "filtered-search",
            category: DemoCategory::Basic,
            description: "Filter-context-only property search",
        }
    }

    fn indices(&self, ctx: &DemoContext) -> Vec<String> {
        vec![ctx.indices.property.clone()]
    }

    async fn build_query(&self, _ctx: &DemoContext, size: usize) -> Result<QueryDoc, SearchError> {
        Ok(query::filtered_query(&Self::filters(), size))
    }

    fn to_result(
        &self,
        _ctx: &DemoContext,
        size: usize,
        response: SearchResponse,
    ) -> Result<Box<dyn Render>, SearchError> {
        Ok(Box::new(PropertyResult::from_response(
            "Filtered Property Search",
            None,
            &response,
            size,
        )))
    }
}

/// 3. Price range with stats, terms, and histogram aggregations.
struct PriceRangeDemo;

#[async_trait]
impl QueryDemo for PriceRangeDemo {
    fn spec(&self) -> DemoSpec {
        DemoSpec {
            number: 3,
            name: "price-range",
            category: DemoCategory::Aggregation,
            description: "Price range search with aggregations",
        }
    }

    fn indices(&self, ctx: &DemoContext) -> Vec<String> {
        vec![ctx.indices.property.clone()]
    }

    async fn build_query(&self, _ctx: &DemoContext, size: usize) -> Result<QueryDoc, SearchError> {
        let range = PriceRange::between(400_000.0, 800_000.0);
        Ok(query::price_aggregation_query(&range, 100_000.0, size))
    }

    fn to_result(
        &self,
        _ctx: &DemoContext,
        _size: usize,
        response: SearchResponse,
    ) -> Result<Box<dyn Render>, SearchError> {
        Ok(Box::new(AggregationResult::from_response(
            "Price Range $400k-$800k",
            &response,
        )))
    }
}

/// 4. Geo-distance search around downtown San Francisco.
struct GeoSearchDemo;

#[async_trait]
impl QueryDemo for GeoSearchDemo {
    fn spec(&self) -> DemoSpec {
        DemoSpec {
            number: 4,
            name: "geo-search",
            category: DemoCategory::Geo,
            description: "Geo-distance property search",
        }
    }

    fn indices(&self, ctx: &DemoContext) -> Vec<String> {
        vec![ctx.indices.property.clone()]
    }

    async fn build_query(&self, _ctx: &DemoContext, size: usize) -> Result<QueryDoc, SearchError> {
        let geo = GeoFilter {
            center: GeoPoint { lat: 37.7749, lon: -122.4194 },
            radius: 5.0,
            unit: DistanceUnit::Km,
        };
        Ok(query::geo_query(Some("family home"), &geo, &SearchFilters::default(), size))
    }

    fn to_result(
        &self,
        _ctx: &DemoContext,
        size: usize,
        response: SearchResponse,
    ) -> Result<Box<dyn Render>, SearchError> {
        Ok(Box::new(PropertyResult::from_response(
            "Homes Within 5km of Downtown SF",
            Some("family home".to_string()),
            &response,
            size,
        )))
    }
}

/// 5. Market overview: aggregations only, no hits.
struct MarketOverviewDemo;

#[async_trait]
impl QueryDemo for MarketOverviewDemo {
    fn spec(&self) -> DemoSpec {
        DemoSpec {
            number: 5,
            name: "market-overview",
            category: DemoCategory::Aggregation,
            description: "Aggregation-only market statistics",
        }
    }

    fn indices(&self, ctx: &DemoContext) -> Vec<String> {
        vec![ctx.indices.property.clone()]
    }

    async fn build_query(&self, _ctx: &DemoContext, _size: usize) -> Result<QueryDoc, SearchError> {
        Ok(query::aggregation_only_query(&SearchFilters::default(), 250_000.0))
    }

    fn to_result(
        &self,
        _ctx: &DemoContext,
        _size: usize,
        response: SearchResponse,
    ) -> Result<Box<dyn Render>, SearchError> {
        Ok(Box::new(AggregationResult::from_response("Market Overview", &response)))
    }
}

/// 6. Wikipedia full-text with a related-term cluster and location filter.
struct WikipediaSearchDemo;

const WIKIPEDIA_QUERY: &str = "gold rush history";

#[async_trait]
impl QueryDemo for WikipediaSearchDemo {
    fn spec(&self) -> DemoSpec {
        DemoSpec {
            number: 6,
            name: "wikipedia-fulltext",
            category: DemoCategory::Wikipedia,
            description: "Full-text search over Wikipedia articles",
        }
    }

    fn indices(&self, ctx: &DemoContext) -> Vec<String> {
        vec![ctx.indices.wikipedia.clone()]
    }

    async fn build_query(&self, _ctx: &DemoContext, size: usize) -> Result<QueryDoc, SearchError> {
        Ok(query::wikipedia_query(
            WIKIPEDIA_QUERY,
            &["49ers", "mining", "1849"],
            &[],
            Some(("San Francisco", "CA")),
            size,
        ))
    }

    fn to_result(
        &self,
        ctx: &DemoContext,
        _size: usize,
        response: SearchResponse,
    ) -> Result<Box<dyn Render>, SearchError> {
        Ok(Box::new(MixedEntityResult::from_response(
            "Wikipedia: Gold Rush History",
            Some(WIKIPEDIA_QUERY.to_string()),
            &response,
            &ctx.indices,
        )))
    }
}

/// 7. Pure k-NN semantic search; hits carry raw vector scores only.
struct SemanticSearchDemo;

const SEMANTIC_QUERY: &str = "a cozy home near parks with good schools";

#[async_trait]
impl Demo for SemanticSearchDemo {
    fn spec(&self) -> DemoSpec {
        DemoSpec {
            number: 7,
            name: "semantic-search",
            category: DemoCategory::Semantic,
            description: "Dense-vector k-NN search",
        }
    }

    async fn run(&self, ctx: &DemoContext, size: usize) -> Result<Box<dyn Render>, SearchError> {
        let retrieval = ctx
            .engine
            .semantic_search(SEMANTIC_QUERY, &SearchFilters::default(), size, &ctx.cancel)
            .await?;
        Ok(Box::new(PropertyResult::from_retrieval(
            "Semantic Property Search",
            Some(SEMANTIC_QUERY.to_string()),
            retrieval,
            size,
        )))
    }
}

/// 8. The full hybrid plan: location intent, shared filters, RRF.
struct HybridSearchDemo;

const HYBRID_QUERY: &str = "modern kitchen with stainless steel appliances in San Francisco";

#[async_trait]
impl Demo for HybridSearchDemo {
    fn spec(&self) -> DemoSpec {
        DemoSpec {
            number: 8,
            name: "hybrid-search",
            category: DemoCategory::Hybrid,
            description: "Location-aware lexical + k-NN search fused with RRF",
        }
    }

    async fn run(&self, ctx: &DemoContext, size: usize) -> Result<Box<dyn Render>, SearchError> {
        let retrieval = ctx
            .engine
            .hybrid_search(HYBRID_QUERY, &SearchFilters::default(), size, &ctx.cancel)
            .await?;
        Ok(Box::new(PropertyResult::from_retrieval(
            "Hybrid Property Search",
            Some(HYBRID_QUERY.to_string()),
            retrieval,
            size,
        )))
    }
}

/// 9. The same query as lexical-only and semantic-only, side by side.
struct LexicalVsSemanticDemo;

const COMPARISON_QUERY: &str = "bright open floor plan with a garden";

#[async_trait]
impl Demo for LexicalVsSemanticDemo {
    fn spec(&self) -> DemoSpec {
        DemoSpec {
            number: 9,
            name: "lexical-vs-semantic",
            category: DemoCategory::Hybrid,
            description: "Compare lexical and semantic retrievers on one query",
        }
    }

    async fn run(&self, ctx: &DemoContext, size: usize) -> Result<Box<dyn Render>, SearchError> {
        let filters = SearchFilters::default();
        let (lexical, semantic) = tokio::join!(
            ctx.engine.lexical_search(COMPARISON_QUERY, &filters, size, &ctx.cancel),
            ctx.engine.semantic_search(COMPARISON_QUERY, &filters, size, &ctx.cancel),
        );
        let lexical = lexical?;
        let semantic = semantic?;
        let took_ms = lexical.took_ms.max(semantic.took_ms);

        let lexical_hits =
            PropertyResult::from_retrieval("", None, lexical, size).hits;
        let semantic_hits =
            PropertyResult::from_retrieval("", None, semantic, size).hits;

        Ok(Box::new(ComparisonResult::new(
            "Lexical vs Semantic",
            COMPARISON_QUERY,
            "[LEXICAL]",
            lexical_hits,
            "[SEMANTIC]",
            semantic_hits,
            took_ms,
        )))
    }
}

/// 10. A batch of semantic queries with aggregate timings.
struct SemanticBatchDemo;

const BATCH_QUERIES: [&str; 3] = [
    "quiet street close to coffee shops",
    "recently renovated victorian with original details",
    "family home with a big backyard",
];

#[async_trait]
impl Demo for SemanticBatchDemo {
    fn spec(&self) -> DemoSpec {
        DemoSpec {
            number: 10,
            name: "semantic-batch",
            category: DemoCategory::Semantic,
            description: "Batch of semantic queries with timings",
        }
    }

    async fn run(&self, ctx: &DemoContext, size: usize) -> Result<Box<dyn Render>, SearchError> {
        let started = Instant::now();
        let mut runs = Vec::with_capacity(BATCH_QUERIES.len());
        for query_text in BATCH_QUERIES {
            let retrieval = ctx
                .engine
                .semantic_search(query_text, &SearchFilters::default(), size, &ctx.cancel)
                .await?;
            runs.push((
                query_text.to_string(),
                PropertyResult::from_retrieval(query_text, None, retrieval, size),
            ));
        }
        Ok(Box::new(SemanticBatchResult {
            title: "Semantic Batch".to_string(),
            runs,
            total_ms: started.elapsed().as_millis() as u64,
        }))
    }
}

/// 11. Denormalized relationship lookup: sample property ids, then one
/// terms query against the relationships index.
struct RelationshipDemo;

#[async_trait]
impl Demo for RelationshipDemo {
    fn spec(&self) -> DemoSpec {
        DemoSpec {
            number: 11,
            name: "relationship-lookup",
            category: DemoCategory::Relationship,
            description: "Property with neighborhood and Wikipedia context in one call",
        }
    }

    async fn run(&self, ctx: &DemoContext, size: usize) -> Result<Box<dyn Render>, SearchError> {
        // Sample ids from the property index in stable order
        let sample = QueryDoc::new(serde_json::json!({
            "query": {"match_all": {}},
            "size": size,
            "sort": [{"listing_id": "asc"}],
            "_source": ["listing_id"]
        }));
        let properties = ctx
            .backend
            .search(&[&ctx.indices.property], &sample, &ctx.cancel)
            .await?;
        let ids: Vec<&str> = properties.hits.iter().map(|h| h.id.as_str()).collect();
        if ids.is_empty() {
            return Err(SearchError::NotFound("no properties indexed".to_string()));
        }

        let lookup = query::relationship_lookup(&ids, size);
        let response = ctx
            .backend
            .search(&[&ctx.indices.property_relationships], &lookup, &ctx.cancel)
            .await?;

        let docs: Vec<PropertyRelationships> = response
            .hits
            .iter()
            .filter_map(|hit| serde_json::from_value(hit.source.clone()).ok())
            .collect();

        Ok(Box::new(MixedEntityResult::from_relationships(
            "Property Relationships",
            docs,
            response.took_ms,
        )))
    }
}
