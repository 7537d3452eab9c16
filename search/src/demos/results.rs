//! Typed demo results
//!
//! Every demo returns one of these families, and every family owns its own
//! rendering. The harness only ever calls `Render`; it never branches on
//! the concrete type.

use std::collections::HashSet;
use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use estatehub_config::IndexNames;
use estatehub_models::{Neighborhood, Property, PropertyRelationships, WikipediaArticle};

use crate::backend::SearchResponse;
use crate::error::SearchError;
use crate::location::LocationIntent;
use crate::retriever::Retrieval;

/// Rendering contract shared by every result family.
pub trait Render: Send + Sync {
    fn title(&self) -> &str;
    fn render(&self, w: &mut dyn Write) -> io::Result<()>;
}

/// Carried on a result when the demo failed; rendered in place of hits.
#[derive(Debug, Clone, Serialize)]
pub struct DemoFailure {
    pub error_kind: String,
    pub message: String,
}

impl DemoFailure {
    pub fn from_error(error: &SearchError) -> Self {
        Self {
            error_kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// Standalone failure result for demos that could not produce their family.
pub struct FailureResult {
    pub title: String,
    pub failure: DemoFailure,
}

impl Render for FailureResult {
    fn title(&self) -> &str {
        &self.title
    }

    fn render(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "=== {} ===", self.title)?;
        writeln!(w, "error [{}]: {}", self.failure.error_kind, self.failure.message)
    }
}

#[derive(Debug, Clone)]
pub struct PropertyHitView {
    pub property: Property,
    pub score: Option<f64>,
    pub hybrid_score: Option<f64>,
    pub highlights: Vec<String>,
}

/// Property hits plus pagination metadata.
pub struct PropertyResult {
    pub title: String,
    pub query: Option<String>,
    pub intent: Option<LocationIntent>,
    pub hits: Vec<PropertyHitView>,
    pub total: u64,
    pub took_ms: u64,
    pub size: usize,
    pub from: usize,
}

impl PropertyResult {
    pub fn from_retrieval(title: impl Into<String>, query: Option<String>, retrieval: Retrieval, size: usize) -> Self {
        let hits = retrieval
            .hits
            .iter()
            .filter_map(|hit| match serde_json::from_value::<Property>(hit.source.clone()) {
                Ok(property) => Some(PropertyHitView {
                    property,
                    score: hit.score,
                    hybrid_score: hit.hybrid_score,
                    highlights: hit.highlights.clone(),
                }),
                Err(e) => {
                    warn!("skipping malformed property hit '{}': {}", hit.id, e);
                    None
                }
            })
            .collect();
        Self {
            title: title.into(),
            query,
            intent: retrieval.intent,
            hits,
            total: retrieval.total,
            took_ms: retrieval.took_ms,
            size,
            from: 0,
        }
    }

    pub fn from_response(title: impl Into<String>, query: Option<String>, response: &SearchResponse, size: usize) -> Self {
        let hits = response
            .hits
            .iter()
            .filter_map(|hit| match serde_json::from_value::<Property>(hit.source.clone()) {
                Ok(property) => Some(PropertyHitView {
                    property,
                    score: hit.score,
                    hybrid_score: None,
                    highlights: hit.highlights.clone(),
                }),
                Err(e) => {
                    warn!("skipping malformed property hit '{}': {}", hit.id, e);
                    None
                }
            })
            .collect();
        Self {
            title: title.into(),
            query,
            intent: None,
            hits,
            total: response.total,
            took_ms: response.took_ms,
            size,
            from: 0,
        }
    }
}

fn write_property_line(w: &mut dyn Write, index: usize, hit: &PropertyHitView) -> io::Result<()> {
    let p = &hit.property;
    writeln!(
        w,
        "{:>3}. ${:<12.0} {}bd/{}ba  {}, {}, {}  [{}]",
        index + 1,
        p.price,
        p.bedrooms,
        p.bathrooms,
        p.address.street,
        p.address.city,
        p.address.state,
        p.property_type.as_str(),
    )?;
    match (hit.hybrid_score, hit.score) {
        (Some(hybrid), _) => writeln!(w, "     hybrid_score: {:.4}", hybrid)?,
        (None, Some(score)) => writeln!(w, "     score: {:.4}", score)?,
        _ => {}
    }
    for highlight in &hit.highlights {
        writeln!(w, "     … {}", highlight)?;
    }
    Ok(())
}

impl Render for PropertyResult {
    fn title(&self) -> &str {
        &self.title
    }

    fn render(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "=== {} ===", self.title)?;
        if let Some(query) = &self.query {
            writeln!(w, "query: \"{}\"", query)?;
        }
        if let Some(intent) = &self.intent {
            if intent.has_location {
                let city = intent.display_city.as_deref().or(intent.city.as_deref()).unwrap_or("-");
                let state = intent.state.as_deref().unwrap_or("-");
                writeln!(w, "location: {}, {} (confidence {:.2})", city, state, intent.confidence)?;
            }
        }
        writeln!(w, "{} of {} hits in {} ms", self.hits.len(), self.total, self.took_ms)?;
        for (index, hit) in self.hits.iter().enumerate() {
            write_property_line(w, index, hit)?;
        }
        Ok(())
    }
}

/// A trimmed Wikipedia view used in mixed results (no full content).
#[derive(Debug, Clone, Serialize)]
pub struct WikipediaHitView {
    pub page_id: String,
    pub title: String,
    pub relevance_score: f32,
    pub confidence: f32,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl From<&WikipediaArticle> for WikipediaHitView {
    fn from(article: &WikipediaArticle) -> Self {
        Self {
            page_id: article.page_id.clone(),
            title: article.title.clone(),
            relevance_score: article.relevance_score,
            confidence: article.confidence,
            city: article.location.city.clone(),
            state: article.location.state.clone(),
        }
    }
}

/// One hit in a multi-index response, tagged with its entity type.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum TaggedHit {
    Property {
        #[serde(skip)]
        property: Box<Property>,
        score: Option<f64>,
    },
    Neighborhood {
        #[serde(skip)]
        neighborhood: Box<Neighborhood>,
        score: Option<f64>,
    },
    Wikipedia {
        article: WikipediaHitView,
        score: Option<f64>,
        highlights: Vec<String>,
    },
}

/// Hits drawn from one or more indices, each carrying its entity tag.
pub struct MixedEntityResult {
    pub title: String,
    pub query: Option<String>,
    pub hits: Vec<TaggedHit>,
    pub total: u64,
    pub took_ms: u64,
}

impl MixedEntityResult {
    /// Classify raw hits by the index that produced them.
    pub fn from_response(
        title: impl Into<String>,
        query: Option<String>,
        response: &SearchResponse,
        indices: &IndexNames,
    ) -> Self {
        let mut hits = Vec::with_capacity(response.hits.len());
        for hit in &response.hits {
            let tagged = if hit.index == indices.property {
                serde_json::from_value::<Property>(hit.source.clone())
                    .ok()
                    .map(|p| TaggedHit::Property { property: Box::new(p), score: hit.score })
            } else if hit.index == indices.neighborhood {
                serde_json::from_value::<Neighborhood>(hit.source.clone())
                    .ok()
                    .map(|n| TaggedHit::Neighborhood { neighborhood: Box::new(n), score: hit.score })
            } else if hit.index == indices.wikipedia {
                serde_json::from_value::<WikipediaArticle>(hit.source.clone())
                    .ok()
                    .map(|a| TaggedHit::Wikipedia {
                        article: WikipediaHitView::from(&a),
                        score: hit.score,
                        highlights: hit.highlights.clone(),
                    })
            } else {
                None
            };
            match tagged {
                Some(tagged) => hits.push(tagged),
                None => warn!("skipping unclassifiable hit '{}' from '{}'", hit.id, hit.index),
            }
        }
        Self {
            title: title.into(),
            query,
            hits,
            total: response.total,
            took_ms: response.took_ms,
        }
    }

    /// Explode denormalized relationship documents into tagged hits, one
    /// group per property.
    pub fn from_relationships(
        title: impl Into<String>,
        docs: Vec<PropertyRelationships>,
        took_ms: u64,
    ) -> Self {
        let total = docs.len() as u64;
        let mut hits = Vec::new();
        for doc in docs {
            hits.push(TaggedHit::Property { property: Box::new(doc.property), score: None });
            if let Some(neighborhood) = doc.neighborhood {
                hits.push(TaggedHit::Neighborhood { neighborhood: Box::new(neighborhood), score: None });
            }
            for link in &doc.wikipedia_articles {
                hits.push(TaggedHit::Wikipedia {
                    article: WikipediaHitView {
                        page_id: link.page_id.clone(),
                        title: link.title.clone(),
                        relevance_score: link.relevance_score,
                        confidence: link.confidence,
                        city: link.city.clone(),
                        state: link.state.clone(),
                    },
                    score: None,
                    highlights: vec![],
                });
            }
        }
        Self {
            title: title.into(),
            query: None,
            hits,
            total,
            took_ms,
        }
    }
}

impl Render for MixedEntityResult {
    fn title(&self) -> &str {
        &self.title
    }

    fn render(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "=== {} ===", self.title)?;
        if let Some(query) = &self.query {
            writeln!(w, "query: \"{}\"", query)?;
        }
        writeln!(w, "{} hits in {} ms", self.total, self.took_ms)?;
        for hit in &self.hits {
            match hit {
                TaggedHit::Property { property, score } => {
                    writeln!(
                        w,
                        "[property]     {}  ${:.0}  {}, {}",
                        property.listing_id, property.price, property.address.city, property.address.state
                    )?;
                    if let Some(score) = score {
                        writeln!(w, "               score: {:.4}", score)?;
                    }
                }
                TaggedHit::Neighborhood { neighborhood, .. } => {
                    writeln!(
                        w,
                        "[neighborhood] {}  {}, {}",
                        neighborhood.name, neighborhood.city, neighborhood.state
                    )?;
                }
                TaggedHit::Wikipedia { article, score, highlights } => {
                    writeln!(
                        w,
                        "[wikipedia]    {} (relevance {:.2}, confidence {:.2})",
                        article.title, article.relevance_score, article.confidence
                    )?;
                    if let Some(score) = score {
                        writeln!(w, "               score: {:.4}", score)?;
                    }
                    for highlight in highlights {
                        writeln!(w, "               … {}", highlight)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsView {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub sum: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketView {
    pub key: String,
    pub doc_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistogramBucketView {
    pub key: f64,
    pub doc_count: u64,
}

/// Buckets and stats; hits optional.
pub struct AggregationResult {
    pub title: String,
    pub stats: Option<StatsView>,
    pub property_types: Vec<BucketView>,
    pub by_city: Vec<BucketView>,
    pub histogram: Vec<HistogramBucketView>,
    pub total: u64,
    pub took_ms: u64,
}

impl AggregationResult {
    pub fn from_response(title: impl Into<String>, response: &SearchResponse) -> Self {
        let aggs = response.aggregations.clone().unwrap_or(Value::Null);

        let stats = aggs.get("price_stats").map(|s| StatsView {
            count: s["count"].as_u64().unwrap_or(0),
            min: s["min"].as_f64().unwrap_or(0.0),
            max: s["max"].as_f64().unwrap_or(0.0),
            avg: s["avg"].as_f64().unwrap_or(0.0),
            sum: s["sum"].as_f64().unwrap_or(0.0),
        });

        let bucket_views = |name: &str| -> Vec<BucketView> {
            aggs[name]["buckets"]
                .as_array()
                .map(|buckets| {
                    buckets
                        .iter()
                        .map(|b| BucketView {
                            key: b["key"].as_str().map(String::from).unwrap_or_else(|| b["key"].to_string()),
                            doc_count: b["doc_count"].as_u64().unwrap_or(0),
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        let histogram = aggs["price_histogram"]["buckets"]
            .as_array()
            .map(|buckets| {
                buckets
                    .iter()
                    .map(|b| HistogramBucketView {
                        key: b["key"].as_f64().unwrap_or(0.0),
                        doc_count: b["doc_count"].as_u64().unwrap_or(0),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            title: title.into(),
            stats,
            property_types: bucket_views("property_types"),
            by_city: bucket_views("by_city"),
            histogram,
            total: response.total,
            took_ms: response.took_ms,
        }
    }
}

impl Render for AggregationResult {
    fn title(&self) -> &str {
        &self.title
    }

    fn render(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "=== {} ===", self.title)?;
        writeln!(w, "{} matching documents in {} ms", self.total, self.took_ms)?;
        if let Some(stats) = &self.stats {
            writeln!(
                w,
                "price: count={} min=${:.0} max=${:.0} avg=${:.0}",
                stats.count, stats.min, stats.max, stats.avg
            )?;
        }
        if !self.property_types.is_empty() {
            writeln!(w, "by property type:")?;
            for bucket in &self.property_types {
                writeln!(w, "  {:<16} {}", bucket.key, bucket.doc_count)?;
            }
        }
        if !self.by_city.is_empty() {
            writeln!(w, "by city:")?;
            for bucket in &self.by_city {
                writeln!(w, "  {:<16} {}", bucket.key, bucket.doc_count)?;
            }
        }
        if !self.histogram.is_empty() {
            writeln!(w, "price histogram:")?;
            for bucket in &self.histogram {
                writeln!(w, "  ${:<10.0} {}", bucket.key, bucket.doc_count)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverlapStats {
    pub intersection: usize,
    pub only_a: usize,
    pub only_b: usize,
}

impl OverlapStats {
    pub fn compute<'a, A, B>(a: A, b: B) -> Self
    where
        A: IntoIterator<Item = &'a str>,
        B: IntoIterator<Item = &'a str>,
    {
        let set_a: HashSet<&str> = a.into_iter().collect();
        let set_b: HashSet<&str> = b.into_iter().collect();
        let intersection = set_a.intersection(&set_b).count();
        Self {
            intersection,
            only_a: set_a.len() - intersection,
            only_b: set_b.len() - intersection,
        }
    }
}

/// Two labeled result lists plus overlap statistics.
pub struct ComparisonResult {
    pub title: String,
    pub query: String,
    pub label_a: String,
    pub label_b: String,
    pub hits_a: Vec<PropertyHitView>,
    pub hits_b: Vec<PropertyHitView>,
    pub overlap: OverlapStats,
    pub took_ms: u64,
}

impl ComparisonResult {
    pub fn new(
        title: impl Into<String>,
        query: impl Into<String>,
        label_a: impl Into<String>,
        hits_a: Vec<PropertyHitView>,
        label_b: impl Into<String>,
        hits_b: Vec<PropertyHitView>,
        took_ms: u64,
    ) -> Self {
        let overlap = OverlapStats::compute(
            hits_a.iter().map(|h| h.property.listing_id.as_str()),
            hits_b.iter().map(|h| h.property.listing_id.as_str()),
        );
        Self {
            title: title.into(),
            query: query.into(),
            label_a: label_a.into(),
            label_b: label_b.into(),
            hits_a,
            hits_b,
            overlap,
            took_ms,
        }
    }
}

impl Render for ComparisonResult {
    fn title(&self) -> &str {
        &self.title
    }

    fn render(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "=== {} ===", self.title)?;
        writeln!(w, "query: \"{}\"", self.query)?;
        writeln!(w, "{}", self.label_a)?;
        for (index, hit) in self.hits_a.iter().enumerate() {
            write_property_line(w, index, hit)?;
        }
        writeln!(w, "{}", self.label_b)?;
        for (index, hit) in self.hits_b.iter().enumerate() {
            write_property_line(w, index, hit)?;
        }
        writeln!(
            w,
            "overlap: {} shared, {} only {}, {} only {}",
            self.overlap.intersection, self.overlap.only_a, self.label_a, self.overlap.only_b, self.label_b
        )
    }
}

/// A list of (query, result) pairs plus aggregate timings.
pub struct SemanticBatchResult {
    pub title: String,
    pub runs: Vec<(String, PropertyResult)>,
    pub total_ms: u64,
}

impl Render for SemanticBatchResult {
    fn title(&self) -> &str {
        &self.title
    }

    fn render(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "=== {} ===", self.title)?;
        writeln!(w, "{} queries in {} ms total", self.runs.len(), self.total_ms)?;
        for (query, result) in &self.runs {
            writeln!(w, "-- \"{}\" ({} hits, {} ms)", query, result.hits.len(), result.took_ms)?;
            for (index, hit) in result.hits.iter().take(3).enumerate() {
                write_property_line(w, index, hit)?;
            }
        }
        Ok(())
    }
}
