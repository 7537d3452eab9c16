//! Relationship builder
//!
//! Scans the property index in stable `listing_id` order and writes the
//! denormalized property-relationships index: each property joined with its
//! neighborhood and its linked Wikipedia articles. The build is idempotent;
//! rerunning replaces documents in place. Fetching the next page overlaps
//! joining and writing the previous one, with writes kept serialized.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use estatehub_config::{IndexNames, RelationshipConfig};
use estatehub_models::{
    EntityKind, Neighborhood, Property, PropertyRelationships, WikipediaArticle, WikipediaLink,
};
use estatehub_search::backend::Hit;
use estatehub_search::{Cancellation, MappingCatalog, QueryDoc, SearchBackend, SearchError, SearchResponse};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationshipStats {
    pub scanned: usize,
    pub written: usize,
    pub skipped_no_neighborhood: usize,
    pub failed: usize,
}

impl RelationshipStats {
    fn merge(&mut self, other: RelationshipStats) {
        self.scanned += other.scanned;
        self.written += other.written;
        self.skipped_no_neighborhood += other.skipped_no_neighborhood;
        self.failed += other.failed;
    }
}

#[derive(Debug, Clone)]
pub struct RelationshipBuilder {
    backend: Arc<SearchBackend>,
    catalog: MappingCatalog,
    indices: IndexNames,
    config: RelationshipConfig,
}

impl RelationshipBuilder {
    pub fn new(
        backend: Arc<SearchBackend>,
        catalog: MappingCatalog,
        indices: IndexNames,
        config: RelationshipConfig,
    ) -> Self {
        Self {
            backend,
            catalog,
            indices,
            config,
        }
    }

    /// Run the full build. With `rebuild` the relationships index is
    /// deleted and recreated first. Per-property failures are counted, not
    /// fatal; the returned stats tell the caller whether anything failed.
    pub async fn build(
        &self,
        rebuild: bool,
        cancel: &Cancellation,
    ) -> Result<RelationshipStats, SearchError> {
        let body = self.catalog.index_body(EntityKind::PropertyRelationships);
        self.backend
            .ensure_index(&self.indices.property_relationships, &body, rebuild)
            .await?;

        let mut stats = RelationshipStats::default();
        debug!(phase = "scanning", "relationship build started");

        let mut page = self.fetch_page(None, cancel).await?;
        while !page.hits.is_empty() {
            let hits = std::mem::take(&mut page.hits);
            let full_page = hits.len() >= self.config.batch_size;
            let cursor = hits.last().and_then(|h| h.sort.clone());

            // Overlap the next fetch with join+write of the current batch;
            // only one write is in flight at a time.
            let (next, processed) = tokio::join!(
                async {
                    if full_page {
                        self.fetch_page(cursor, cancel).await.map(Some)
                    } else {
                        Ok(None)
                    }
                },
                self.process_batch(hits, cancel),
            );

            stats.merge(processed?);
            match next? {
                Some(next_page) => page = next_page,
                None => break,
            }
        }

        if self.config.refresh_on_complete {
            self.backend.refresh(&self.indices.property_relationships).await?;
        }

        if stats.failed > 0 {
            warn!(
                "relationship build finished with failures: {:?}",
                stats
            );
            debug!(phase = "failed", "relationship build done");
        } else {
            info!(
                "✅ relationship build complete: scanned={} written={} skipped={}",
                stats.scanned, stats.written, stats.skipped_no_neighborhood
            );
            debug!(phase = "done", "relationship build done");
        }
        Ok(stats)
    }

    /// One `search_after` page of properties in `listing_id` order.
    async fn fetch_page(
        &self,
        after: Option<Value>,
        cancel: &Cancellation,
    ) -> Result<SearchResponse, SearchError> {
        let mut body = json!({
            "query": {"match_all": {}},
            "size": self.config.batch_size,
            "sort": [{"listing_id": "asc"}],
            "_source": {"excludes": ["embedding"]}
        });
        if let Some(after) = after {
            body["search_after"] = after;
        }
        self.backend
            .search(&[&self.indices.property], &QueryDoc::new(body), cancel)
            .await
    }

    /// Join one batch of properties and bulk-write the results.
    async fn process_batch(
        &self,
        hits: Vec<Hit>,
        cancel: &Cancellation,
    ) -> Result<RelationshipStats, SearchError> {
        let mut stats = RelationshipStats {
            scanned: hits.len(),
            ..Default::default()
        };

        let mut properties: Vec<Property> = Vec::with_capacity(hits.len());
        for hit in &hits {
            match serde_json::from_value::<Property>(hit.source.clone()) {
                Ok(property) => properties.push(property),
                Err(e) => {
                    warn!("unreadable property '{}': {}", hit.id, e);
                    stats.failed += 1;
                }
            }
        }

        debug!(phase = "joining", batch = properties.len(), "joining batch");

        let neighborhood_ids: Vec<&str> = properties
            .iter()
            .filter_map(|p| p.neighborhood_id.as_deref())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let neighborhoods = self.lookup_neighborhoods(&neighborhood_ids, cancel).await?;

        let location_pairs: HashSet<(String, String)> = properties
            .iter()
            .map(|p| (p.address.city.to_lowercase(), p.address.state.clone()))
            .collect();
        let articles = self
            .lookup_wikipedia_candidates(&neighborhoods, &location_pairs, cancel)
            .await?;

        let mut docs: Vec<(String, Value)> = Vec::with_capacity(properties.len());
        for property in properties {
            let Some(neighborhood_id) = property.neighborhood_id.clone() else {
                stats.skipped_no_neighborhood += 1;
                continue;
            };
            let neighborhood = neighborhoods.get(&neighborhood_id).cloned();
            let links = link_articles(
                &property,
                neighborhood.as_ref(),
                &articles,
                self.config.max_articles_per_property,
            );

            let doc = PropertyRelationships {
                listing_id: property.listing_id.clone(),
                property,
                neighborhood,
                wikipedia_articles: links,
                built_at: Utc::now(),
            };
            match serde_json::to_value(&doc) {
                Ok(value) => docs.push((doc.listing_id, value)),
                Err(e) => {
                    warn!("failed to serialize relationships for '{}': {}", doc.listing_id, e);
                    stats.failed += 1;
                }
            }
        }

        debug!(phase = "writing", docs = docs.len(), "writing batch");
        if !docs.is_empty() {
            let outcome = self
                .backend
                .bulk_write(&self.indices.property_relationships, &docs, false, cancel)
                .await?;
            stats.written += outcome.indexed;
            stats.failed += outcome.failed;
        }

        Ok(stats)
    }

    async fn lookup_neighborhoods(
        &self,
        ids: &[&str],
        cancel: &Cancellation,
    ) -> Result<HashMap<String, Neighborhood>, SearchError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let body = json!({
            "query": {"terms": {"neighborhood_id": ids}},
            "size": ids.len(),
            "_source": {"excludes": ["embedding"]}
        });
        let response = self
            .backend
            .search(&[&self.indices.neighborhood], &QueryDoc::new(body), cancel)
            .await?;

        let mut map = HashMap::with_capacity(response.hits.len());
        for hit in &response.hits {
            match serde_json::from_value::<Neighborhood>(hit.source.clone()) {
                Ok(neighborhood) => {
                    map.insert(neighborhood.neighborhood_id.clone(), neighborhood);
                }
                Err(e) => warn!("unreadable neighborhood '{}': {}", hit.id, e),
            }
        }
        Ok(map)
    }

    /// One candidate pool per batch: articles referenced explicitly by a
    /// neighborhood, located in any of the batch's (city, state) pairs, or
    /// mentioning a neighborhood name.
    async fn lookup_wikipedia_candidates(
        &self,
        neighborhoods: &HashMap<String, Neighborhood>,
        location_pairs: &HashSet<(String, String)>,
        cancel: &Cancellation,
    ) -> Result<Vec<WikipediaArticle>, SearchError> {
        let mut should: Vec<Value> = Vec::new();

        let explicit_ids: Vec<&str> = neighborhoods
            .values()
            .flat_map(|n| n.wikipedia_page_ids.iter().map(String::as_str))
            .collect();
        if !explicit_ids.is_empty() {
            should.push(json!({"terms": {"page_id": explicit_ids}}));
        }

        for (city, state) in location_pairs {
            should.push(json!({
                "bool": {
                    "must": [
                        {"term": {"location.city": city}},
                        {"term": {"location.state": state}}
                    ]
                }
            }));
        }

        for neighborhood in neighborhoods.values() {
            should.push(json!({
                "multi_match": {
                    "query": neighborhood.name,
                    "fields": ["title", "long_summary"]
                }
            }));
        }

        if should.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({
            "query": {"bool": {"should": should, "minimum_should_match": 1}},
            "size": 1000,
            "_source": {"excludes": ["embedding", "full_content"]}
        });
        let response = self
            .backend
            .search(&[&self.indices.wikipedia], &QueryDoc::new(body), cancel)
            .await?;

        let mut articles = Vec::with_capacity(response.hits.len());
        for hit in &response.hits {
            match serde_json::from_value::<WikipediaArticle>(hit.source.clone()) {
                Ok(article) => articles.push(article),
                Err(e) => warn!("unreadable article '{}': {}", hit.id, e),
            }
        }
        Ok(articles)
    }
}

/// Select and order the articles for one property: explicit neighborhood
/// references, location matches, and neighborhood-name mentions, deduped by
/// `page_id`, ordered by relevance desc / confidence desc / page_id asc,
/// truncated to the configured maximum.
fn link_articles(
    property: &Property,
    neighborhood: Option<&Neighborhood>,
    candidates: &[WikipediaArticle],
    max_articles: usize,
) -> Vec<WikipediaLink> {
    let city = property.address.city.to_lowercase();
    let state = &property.address.state;
    let explicit: HashSet<&str> = neighborhood
        .map(|n| n.wikipedia_page_ids.iter().map(String::as_str).collect())
        .unwrap_or_default();
    let neighborhood_name = neighborhood.map(|n| n.name.to_lowercase());

    let mut links: Vec<WikipediaLink> = candidates
        .iter()
        .filter(|article| {
            if explicit.contains(article.page_id.as_str()) {
                return true;
            }
            let location_match = article
                .location
                .city
                .as_deref()
                .map(|c| c.eq_ignore_ascii_case(&city))
                .unwrap_or(false)
                && article.location.state.as_deref() == Some(state.as_str());
            if location_match {
                return true;
            }
            if let Some(name) = &neighborhood_name {
                return article.title.to_lowercase().contains(name)
                    || article.long_summary.to_lowercase().contains(name);
            }
            false
        })
        .map(WikipediaLink::from)
        .collect();

    PropertyRelationships::normalize_articles(&mut links, max_articles);
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use estatehub_models::{Address, ArticleLocation, PropertyType};

    fn property(city: &str, state: &str, neighborhood_id: Option<&str>) -> Property {
        Property {
            listing_id: "p1".to_string(),
            neighborhood_id: neighborhood_id.map(String::from),
            address: Address {
                street: "1 Elm St".to_string(),
                city: city.to_string(),
                state: state.to_string(),
                zip: "94100".to_string(),
                location: None,
            },
            property_type: PropertyType::Condo,
            price: 500_000.0,
            bedrooms: 2,
            bathrooms: 1.0,
            square_feet: Some(800),
            year_built: None,
            description: String::new(),
            features: vec![],
            amenities: vec![],
            status: None,
            listing_date: None,
            days_on_market: None,
            parking_spaces: None,
            price_per_sqft: None,
            search_tags: vec![],
            price_history: vec![],
            embedding: None,
        }
    }

    fn article(page_id: &str, city: Option<&str>, state: Option<&str>, relevance: f32) -> WikipediaArticle {
        WikipediaArticle {
            page_id: page_id.to_string(),
            title: format!("Article {}", page_id),
            url: None,
            long_summary: String::new(),
            full_content: String::new(),
            categories: vec![],
            key_topics: vec![],
            location: ArticleLocation {
                city: city.map(String::from),
                state: state.map(String::from),
            },
            relevance_score: relevance,
            confidence: 0.5,
            embedding: None,
        }
    }

    fn neighborhood(id: &str, name: &str) -> Neighborhood {
        Neighborhood {
            neighborhood_id: id.to_string(),
            name: name.to_string(),
            city: "san francisco".to_string(),
            state: "CA".to_string(),
            description: String::new(),
            boundaries: None,
            demographics: Default::default(),
            lifestyle_tags: vec![],
            walkability_score: None,
            school_rating: None,
            wikipedia_page_ids: vec![],
            embedding: None,
        }
    }

    #[test]
    fn location_matched_articles_are_linked_and_ordered() {
        let property = property("sf", "CA", Some("n1"));
        let candidates = vec![
            article("w1", Some("sf"), Some("CA"), 0.7),
            article("w2", Some("sf"), Some("CA"), 0.9),
            article("w3", Some("los angeles"), Some("CA"), 0.95),
        ];
        let links = link_articles(&property, None, &candidates, 10);
        let ids: Vec<&str> = links.iter().map(|l| l.page_id.as_str()).collect();
        assert_eq!(ids, vec!["w2", "w1"]);
    }

    #[test]
    fn neighborhood_name_mentions_are_linked() {
        let property = property("san francisco", "CA", Some("n1"));
        let hood = neighborhood("n1", "Mission District");
        let mut mention = article("w9", None, None, 0.5);
        mention.title = "History of the Mission District".to_string();
        let links = link_articles(&property, Some(&hood), &[mention], 10);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].page_id, "w9");
    }

    #[test]
    fn explicit_references_are_always_linked() {
        let property = property("oakland", "CA", Some("n1"));
        let mut hood = neighborhood("n1", "Rockridge");
        hood.wikipedia_page_ids = vec!["w42".to_string()];
        let unrelated = article("w42", Some("denver"), Some("CO"), 0.4);
        let links = link_articles(&property, Some(&hood), &[unrelated], 10);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].page_id, "w42");
    }

    #[test]
    fn links_truncate_to_max_articles() {
        let property = property("sf", "CA", Some("n1"));
        let candidates: Vec<WikipediaArticle> = (0..15)
            .map(|i| article(&format!("w{:02}", i), Some("sf"), Some("CA"), 0.5))
            .collect();
        let links = link_articles(&property, None, &candidates, 10);
        assert_eq!(links.len(), 10);
    }

    #[test]
    fn stats_merge_accumulates() {
        let mut stats = RelationshipStats::default();
        stats.merge(RelationshipStats { scanned: 500, written: 480, skipped_no_neighborhood: 15, failed: 5 });
        stats.merge(RelationshipStats { scanned: 200, written: 200, skipped_no_neighborhood: 0, failed: 0 });
        assert_eq!(stats.scanned, 700);
        assert_eq!(stats.written, 680);
        assert_eq!(stats.skipped_no_neighborhood, 15);
        assert_eq!(stats.failed, 5);
    }
}
