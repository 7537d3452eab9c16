//! Query construction
//!
//! Builds every query document the engine issues: lexical, filtered, geo,
//! aggregation, Wikipedia full-text, k-NN, hybrid (RRF), and relationship
//! lookups. Builders only produce documents; execution lives elsewhere.
//! All structured constraints land in non-scoring filter context, and the
//! hybrid builder attaches one shared filter to both retriever legs.

use serde_json::{json, Value};

use estatehub_config::HybridConfig;
use estatehub_models::{GeoFilter, PriceRange, SearchFilters};

use crate::location::LocationIntent;

/// An opaque query document, serialized to the backend wire form at the
/// edge of the system.
#[derive(Debug, Clone)]
pub struct QueryDoc(Value);

impl QueryDoc {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    pub fn body(&self) -> &Value {
        &self.0
    }

    pub fn into_body(self) -> Value {
        self.0
    }
}

/// Fields searched by the lexical property retriever, with boosts.
const LEXICAL_FIELDS: [&str; 6] = [
    "description^2.0",
    "features^1.5",
    "amenities^1.5",
    "address.street",
    "address.city",
    "neighborhood.name",
];

/// Translate structured filters into non-scoring clauses.
pub fn filter_clauses(filters: &SearchFilters) -> Vec<Value> {
    let mut clauses = Vec::new();

    if !filters.price_range.is_empty() {
        clauses.push(price_range_clause(&filters.price_range));
    }
    if filters.bedrooms_min.is_some() || filters.bedrooms_max.is_some() {
        let mut range = serde_json::Map::new();
        if let Some(min) = filters.bedrooms_min {
            range.insert("gte".to_string(), json!(min));
        }
        if let Some(max) = filters.bedrooms_max {
            range.insert("lte".to_string(), json!(max));
        }
        clauses.push(json!({"range": {"bedrooms": range}}));
    }
    if filters.bathrooms_min.is_some() || filters.bathrooms_max.is_some() {
        let mut range = serde_json::Map::new();
        if let Some(min) = filters.bathrooms_min {
            range.insert("gte".to_string(), json!(min));
        }
        if let Some(max) = filters.bathrooms_max {
            range.insert("lte".to_string(), json!(max));
        }
        clauses.push(json!({"range": {"bathrooms": range}}));
    }
    if !filters.property_types.is_empty() {
        let types: Vec<&str> = filters.property_types.iter().map(|t| t.as_str()).collect();
        clauses.push(json!({"terms": {"property_type": types}}));
    }
    if !filters.cities.is_empty() {
        let cities: Vec<String> = filters.cities.iter().map(|c| c.to_lowercase()).collect();
        clauses.push(json!({"terms": {"address.city": cities}}));
    }
    if !filters.states.is_empty() {
        clauses.push(json!({"terms": {"address.state": filters.states}}));
    }
    if !filters.features.is_empty() {
        for feature in &filters.features {
            clauses.push(json!({"term": {"search_tags": feature.to_lowercase()}}));
        }
    }
    if !filters.status.is_empty() {
        clauses.push(json!({"terms": {"status": filters.status}}));
    }
    if let Some(geo) = &filters.geo {
        clauses.push(geo_clause(geo));
    }
    if filters.listed_after.is_some() || filters.listed_before.is_some() {
        let mut range = serde_json::Map::new();
        if let Some(after) = filters.listed_after {
            range.insert("gte".to_string(), json!(after));
        }
        if let Some(before) = filters.listed_before {
            range.insert("lte".to_string(), json!(before));
        }
        clauses.push(json!({"range": {"listing_date": range}}));
    }
    if let Some(max_days) = filters.max_days_on_market {
        clauses.push(json!({"range": {"days_on_market": {"lte": max_days}}}));
    }
    if let Some(has_parking) = filters.has_parking {
        if has_parking {
            clauses.push(json!({"range": {"parking_spaces": {"gte": 1}}}));
        } else {
            clauses.push(json!({"bool": {"must_not": {"range": {"parking_spaces": {"gte": 1}}}}}));
        }
    }

    clauses
}

fn price_range_clause(range: &PriceRange) -> Value {
    let mut bounds = serde_json::Map::new();
    if let Some(min) = range.min {
        bounds.insert("gte".to_string(), json!(min));
    }
    if let Some(max) = range.max {
        bounds.insert("lte".to_string(), json!(max));
    }
    json!({"range": {"price": bounds}})
}

fn geo_clause(geo: &GeoFilter) -> Value {
    json!({
        "geo_distance": {
            "distance": format!("{}{}", geo.radius, geo.unit.as_str()),
            "address.location": {"lat": geo.center.lat, "lon": geo.center.lon}
        }
    })
}

/// Clauses derived from extracted location intent: terms on `address.city`
/// (lowercased) and/or `address.state`.
pub fn location_clauses(intent: &LocationIntent) -> Vec<Value> {
    let mut clauses = Vec::new();
    if let Some(city) = &intent.city {
        clauses.push(json!({"term": {"address.city": city}}));
    }
    if let Some(state) = &intent.state {
        clauses.push(json!({"term": {"address.state": state}}));
    }
    clauses
}

/// The single filter shared by both hybrid legs: location intent AND'd with
/// user-supplied filters. `None` when nothing constrains the query.
pub fn combined_filter(intent: Option<&LocationIntent>, filters: &SearchFilters) -> Option<Value> {
    let mut clauses = intent.map(location_clauses).unwrap_or_default();
    clauses.extend(filter_clauses(filters));
    if clauses.is_empty() {
        None
    } else {
        Some(json!({"bool": {"filter": clauses}}))
    }
}

fn source_excludes() -> Value {
    json!({"excludes": ["embedding"]})
}

fn lexical_clause(text: &str) -> Value {
    json!({
        "multi_match": {
            "query": text,
            "type": "best_fields",
            "fields": LEXICAL_FIELDS,
            "fuzziness": "AUTO"
        }
    })
}

/// Lexical property search with optional shared filter and highlights.
pub fn lexical_query(text: &str, shared_filter: Option<&Value>, size: usize) -> QueryDoc {
    let mut bool_query = json!({"must": [lexical_clause(text)]});
    if let Some(filter) = shared_filter {
        bool_query["filter"] = json!([filter.clone()]);
    }
    QueryDoc::new(json!({
        "query": {"bool": bool_query},
        "size": size,
        "_source": source_excludes(),
        "highlight": {"fields": {"description": {}}}
    }))
}

/// Pure filter search; every clause in filter context, no scoring.
pub fn filtered_query(filters: &SearchFilters, size: usize) -> QueryDoc {
    QueryDoc::new(json!({
        "query": {"bool": {"filter": filter_clauses(filters)}},
        "size": size,
        "_source": source_excludes(),
        "sort": [{"price": {"order": "asc"}}]
    }))
}

/// Geo-distance search with an optional text query in scoring context.
pub fn geo_query(text: Option<&str>, geo: &GeoFilter, filters: &SearchFilters, size: usize) -> QueryDoc {
    let mut clauses = vec![geo_clause(geo)];
    clauses.extend(filter_clauses(filters));

    let query = match text {
        Some(text) if !text.trim().is_empty() => {
            json!({"bool": {"must": [lexical_clause(text)], "filter": clauses}})
        }
        _ => json!({"bool": {"filter": clauses}}),
    };

    QueryDoc::new(json!({
        "query": query,
        "size": size,
        "_source": source_excludes(),
        "sort": [
            {"_geo_distance": {
                "address.location": {"lat": geo.center.lat, "lon": geo.center.lon},
                "order": "asc",
                "unit": geo.unit.as_str()
            }}
        ]
    }))
}

/// Price-range search carrying stats, terms, and histogram aggregations in
/// one request.
pub fn price_aggregation_query(range: &PriceRange, histogram_interval: f64, size: usize) -> QueryDoc {
    QueryDoc::new(json!({
        "query": {"bool": {"filter": [price_range_clause(range)]}},
        "size": size,
        "_source": source_excludes(),
        "aggs": price_aggs(histogram_interval)
    }))
}

/// Aggregation-only request: no hits, terms + stats + histogram.
pub fn aggregation_only_query(filters: &SearchFilters, histogram_interval: f64) -> QueryDoc {
    let clauses = filter_clauses(filters);
    let query = if clauses.is_empty() {
        json!({"match_all": {}})
    } else {
        json!({"bool": {"filter": clauses}})
    };
    QueryDoc::new(json!({
        "query": query,
        "size": 0,
        "aggs": price_aggs(histogram_interval)
    }))
}

fn price_aggs(histogram_interval: f64) -> Value {
    json!({
        "price_stats": {"stats": {"field": "price"}},
        "property_types": {"terms": {"field": "property_type", "size": 5}},
        "price_histogram": {"histogram": {"field": "price", "interval": histogram_interval}},
        "by_city": {"terms": {"field": "address.city", "size": 10}}
    })
}

/// Wikipedia full-text: must-match on `full_content`, optional should
/// cluster of related terms, optional category/location filters.
pub fn wikipedia_query(
    text: &str,
    related_terms: &[&str],
    categories: &[&str],
    location: Option<(&str, &str)>,
    size: usize,
) -> QueryDoc {
    let mut bool_query = serde_json::Map::new();
    bool_query.insert(
        "must".to_string(),
        json!([{"match": {"full_content": {"query": text}}}]),
    );

    if !related_terms.is_empty() {
        let shoulds: Vec<Value> = related_terms
            .iter()
            .map(|term| json!({"match": {"full_content": {"query": term, "boost": 0.5}}}))
            .collect();
        bool_query.insert("should".to_string(), json!(shoulds));
    }

    let mut filter = Vec::new();
    if !categories.is_empty() {
        filter.push(json!({"terms": {"categories": categories}}));
    }
    if let Some((city, state)) = location {
        filter.push(json!({"term": {"location.city": city.to_lowercase()}}));
        filter.push(json!({"term": {"location.state": state}}));
    }
    if !filter.is_empty() {
        bool_query.insert("filter".to_string(), json!(filter));
    }

    QueryDoc::new(json!({
        "query": {"bool": bool_query},
        "size": size,
        "_source": {"excludes": ["embedding", "full_content"]},
        "highlight": {"fields": {"full_content": {"fragment_size": 150, "number_of_fragments": 2}}}
    }))
}

/// k-NN semantic search. `num_candidates` is widened to at least
/// `max(2k, 100)` so recall does not collapse for small k.
pub fn knn_query(vector: &[f32], k: usize, shared_filter: Option<&Value>, size: usize) -> QueryDoc {
    let mut knn = json!({
        "field": "embedding",
        "query_vector": vector,
        "k": k,
        "num_candidates": num_candidates_for(k)
    });
    if let Some(filter) = shared_filter {
        knn["filter"] = filter.clone();
    }
    QueryDoc::new(json!({
        "knn": knn,
        "size": size,
        "_source": source_excludes()
    }))
}

pub fn num_candidates_for(k: usize) -> usize {
    (2 * k).max(100)
}

/// The hybrid query in both executable forms: one native RRF request, and
/// the two standalone legs for client-side fusion. The same shared filter
/// value is attached to every leg.
#[derive(Debug, Clone)]
pub struct HybridQuery {
    pub native: QueryDoc,
    pub lexical_leg: QueryDoc,
    pub knn_leg: QueryDoc,
}

pub fn hybrid_query(
    text: &str,
    vector: &[f32],
    shared_filter: Option<&Value>,
    hybrid: &HybridConfig,
    size: usize,
) -> HybridQuery {
    let window = hybrid.rank_window_size;
    let k = hybrid.knn_k;
    let num_candidates = num_candidates_for(k).max(hybrid.knn_num_candidates);

    let mut lexical_bool = json!({"must": [lexical_clause(text)]});
    if let Some(filter) = shared_filter {
        lexical_bool["filter"] = json!([filter.clone()]);
    }

    let mut knn_retriever = json!({
        "field": "embedding",
        "query_vector": vector,
        "k": k,
        "num_candidates": num_candidates
    });
    if let Some(filter) = shared_filter {
        knn_retriever["filter"] = filter.clone();
    }

    let native = QueryDoc::new(json!({
        "retriever": {
            "rrf": {
                "retrievers": [
                    {"standard": {"query": {"bool": lexical_bool.clone()}}},
                    {"knn": knn_retriever.clone()}
                ],
                "rank_constant": hybrid.rank_constant,
                "rank_window_size": window
            }
        },
        "size": size,
        "_source": source_excludes()
    }));

    let lexical_leg = QueryDoc::new(json!({
        "query": {"bool": lexical_bool},
        "size": window,
        "_source": source_excludes()
    }));

    let knn_leg = QueryDoc::new(json!({
        "knn": knn_retriever,
        "size": window,
        "_source": source_excludes()
    }));

    HybridQuery { native, lexical_leg, knn_leg }
}

/// Terms lookup against the property-relationships index.
pub fn relationship_lookup(listing_ids: &[&str], size: usize) -> QueryDoc {
    QueryDoc::new(json!({
        "query": {"terms": {"listing_id": listing_ids}},
        "size": size,
        "_source": {"excludes": ["property.embedding", "neighborhood.embedding"]}
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use estatehub_models::{DistanceUnit, GeoPoint, PropertyType};

    use crate::location::LocationExtractor;

    #[test]
    fn lexical_query_uses_boosted_fields_and_fuzziness() {
        let doc = lexical_query("modern kitchen", None, 10);
        let multi_match = &doc.body()["query"]["bool"]["must"][0]["multi_match"];
        assert_eq!(multi_match["type"], "best_fields");
        assert_eq!(multi_match["fuzziness"], "AUTO");
        let fields = multi_match["fields"].as_array().unwrap();
        assert!(fields.contains(&json!("description^2.0")));
        assert!(fields.contains(&json!("neighborhood.name")));
    }

    #[test]
    fn filtered_query_is_non_scoring() {
        let filters = SearchFilters {
            bedrooms_min: Some(2),
            property_types: vec![PropertyType::Condo],
            ..Default::default()
        };
        let doc = filtered_query(&filters, 10);
        let bool_query = &doc.body()["query"]["bool"];
        assert!(bool_query.get("must").is_none());
        assert_eq!(bool_query["filter"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn city_filter_is_lowercased() {
        let filters = SearchFilters {
            cities: vec!["San Francisco".to_string()],
            ..Default::default()
        };
        let clauses = filter_clauses(&filters);
        assert_eq!(clauses[0]["terms"]["address.city"][0], "san francisco");
    }

    #[test]
    fn geo_query_formats_distance_with_unit() {
        let geo = GeoFilter {
            center: GeoPoint { lat: 37.77, lon: -122.42 },
            radius: 5.0,
            unit: DistanceUnit::Km,
        };
        let doc = geo_query(None, &geo, &SearchFilters::default(), 10);
        let clause = &doc.body()["query"]["bool"]["filter"][0]["geo_distance"];
        assert_eq!(clause["distance"], "5km");
        assert_eq!(clause["address.location"]["lat"], 37.77);
    }

    #[test]
    fn aggregation_only_query_returns_no_hits() {
        let doc = aggregation_only_query(&SearchFilters::default(), 100_000.0);
        assert_eq!(doc.body()["size"], 0);
        let aggs = &doc.body()["aggs"];
        assert!(aggs["price_stats"]["stats"].is_object());
        assert_eq!(aggs["property_types"]["terms"]["size"], 5);
        assert_eq!(aggs["price_histogram"]["histogram"]["interval"], 100_000.0);
    }

    #[test]
    fn knn_num_candidates_floor_is_100() {
        assert_eq!(num_candidates_for(10), 100);
        assert_eq!(num_candidates_for(50), 100);
        assert_eq!(num_candidates_for(80), 160);
    }

    #[test]
    fn knn_query_carries_vector_and_filter() {
        let filter = json!({"bool": {"filter": [{"term": {"address.state": "CA"}}]}});
        let doc = knn_query(&[0.1, 0.2], 10, Some(&filter), 10);
        let knn = &doc.body()["knn"];
        assert_eq!(knn["k"], 10);
        assert_eq!(knn["num_candidates"], 100);
        assert_eq!(knn["filter"], filter);
    }

    #[test]
    fn hybrid_legs_share_an_identical_filter() {
        let extractor = LocationExtractor::new();
        let intent = extractor.extract("modern kitchen with stainless steel appliances in San Francisco");
        let shared = combined_filter(Some(&intent), &SearchFilters::default()).unwrap();
        let hybrid = hybrid_query(
            &intent.cleaned_query,
            &[0.0; 4],
            Some(&shared),
            &HybridConfig::default(),
            10,
        );

        let lexical_filter = &hybrid.lexical_leg.body()["query"]["bool"]["filter"][0];
        let knn_filter = &hybrid.knn_leg.body()["knn"]["filter"];
        assert_eq!(lexical_filter, knn_filter);

        // Both legs carry the city and state terms from location intent
        let clauses = lexical_filter["bool"]["filter"].as_array().unwrap();
        assert!(clauses.contains(&json!({"term": {"address.city": "san francisco"}})));
        assert!(clauses.contains(&json!({"term": {"address.state": "CA"}})));

        // The native form fuses the same two retrievers
        let rrf = &hybrid.native.body()["retriever"]["rrf"];
        assert_eq!(rrf["rank_constant"], 60);
        assert_eq!(rrf["rank_window_size"], 100);
        assert_eq!(rrf["retrievers"].as_array().unwrap().len(), 2);
        assert_eq!(
            rrf["retrievers"][0]["standard"]["query"]["bool"]["filter"][0],
            *knn_filter
        );
        assert_eq!(rrf["retrievers"][1]["knn"]["filter"], *knn_filter);
    }

    #[test]
    fn hybrid_filter_combines_intent_and_user_filters() {
        let extractor = LocationExtractor::new();
        let intent = extractor.extract("condo in Oakland");
        let filters = SearchFilters {
            price_range: PriceRange::between(400_000.0, 800_000.0),
            ..Default::default()
        };
        let shared = combined_filter(Some(&intent), &filters).unwrap();
        let clauses = shared["bool"]["filter"].as_array().unwrap();
        assert_eq!(clauses.len(), 3);
    }

    #[test]
    fn wikipedia_query_shape() {
        let doc = wikipedia_query(
            "gold rush history",
            &["49ers", "mining"],
            &["History of California"],
            Some(("San Francisco", "CA")),
            5,
        );
        let bool_query = &doc.body()["query"]["bool"];
        assert_eq!(bool_query["must"][0]["match"]["full_content"]["query"], "gold rush history");
        assert_eq!(bool_query["should"].as_array().unwrap().len(), 2);
        let filter = bool_query["filter"].as_array().unwrap();
        assert!(filter.contains(&json!({"term": {"location.city": "san francisco"}})));
    }

    #[test]
    fn relationship_lookup_is_a_terms_query() {
        let doc = relationship_lookup(&["prop-1", "prop-2"], 10);
        assert_eq!(doc.body()["query"]["terms"]["listing_id"].as_array().unwrap().len(), 2);
    }
}
