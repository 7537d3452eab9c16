//! Index mapping catalog
//!
//! Generates the settings and mappings for every index: custom analyzers,
//! keyword fields, geo points, and the dense-vector field. Bulk loads run
//! with a relaxed refresh interval that is restored on completion.

use serde_json::{json, Value};

use estatehub_config::{EmbeddingConfig, HybridConfig};
use estatehub_models::EntityKind;

#[derive(Debug, Clone)]
pub struct MappingCatalog {
    dimension: usize,
    hnsw_m: u32,
    hnsw_ef_construction: u32,
}

impl MappingCatalog {
    pub fn new(embedding: &EmbeddingConfig, hybrid: &HybridConfig) -> Self {
        Self {
            dimension: embedding.dimension,
            hnsw_m: hybrid.hnsw_m,
            hnsw_ef_construction: hybrid.hnsw_ef_construction,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Full index body ({settings, mappings}) for one entity family.
    pub fn index_body(&self, kind: EntityKind) -> Value {
        json!({
            "settings": Self::load_settings(),
            "mappings": self.mappings_for(kind),
        })
    }

    /// Single shard, no replicas, refresh disabled while loading.
    pub fn load_settings() -> Value {
        json!({
            "number_of_shards": 1,
            "number_of_replicas": 0,
            "refresh_interval": "-1",
            "analysis": Self::analysis(),
        })
    }

    /// Settings restored once a bulk load finishes.
    pub fn live_settings() -> Value {
        json!({"index": {"refresh_interval": "1s"}})
    }

    pub fn relaxed_settings() -> Value {
        json!({"index": {"refresh_interval": "-1"}})
    }

    fn analysis() -> Value {
        json!({
            "normalizer": {
                "lowercase_normalizer": {"type": "custom", "filter": ["lowercase"]}
            },
            "filter": {
                "english_stemmer": {"type": "stemmer", "language": "english"},
                "english_stop": {"type": "stop", "stopwords": "_english_"},
                "shingle_filter": {"type": "shingle", "min_shingle_size": 2, "max_shingle_size": 3}
            },
            "analyzer": {
                "property_analyzer": {
                    "type": "custom",
                    "tokenizer": "standard",
                    "filter": ["lowercase", "english_stop", "english_stemmer"]
                },
                "address_analyzer": {
                    "type": "custom",
                    "tokenizer": "standard",
                    "filter": ["lowercase"]
                },
                "feature_analyzer": {
                    "type": "custom",
                    "tokenizer": "keyword",
                    "filter": ["lowercase"]
                },
                "wikipedia_analyzer": {
                    "type": "custom",
                    "tokenizer": "standard",
                    "filter": ["lowercase", "shingle_filter", "english_stemmer"]
                }
            }
        })
    }

    fn dense_vector(&self) -> Value {
        json!({
            "type": "dense_vector",
            "dims": self.dimension,
            "index": true,
            "similarity": "cosine",
            "index_options": {
                "type": "hnsw",
                "m": self.hnsw_m,
                "ef_construction": self.hnsw_ef_construction
            }
        })
    }

    pub fn mappings_for(&self, kind: EntityKind) -> Value {
        match kind {
            EntityKind::Property => self.property_mappings(),
            EntityKind::Neighborhood => self.neighborhood_mappings(),
            EntityKind::Wikipedia => self.wikipedia_mappings(),
            EntityKind::PropertyRelationships => self.relationships_mappings(),
        }
    }

    fn address_mapping() -> Value {
        json!({
            "properties": {
                "street": {"type": "text", "analyzer": "address_analyzer"},
                "city": {
                    "type": "keyword",
                    "normalizer": "lowercase_normalizer",
                    "fields": {"text": {"type": "text", "analyzer": "address_analyzer"}}
                },
                "state": {"type": "keyword"},
                "zip": {"type": "keyword"},
                "location": {"type": "geo_point"}
            }
        })
    }

    fn property_mappings(&self) -> Value {
        json!({
            "properties": {
                "listing_id": {"type": "keyword"},
                "neighborhood_id": {"type": "keyword"},
                "address": Self::address_mapping(),
                "property_type": {"type": "keyword"},
                "price": {"type": "double"},
                "bedrooms": {"type": "integer"},
                "bathrooms": {"type": "float"},
                "square_feet": {"type": "integer"},
                "year_built": {"type": "integer"},
                "description": {
                    "type": "text",
                    "analyzer": "property_analyzer",
                    "fields": {"keyword": {"type": "keyword", "ignore_above": 256}}
                },
                "features": {"type": "text", "analyzer": "feature_analyzer", "fields": {"keyword": {"type": "keyword"}}},
                "amenities": {"type": "text", "analyzer": "feature_analyzer", "fields": {"keyword": {"type": "keyword"}}},
                "status": {"type": "keyword"},
                "listing_date": {"type": "date"},
                "days_on_market": {"type": "integer"},
                "parking_spaces": {"type": "integer"},
                "price_per_sqft": {"type": "double"},
                "search_tags": {"type": "keyword"},
                "price_history": {
                    "properties": {
                        "date": {"type": "date"},
                        "price": {"type": "double"}
                    }
                },
                "embedding": self.dense_vector()
            }
        })
    }

    fn neighborhood_mappings(&self) -> Value {
        json!({
            "properties": {
                "neighborhood_id": {"type": "keyword"},
                "name": {
                    "type": "text",
                    "analyzer": "address_analyzer",
                    "fields": {"keyword": {"type": "keyword"}}
                },
                "city": {"type": "keyword", "normalizer": "lowercase_normalizer"},
                "state": {"type": "keyword"},
                "description": {"type": "text", "analyzer": "property_analyzer"},
                "boundaries": {"type": "geo_shape"},
                "demographics": {
                    "properties": {
                        "population": {"type": "long"},
                        "median_income": {"type": "double"},
                        "median_age": {"type": "float"}
                    }
                },
                "lifestyle_tags": {"type": "keyword"},
                "walkability_score": {"type": "float"},
                "school_rating": {"type": "float"},
                "wikipedia_page_ids": {"type": "keyword"},
                "embedding": self.dense_vector()
            }
        })
    }

    fn wikipedia_mappings(&self) -> Value {
        json!({
            "properties": {
                "page_id": {"type": "keyword"},
                "title": {
                    "type": "text",
                    "analyzer": "wikipedia_analyzer",
                    "fields": {"keyword": {"type": "keyword"}}
                },
                "url": {"type": "keyword"},
                "long_summary": {"type": "text", "analyzer": "wikipedia_analyzer"},
                "full_content": {"type": "text", "analyzer": "wikipedia_analyzer"},
                "categories": {"type": "keyword"},
                "key_topics": {"type": "keyword"},
                "location": {
                    "properties": {
                        "city": {"type": "keyword", "normalizer": "lowercase_normalizer"},
                        "state": {"type": "keyword"}
                    }
                },
                "relevance_score": {"type": "float"},
                "confidence": {"type": "float"},
                "embedding": self.dense_vector()
            }
        })
    }

    fn relationships_mappings(&self) -> Value {
        json!({
            "properties": {
                "listing_id": {"type": "keyword"},
                "property": self.property_mappings(),
                "neighborhood": self.neighborhood_mappings(),
                "wikipedia_articles": {
                    "properties": {
                        "page_id": {"type": "keyword"},
                        "title": {"type": "text", "fields": {"keyword": {"type": "keyword"}}},
                        "relevance_score": {"type": "float"},
                        "confidence": {"type": "float"},
                        "city": {"type": "keyword"},
                        "state": {"type": "keyword"}
                    }
                },
                "built_at": {"type": "date"}
            }
        })
    }
}

/// Diff an existing mapping against the desired one. Shared fields must
/// agree on type (and dims for dense vectors); fields only present in the
/// desired mapping are additions and do not conflict.
pub fn check_compatibility(existing: &Value, desired: &Value) -> Result<(), String> {
    fn walk(existing: &Value, desired: &Value, path: &str) -> Result<(), String> {
        let Some(desired_props) = desired["properties"].as_object() else {
            return Ok(());
        };
        let existing_props = existing["properties"].as_object();

        for (field, desired_field) in desired_props {
            let Some(existing_field) = existing_props.and_then(|p| p.get(field)) else {
                continue;
            };
            let field_path = if path.is_empty() {
                field.clone()
            } else {
                format!("{}.{}", path, field)
            };

            let desired_type = desired_field["type"].as_str();
            let existing_type = existing_field["type"].as_str();
            match (existing_type, desired_type) {
                (Some(existing_type), Some(desired_type)) if existing_type != desired_type => {
                    return Err(format!(
                        "field '{}' is '{}' but '{}' is required",
                        field_path, existing_type, desired_type
                    ));
                }
                _ => {}
            }

            if desired_type == Some("dense_vector") {
                let desired_dims = desired_field["dims"].as_u64();
                let existing_dims = existing_field["dims"].as_u64();
                if existing_dims.is_some() && existing_dims != desired_dims {
                    return Err(format!(
                        "dense vector '{}' has dims {:?}, expected {:?}",
                        field_path, existing_dims, desired_dims
                    ));
                }
            }

            walk(existing_field, desired_field, &field_path)?;
        }
        Ok(())
    }

    walk(existing, desired, "")
}
