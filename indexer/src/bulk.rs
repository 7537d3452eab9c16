//! Bulk indexer
//!
//! Streaming batched writes into the primary indices. Document ids are
//! always explicit, batches have a configurable size, and a bad document
//! fails alone: it is counted and logged, never aborts its batch. One
//! writer runs per entity index; writers for different entities may run
//! concurrently.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use validator::Validate;

use estatehub_config::IndexNames;
use estatehub_models::{EntityKind, Neighborhood, Property, WikipediaArticle};
use estatehub_search::backend::BulkItemError;
use estatehub_search::{BulkOutcome, Cancellation, MappingCatalog, SearchBackend, SearchError};

#[derive(Debug, Clone)]
pub struct BulkIndexer {
    backend: Arc<SearchBackend>,
    catalog: MappingCatalog,
    indices: IndexNames,
    batch_size: usize,
}

impl BulkIndexer {
    pub fn new(
        backend: Arc<SearchBackend>,
        catalog: MappingCatalog,
        indices: IndexNames,
        batch_size: usize,
    ) -> Self {
        Self {
            backend,
            catalog,
            indices,
            batch_size: batch_size.max(1),
        }
    }

    pub fn index_name(&self, kind: EntityKind) -> &str {
        match kind {
            EntityKind::Property => &self.indices.property,
            EntityKind::Neighborhood => &self.indices.neighborhood,
            EntityKind::Wikipedia => &self.indices.wikipedia,
            EntityKind::PropertyRelationships => &self.indices.property_relationships,
        }
    }

    /// Create the index for `kind` with its catalog mapping. An existing
    /// incompatible index is a `SchemaConflict` unless `force_recreate`.
    pub async fn ensure_index(&self, kind: EntityKind, force_recreate: bool) -> Result<(), SearchError> {
        let name = self.index_name(kind).to_string();
        let body = self.catalog.index_body(kind);
        self.backend.ensure_index(&name, &body, force_recreate).await
    }

    /// Relax the refresh interval ahead of a bulk load.
    pub async fn begin_load(&self, kind: EntityKind) -> Result<(), SearchError> {
        let name = self.index_name(kind).to_string();
        self.backend
            .put_settings(&name, &MappingCatalog::relaxed_settings())
            .await
    }

    /// Restore live settings and force visibility after a bulk load.
    pub async fn finish_load(&self, kind: EntityKind) -> Result<(), SearchError> {
        let name = self.index_name(kind).to_string();
        self.backend
            .put_settings(&name, &MappingCatalog::live_settings())
            .await?;
        self.backend.refresh(&name).await
    }

    /// Index raw documents in batches. The id comes from the entity's id
    /// field; documents failing local validation or missing an id are
    /// counted as failed without touching the rest of their batch.
    pub async fn index_batch(
        &self,
        kind: EntityKind,
        docs: &[Value],
        cancel: &Cancellation,
    ) -> Result<BulkOutcome, SearchError> {
        let index = self.index_name(kind).to_string();
        let id_field = kind.id_field();
        let mut outcome = BulkOutcome::default();
        let mut valid: Vec<(String, Value)> = Vec::with_capacity(docs.len());

        for doc in docs {
            let id = doc[id_field].as_str().unwrap_or("").to_string();
            if id.is_empty() {
                warn!("document without '{}' skipped", id_field);
                outcome.failed += 1;
                outcome.errors.push(BulkItemError {
                    id: String::new(),
                    reason: format!("missing id field '{}'", id_field),
                });
                continue;
            }
            if let Err(reason) = validate_doc(kind, doc) {
                warn!("document '{}' failed validation: {}", id, reason);
                outcome.failed += 1;
                outcome.errors.push(BulkItemError { id, reason });
                continue;
            }
            valid.push((id, doc.clone()));
        }

        for chunk in valid.chunks(self.batch_size) {
            cancel.check()?;
            let chunk_outcome = self.backend.bulk_write(&index, chunk, false, cancel).await?;
            info!(
                "indexed {}/{} docs into '{}'",
                chunk_outcome.indexed,
                chunk.len(),
                index
            );
            merge(&mut outcome, chunk_outcome);
        }

        Ok(outcome)
    }

    /// Typed property ingestion: derived fields are computed before write so
    /// indexed documents always carry `price_per_sqft` and `search_tags`.
    pub async fn index_properties(
        &self,
        mut properties: Vec<Property>,
        cancel: &Cancellation,
    ) -> Result<BulkOutcome, SearchError> {
        for property in &mut properties {
            property.finalize();
        }
        let docs: Vec<Value> = properties
            .iter()
            .map(|p| serde_json::to_value(p))
            .collect::<Result<_, _>>()?;
        self.index_batch(EntityKind::Property, &docs, cancel).await
    }
}

fn merge(into: &mut BulkOutcome, from: BulkOutcome) {
    into.indexed += from.indexed;
    into.failed += from.failed;
    into.errors.extend(from.errors);
}

/// Local, per-document validation; failures are non-fatal to the batch.
fn validate_doc(kind: EntityKind, doc: &Value) -> Result<(), String> {
    match kind {
        EntityKind::Property => {
            let property: Property =
                serde_json::from_value(doc.clone()).map_err(|e| e.to_string())?;
            property.validate().map_err(|e| e.to_string())?;
            property.check_invariants()
        }
        EntityKind::Neighborhood => {
            let neighborhood: Neighborhood =
                serde_json::from_value(doc.clone()).map_err(|e| e.to_string())?;
            neighborhood.validate().map_err(|e| e.to_string())
        }
        EntityKind::Wikipedia => {
            let article: WikipediaArticle =
                serde_json::from_value(doc.clone()).map_err(|e| e.to_string())?;
            if !(0.0..=1.0).contains(&article.relevance_score) {
                return Err(format!("relevance_score {} outside [0,1]", article.relevance_score));
            }
            if !(0.0..=1.0).contains(&article.confidence) {
                return Err(format!("confidence {} outside [0,1]", article.confidence));
            }
            Ok(())
        }
        EntityKind::PropertyRelationships => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn property_doc(listing_id: &str, state: &str) -> Value {
        json!({
            "listing_id": listing_id,
            "neighborhood_id": "n1",
            "address": {
                "street": "1 Elm St",
                "city": "San Francisco",
                "state": state,
                "zip": "94100"
            },
            "property_type": "condo",
            "price": 500000.0,
            "bedrooms": 2,
            "bathrooms": 1.0,
            "description": "test"
        })
    }

    #[test]
    fn valid_property_passes_local_validation() {
        assert!(validate_doc(EntityKind::Property, &property_doc("p1", "CA")).is_ok());
    }

    #[test]
    fn three_letter_state_fails_local_validation() {
        let err = validate_doc(EntityKind::Property, &property_doc("p1", "CAL")).unwrap_err();
        assert!(err.contains("state"));
    }

    #[test]
    fn out_of_range_relevance_fails_wikipedia_validation() {
        let doc = json!({
            "page_id": "1",
            "title": "t",
            "relevance_score": 1.5,
            "confidence": 0.5
        });
        assert!(validate_doc(EntityKind::Wikipedia, &doc).is_err());
    }
}
