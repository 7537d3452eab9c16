//! EstateHub ingestion
//!
//! Embedding text construction, the embedding provider adapter, the bulk
//! indexer for the primary indices, and the relationship builder that
//! denormalizes properties with their neighborhood and Wikipedia context.

pub mod bulk;
pub mod embed_text;
pub mod provider;
pub mod relationships;

pub use bulk::BulkIndexer;
pub use provider::HttpEmbeddingProvider;
pub use relationships::{RelationshipBuilder, RelationshipStats};
