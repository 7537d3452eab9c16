//! EstateHub retrieval engine
//!
//! The hybrid search core: index mapping catalog, location-intent
//! extraction, query construction, dual-retriever execution with RRF
//! fusion, and the typed demo harness that exercises every query family.

pub mod backend;
pub mod cancel;
pub mod demos;
pub mod embedding;
pub mod error;
pub mod fusion;
pub mod location;
pub mod mappings;
pub mod query;
pub mod retriever;

pub use backend::{BulkOutcome, Hit, SearchBackend, SearchResponse};
pub use cancel::Cancellation;
pub use embedding::EmbeddingProvider;
pub use error::SearchError;
pub use location::{LocationExtractor, LocationIntent};
pub use mappings::MappingCatalog;
pub use query::QueryDoc;
pub use retriever::{HybridSearchEngine, Retrieval, RetrievedHit};
