//! Embedding provider seam
//!
//! The engine only consumes `embed(texts) → vectors`. Concrete adapters
//! (HTTP providers, test fakes) live elsewhere and are passed in as trait
//! objects.

use async_trait::async_trait;

use crate::error::SearchError;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Dimension D of every vector this provider returns.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts. Vectors are unit-normalized when the
    /// configured similarity is cosine; adapters own that guarantee.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| SearchError::Provider("provider returned no vectors".to_string()))
    }
}
