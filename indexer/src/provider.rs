//! Embedding provider adapter
//!
//! HTTP client for the embedding service with provider-aware batching,
//! bounded retries with jitter, and cosine unit-normalization. Dimension is
//! checked on every response; a mismatch is a provider error, never a
//! silently wrong vector.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use estatehub_config::EmbeddingConfig;
use estatehub_search::{EmbeddingProvider, SearchError};

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct HttpEmbeddingProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    batch_size: usize,
    max_retries: u32,
    /// Unit-normalize outputs; on for cosine similarity
    normalize: bool,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| SearchError::Provider(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            dimension: config.dimension,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            normalize: true,
        })
    }

    async fn embed_chunk(&self, chunk: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let url = format!("{}/embed", self.base_url);
        let request_body = EmbedRequest {
            model: &self.model,
            input: chunk,
        };

        let mut attempt = 0u32;
        loop {
            let mut request = self.client.post(&url).json(&request_body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    let parsed: EmbedResponse = response
                        .json()
                        .await
                        .map_err(|e| SearchError::Provider(format!("bad embed response: {}", e)))?;
                    if parsed.embeddings.len() != chunk.len() {
                        return Err(SearchError::Provider(format!(
                            "provider returned {} vectors for {} texts",
                            parsed.embeddings.len(),
                            chunk.len()
                        )));
                    }
                    return Ok(parsed.embeddings);
                }
                Ok(response) => {
                    let status = response.status();
                    let retryable = status.is_server_error() || status.as_u16() == 429;
                    if !retryable || attempt >= self.max_retries {
                        let detail = response.text().await.unwrap_or_default();
                        return Err(SearchError::Provider(format!(
                            "embedding service returned {}: {}",
                            status, detail
                        )));
                    }
                    warn!("embedding service returned {}, retrying", status);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(SearchError::Provider(e.to_string()));
                    }
                    debug!("embedding request failed, retrying: {}", e);
                }
            }

            attempt += 1;
            tokio::time::sleep(backoff_with_jitter(attempt)).await;
        }
    }

    fn check_and_normalize(&self, mut vector: Vec<f32>) -> Result<Vec<f32>, SearchError> {
        if vector.len() != self.dimension {
            return Err(SearchError::Provider(format!(
                "vector dimension {} does not match configured {}",
                vector.len(),
                self.dimension
            )));
        }
        if self.normalize {
            let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for value in &mut vector {
                    *value /= norm;
                }
            }
        }
        Ok(vector)
    }
}

fn backoff_with_jitter(attempt: u32) -> Duration {
    let base = 500u64.saturating_mul(1u64 << attempt.min(5));
    let jitter = rand::thread_rng().gen_range(0..250);
    Duration::from_millis(base + jitter)
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let batch = self.embed_chunk(chunk).await?;
            for vector in batch {
                vectors.push(self.check_and_normalize(vector)?);
            }
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(dimension: usize) -> HttpEmbeddingProvider {
        let config = EmbeddingConfig {
            dimension,
            ..Default::default()
        };
        HttpEmbeddingProvider::new(&config).unwrap()
    }

    #[test]
    fn normalization_produces_unit_vectors() {
        let provider = provider(3);
        let normalized = provider.check_and_normalize(vec![3.0, 0.0, 4.0]).unwrap();
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[2] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn dimension_mismatch_is_a_provider_error() {
        let provider = provider(1024);
        let result = provider.check_and_normalize(vec![1.0; 768]);
        assert!(matches!(result, Err(SearchError::Provider(_))));
    }

    #[test]
    fn zero_vector_survives_normalization() {
        let provider = provider(2);
        let normalized = provider.check_and_normalize(vec![0.0, 0.0]).unwrap();
        assert_eq!(normalized, vec![0.0, 0.0]);
    }
}
