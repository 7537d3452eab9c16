//! EstateHub configuration
//!
//! Typed configuration for every component: embedding provider, search
//! backend, index names, hybrid-search tuning, and relationship building.
//! Loaded from an optional `estatehub.yaml` merged over defaults, with a
//! handful of environment overrides. Unknown keys are rejected so typos
//! fail loudly at startup.

pub mod telemetry;

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    /// Provider key, e.g. "voyage" or "ollama"
    pub provider: String,
    pub model: String,
    /// Dense-vector dimension D; every index mapping uses this value
    pub dimension: usize,
    pub base_url: String,
    pub api_key: Option<String>,
    pub batch_size: usize,
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "voyage".to_string(),
            model: "voyage-3".to_string(),
            dimension: 1024,
            base_url: "http://localhost:8100".to_string(),
            api_key: None,
            batch_size: 32,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    pub hosts: Vec<String>,
    /// Basic auth as (username, password)
    pub auth: Option<(String, String)>,
    /// Per-call timeout in seconds
    pub request_timeout: u64,
    pub max_retries: u32,
    /// Upper bound on concurrent in-flight requests to the backend
    pub max_inflight: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["http://localhost:9200".to_string()],
            auth: None,
            request_timeout: 30,
            max_retries: 3,
            max_inflight: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexNames {
    pub property: String,
    pub neighborhood: String,
    pub wikipedia: String,
    pub property_relationships: String,
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            property: "properties".to_string(),
            neighborhood: "neighborhoods".to_string(),
            wikipedia: "wikipedia".to_string(),
            property_relationships: "property_relationships".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HybridConfig {
    pub rank_constant: u32,
    pub rank_window_size: usize,
    pub knn_k: usize,
    pub knn_num_candidates: usize,
    /// HNSW graph parameters recorded in every dense-vector mapping
    pub hnsw_m: u32,
    pub hnsw_ef_construction: u32,
    pub hnsw_ef_search: u32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            rank_constant: 60,
            rank_window_size: 100,
            knn_k: 50,
            knn_num_candidates: 100,
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelationshipConfig {
    pub batch_size: usize,
    pub max_articles_per_property: usize,
    pub refresh_on_complete: bool,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_articles_per_property: 10,
            refresh_on_complete: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub embedding: EmbeddingConfig,
    pub search_backend: BackendConfig,
    pub indices: IndexNames,
    pub hybrid: HybridConfig,
    pub relationships: RelationshipConfig,
}

impl AppConfig {
    /// Load configuration: defaults, then the YAML file when present, then
    /// environment overrides. `.env` files are honored before env reads.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new("estatehub.yaml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(hosts) = std::env::var("ESTATEHUB_BACKEND_HOSTS") {
            self.search_backend.hosts = hosts.split(',').map(|h| h.trim().to_string()).collect();
        }
        if let (Ok(user), Ok(pass)) = (
            std::env::var("ESTATEHUB_BACKEND_USER"),
            std::env::var("ESTATEHUB_BACKEND_PASSWORD"),
        ) {
            self.search_backend.auth = Some((user, pass));
        }
        if let Ok(key) = std::env::var("ESTATEHUB_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("ESTATEHUB_EMBEDDING_URL") {
            self.embedding.base_url = url;
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.search_backend.hosts.is_empty(),
            "search_backend.hosts must not be empty"
        );
        anyhow::ensure!(self.embedding.dimension > 0, "embedding.dimension must be positive");
        anyhow::ensure!(self.hybrid.rank_constant > 0, "hybrid.rank_constant must be positive");
        anyhow::ensure!(
            self.hybrid.rank_window_size > 0,
            "hybrid.rank_window_size must be positive"
        );
        anyhow::ensure!(
            self.relationships.batch_size > 0,
            "relationships.batch_size must be positive"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.hybrid.rank_constant, 60);
        assert_eq!(config.hybrid.rank_window_size, 100);
        assert_eq!(config.hybrid.knn_k, 50);
        assert_eq!(config.relationships.batch_size, 500);
        assert_eq!(config.relationships.max_articles_per_property, 10);
        assert!(config.relationships.refresh_on_complete);
        assert_eq!(config.embedding.dimension, 1024);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let yaml = "hybrid:\n  rank_constant: 60\n  rank_windw_size: 100\n";
        let parsed: Result<AppConfig, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "indices:\n  property: props_v2").unwrap();
        let config = AppConfig::from_file(file.path()).unwrap();
        assert_eq!(config.indices.property, "props_v2");
        assert_eq!(config.indices.wikipedia, "wikipedia");
        assert_eq!(config.hybrid.rank_constant, 60);
    }
}
