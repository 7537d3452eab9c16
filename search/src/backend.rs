//! Search backend client
//!
//! A pooled HTTP client for the Elasticsearch-compatible engine. The rest of
//! the stack only sees four operations (ensure_index, bulk_write, search,
//! delete_index) plus a few maintenance calls used around bulk loads.

use std::time::Duration;

use rand::Rng;
use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use estatehub_config::BackendConfig;

use crate::cancel::Cancellation;
use crate::error::SearchError;
use crate::query::QueryDoc;

/// One parsed hit from a search response.
#[derive(Debug, Clone)]
pub struct Hit {
    pub id: String,
    pub index: String,
    pub score: Option<f64>,
    pub source: Value,
    pub highlights: Vec<String>,
    /// Sort values, present when the query used a sort (pagination cursors)
    pub sort: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub took_ms: u64,
    pub total: u64,
    pub hits: Vec<Hit>,
    pub aggregations: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct BulkItemError {
    pub id: String,
    pub reason: String,
}

/// Per-batch outcome of a bulk write. Item failures are not fatal.
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    pub indexed: usize,
    pub failed: usize,
    pub errors: Vec<BulkItemError>,
}

#[derive(Debug, Clone)]
pub struct SearchBackend {
    client: Client,
    base_url: String,
    auth: Option<(String, String)>,
    request_timeout: Duration,
    max_retries: u32,
    native_rrf: bool,
}

impl SearchBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, SearchError> {
        let base_url = config
            .hosts
            .first()
            .ok_or_else(|| SearchError::Validation("no backend hosts configured".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let client = Client::builder()
            .pool_max_idle_per_host(config.max_inflight)
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            auth: config.auth.clone(),
            request_timeout: Duration::from_secs(config.request_timeout),
            max_retries: config.max_retries,
            native_rrf: true,
        })
    }

    /// Engines without a fusion retriever get client-side RRF instead.
    pub fn without_native_rrf(mut self) -> Self {
        self.native_rrf = false;
        self
    }

    pub fn supports_native_rrf(&self) -> bool {
        self.native_rrf
    }

    /// Issue one request with bounded retries on transient failures.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        cancel: &Cancellation,
    ) -> Result<(StatusCode, Value), SearchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            cancel.check()?;
            let timeout = cancel.bound_timeout(self.request_timeout);
            if timeout.is_zero() {
                return Err(SearchError::Cancelled);
            }

            let mut request = self
                .client
                .request(method.clone(), &url)
                .timeout(timeout);
            if let Some((user, pass)) = &self.auth {
                request = request.basic_auth(user, Some(pass));
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        if attempt >= self.max_retries {
                            return Err(SearchError::Transport(format!(
                                "{} {} failed with {} after {} attempts",
                                method, path, status, attempt + 1
                            )));
                        }
                    } else {
                        let value = response.json::<Value>().await.unwrap_or(Value::Null);
                        return Ok((status, value));
                    }
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(SearchError::Transport(e.to_string()));
                    }
                    debug!("request to {} failed, retrying: {}", path, e);
                }
            }

            attempt += 1;
            let backoff = backoff_delay(attempt);
            let backoff = cancel.bound_timeout(backoff);
            tokio::time::sleep(backoff).await;
        }
    }

    /// Raw NDJSON request, used only by `_bulk`.
    async fn execute_ndjson(
        &self,
        path: &str,
        body: String,
        cancel: &Cancellation,
    ) -> Result<(StatusCode, Value), SearchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0u32;

        loop {
            cancel.check()?;
            let timeout = cancel.bound_timeout(self.request_timeout);
            if timeout.is_zero() {
                return Err(SearchError::Cancelled);
            }

            let mut request = self
                .client
                .post(&url)
                .timeout(timeout)
                .header("Content-Type", "application/x-ndjson")
                .body(body.clone());
            if let Some((user, pass)) = &self.auth {
                request = request.basic_auth(user, Some(pass));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        if attempt >= self.max_retries {
                            return Err(SearchError::Transport(format!(
                                "bulk write failed with {} after {} attempts",
                                status,
                                attempt + 1
                            )));
                        }
                    } else {
                        let value = response.json::<Value>().await.unwrap_or(Value::Null);
                        return Ok((status, value));
                    }
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(SearchError::Transport(e.to_string()));
                    }
                    debug!("bulk request failed, retrying: {}", e);
                }
            }

            attempt += 1;
            tokio::time::sleep(cancel.bound_timeout(backoff_delay(attempt))).await;
        }
    }

    /// Cluster reachability probe. Any well-formed health answer counts.
    pub async fn health(&self) -> Result<String, SearchError> {
        let (status, body) = self
            .execute(Method::GET, "/_cluster/health", None, &Cancellation::new())
            .await?;
        if !status.is_success() {
            return Err(SearchError::Transport(format!("cluster health returned {}", status)));
        }
        Ok(body["status"].as_str().unwrap_or("unknown").to_string())
    }

    pub async fn index_exists(&self, name: &str) -> Result<bool, SearchError> {
        let url = format!("{}/{}", self.base_url, name);
        let mut request = self.client.head(&url);
        if let Some((user, pass)) = &self.auth {
            request = request.basic_auth(user, Some(pass));
        }
        let response = request.send().await?;
        Ok(response.status().is_success())
    }

    pub async fn get_mapping(&self, name: &str) -> Result<Value, SearchError> {
        let (status, body) = self
            .execute(Method::GET, &format!("/{}/_mapping", name), None, &Cancellation::new())
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Err(SearchError::NotFound(format!("index '{}'", name)));
        }
        if !status.is_success() {
            return Err(SearchError::Transport(format!("get mapping returned {}", status)));
        }
        Ok(body[name]["mappings"].clone())
    }

    /// Create `name` with the given body ({settings, mappings}). When the
    /// index already exists its mapping is diffed against the desired one:
    /// incompatible + `force_recreate=false` is a `SchemaConflict`;
    /// `force_recreate=true` deletes and recreates.
    pub async fn ensure_index(
        &self,
        name: &str,
        body: &Value,
        force_recreate: bool,
    ) -> Result<(), SearchError> {
        if self.index_exists(name).await? {
            if force_recreate {
                info!("recreating index '{}'", name);
                self.delete_index(name).await?;
            } else {
                let existing = self.get_mapping(name).await?;
                if let Err(detail) = crate::mappings::check_compatibility(&existing, &body["mappings"]) {
                    return Err(SearchError::SchemaConflict {
                        index: name.to_string(),
                        detail,
                    });
                }
                debug!("index '{}' already exists with a compatible mapping", name);
                return Ok(());
            }
        }

        let (status, response) = self
            .execute(Method::PUT, &format!("/{}", name), Some(body), &Cancellation::new())
            .await?;
        if !status.is_success() {
            return Err(SearchError::Transport(format!(
                "failed to create index '{}': {} {}",
                name, status, response
            )));
        }
        info!("✅ created index '{}'", name);
        Ok(())
    }

    pub async fn delete_index(&self, name: &str) -> Result<(), SearchError> {
        let (status, response) = self
            .execute(Method::DELETE, &format!("/{}", name), None, &Cancellation::new())
            .await?;
        // Deleting a missing index is fine
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(SearchError::Transport(format!(
                "failed to delete index '{}': {} {}",
                name, status, response
            )));
        }
        Ok(())
    }

    pub async fn put_settings(&self, name: &str, settings: &Value) -> Result<(), SearchError> {
        let (status, response) = self
            .execute(
                Method::PUT,
                &format!("/{}/_settings", name),
                Some(settings),
                &Cancellation::new(),
            )
            .await?;
        if !status.is_success() {
            return Err(SearchError::Transport(format!(
                "failed to update settings on '{}': {} {}",
                name, status, response
            )));
        }
        Ok(())
    }

    pub async fn refresh(&self, name: &str) -> Result<(), SearchError> {
        let (status, _) = self
            .execute(Method::POST, &format!("/{}/_refresh", name), None, &Cancellation::new())
            .await?;
        if !status.is_success() {
            return Err(SearchError::Transport(format!("refresh on '{}' returned {}", name, status)));
        }
        Ok(())
    }

    pub async fn count(&self, name: &str) -> Result<u64, SearchError> {
        let (status, body) = self
            .execute(Method::GET, &format!("/{}/_count", name), None, &Cancellation::new())
            .await?;
        if !status.is_success() {
            return Err(SearchError::Transport(format!("count on '{}' returned {}", name, status)));
        }
        Ok(body["count"].as_u64().unwrap_or(0))
    }

    /// Bulk-write documents with explicit ids. Item-level failures are
    /// collected into the outcome, never raised.
    pub async fn bulk_write(
        &self,
        index: &str,
        docs: &[(String, Value)],
        refresh: bool,
        cancel: &Cancellation,
    ) -> Result<BulkOutcome, SearchError> {
        if docs.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let mut body = String::with_capacity(docs.len() * 256);
        for (id, doc) in docs {
            body.push_str(&json!({"index": {"_index": index, "_id": id}}).to_string());
            body.push('\n');
            body.push_str(&doc.to_string());
            body.push('\n');
        }

        let path = if refresh {
            "/_bulk?refresh=true".to_string()
        } else {
            "/_bulk".to_string()
        };
        let (status, response) = self.execute_ndjson(&path, body, cancel).await?;
        if !status.is_success() {
            return Err(SearchError::Transport(format!("bulk write returned {}", status)));
        }

        Ok(parse_bulk_response(&response))
    }

    /// Execute a search against one or more indices.
    pub async fn search(
        &self,
        indices: &[&str],
        query: &QueryDoc,
        cancel: &Cancellation,
    ) -> Result<SearchResponse, SearchError> {
        let path = format!("/{}/_search", indices.join(","));
        let (status, body) = self
            .execute(Method::POST, &path, Some(query.body()), cancel)
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Err(SearchError::NotFound(format!("indices {:?}", indices)));
        }
        if status == StatusCode::BAD_REQUEST {
            return Err(SearchError::Validation(format!("backend rejected query: {}", body)));
        }
        if !status.is_success() {
            return Err(SearchError::Transport(format!("search returned {}: {}", status, body)));
        }
        Ok(parse_search_response(&body))
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let base = 250u64.saturating_mul(1u64 << attempt.min(6));
    let jitter = rand::thread_rng().gen_range(0..100);
    Duration::from_millis(base + jitter)
}

fn parse_search_response(body: &Value) -> SearchResponse {
    let took_ms = body["took"].as_u64().unwrap_or(0);
    let total = body["hits"]["total"]["value"]
        .as_u64()
        .or_else(|| body["hits"]["total"].as_u64())
        .unwrap_or(0);

    let hits = body["hits"]["hits"]
        .as_array()
        .map(|hits| {
            hits.iter()
                .map(|hit| Hit {
                    id: hit["_id"].as_str().unwrap_or_default().to_string(),
                    index: hit["_index"].as_str().unwrap_or_default().to_string(),
                    score: hit["_score"].as_f64(),
                    source: hit["_source"].clone(),
                    highlights: hit["highlight"]
                        .as_object()
                        .map(|fields| {
                            fields
                                .values()
                                .flat_map(|fragments| {
                                    fragments
                                        .as_array()
                                        .into_iter()
                                        .flatten()
                                        .filter_map(|f| f.as_str().map(String::from))
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                    sort: hit.get("sort").cloned(),
                })
                .collect()
        })
        .unwrap_or_default();

    SearchResponse {
        took_ms,
        total,
        hits,
        aggregations: body.get("aggregations").cloned(),
    }
}

fn parse_bulk_response(body: &Value) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    let Some(items) = body["items"].as_array() else {
        return outcome;
    };

    for item in items {
        let action = item
            .get("index")
            .or_else(|| item.get("create"))
            .or_else(|| item.get("update"));
        let Some(action) = action else { continue };

        if let Some(error) = action.get("error") {
            let reason = error["reason"].as_str().unwrap_or("unknown").to_string();
            let id = action["_id"].as_str().unwrap_or_default().to_string();
            warn!("bulk item '{}' failed: {}", id, reason);
            outcome.failed += 1;
            outcome.errors.push(BulkItemError { id, reason });
        } else {
            outcome.indexed += 1;
        }
    }

    outcome
}
