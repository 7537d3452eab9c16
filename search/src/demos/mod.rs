//! Demo harness
//!
//! Every query family ships as a `Demo`: build a query, execute it, convert
//! the raw hits into a typed result that knows how to display itself. The
//! registry gives each demo a stable number and category for the CLI.

pub mod catalog;
pub mod results;

use std::sync::Arc;

use async_trait::async_trait;

use estatehub_config::{HybridConfig, IndexNames};

use crate::backend::{SearchBackend, SearchResponse};
use crate::cancel::Cancellation;
use crate::error::SearchError;
use crate::query::QueryDoc;
use crate::retriever::HybridSearchEngine;
use results::Render;

/// Everything a demo needs to run. Constructed once at startup; immutable
/// afterwards.
#[derive(Clone)]
pub struct DemoContext {
    pub backend: Arc<SearchBackend>,
    pub engine: HybridSearchEngine,
    pub indices: IndexNames,
    pub hybrid: HybridConfig,
    pub cancel: Cancellation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoCategory {
    Basic,
    Aggregation,
    Geo,
    Wikipedia,
    Semantic,
    Hybrid,
    Relationship,
}

impl DemoCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoCategory::Basic => "basic",
            DemoCategory::Aggregation => "aggregation",
            DemoCategory::Geo => "geo",
            DemoCategory::Wikipedia => "wikipedia",
            DemoCategory::Semantic => "semantic",
            DemoCategory::Hybrid => "hybrid",
            DemoCategory::Relationship => "relationship",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DemoSpec {
    pub number: u16,
    pub name: &'static str,
    pub category: DemoCategory,
    pub description: &'static str,
}

/// The uniform execution contract. Implementations either go through
/// [`QueryDemo`] (one query document, one response) or orchestrate their
/// own calls; either way the harness only sees `run`.
#[async_trait]
pub trait Demo: Send + Sync {
    fn spec(&self) -> DemoSpec;
    async fn run(&self, ctx: &DemoContext, size: usize) -> Result<Box<dyn Render>, SearchError>;
}

/// The standard single-request demo shape: `build_query → execute →
/// to_result`. Wrapped in [`QueryDemoAdapter`] for registration.
#[async_trait]
pub trait QueryDemo: Send + Sync {
    fn spec(&self) -> DemoSpec;
    fn indices(&self, ctx: &DemoContext) -> Vec<String>;
    async fn build_query(&self, ctx: &DemoContext, size: usize) -> Result<QueryDoc, SearchError>;
    fn to_result(
        &self,
        ctx: &DemoContext,
        size: usize,
        response: SearchResponse,
    ) -> Result<Box<dyn Render>, SearchError>;
}

/// Runs a [`QueryDemo`] through the uniform build → execute → convert
/// pipeline.
pub struct QueryDemoAdapter<T>(pub T);

#[async_trait]
impl<T: QueryDemo> Demo for QueryDemoAdapter<T> {
    fn spec(&self) -> DemoSpec {
        self.0.spec()
    }

    async fn run(&self, ctx: &DemoContext, size: usize) -> Result<Box<dyn Render>, SearchError> {
        let doc = self.0.build_query(ctx, size).await?;
        let indices = self.0.indices(ctx);
        let index_refs: Vec<&str> = indices.iter().map(String::as_str).collect();
        let response = ctx.backend.search(&index_refs, &doc, &ctx.cancel).await?;
        self.0.to_result(ctx, size, response)
    }
}

pub struct DemoRegistry {
    demos: Vec<Arc<dyn Demo>>,
}

impl DemoRegistry {
    pub fn new(demos: Vec<Arc<dyn Demo>>) -> Self {
        Self { demos }
    }

    /// The full built-in demo set.
    pub fn standard() -> Self {
        catalog::standard_registry()
    }

    pub fn get(&self, number: u16) -> Option<Arc<dyn Demo>> {
        self.demos.iter().find(|d| d.spec().number == number).cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Demo>> {
        self.demos.iter()
    }

    pub fn len(&self) -> usize {
        self.demos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demos.is_empty()
    }
}
