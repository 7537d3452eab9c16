//! Denormalized property-relationships document
//!
//! Built by the relationship builder from the primary indices; keyed by
//! `listing_id` and fully reproducible by re-running the build.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::neighborhood::Neighborhood;
use crate::property::Property;
use crate::wikipedia::WikipediaArticle;

/// Compact article reference carried on the relationships document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WikipediaLink {
    pub page_id: String,
    pub title: String,
    pub relevance_score: f32,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl From<&WikipediaArticle> for WikipediaLink {
    fn from(article: &WikipediaArticle) -> Self {
        Self {
            page_id: article.page_id.clone(),
            title: article.title.clone(),
            relevance_score: article.relevance_score,
            confidence: article.confidence,
            city: article.location.city.clone(),
            state: article.location.state.clone(),
        }
    }
}

/// Atomic join snapshot of one property, its neighborhood, and its linked
/// Wikipedia articles. Regeneration replaces the previous document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRelationships {
    pub listing_id: String,
    pub property: Property,
    /// Null only when no neighborhood with the property's id exists
    pub neighborhood: Option<Neighborhood>,
    /// Ordered by relevance_score desc, confidence desc, page_id asc
    pub wikipedia_articles: Vec<WikipediaLink>,
    pub built_at: DateTime<Utc>,
}

impl PropertyRelationships {
    /// Sort and truncate article links to the configured maximum.
    pub fn normalize_articles(links: &mut Vec<WikipediaLink>, max_articles: usize) {
        links.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then_with(|| a.page_id.cmp(&b.page_id))
        });
        links.dedup_by(|a, b| a.page_id == b.page_id);
        links.truncate(max_articles);
    }
}
