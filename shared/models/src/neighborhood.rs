//! Neighborhood schema

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_income: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_age: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Neighborhood {
    pub neighborhood_id: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(equal = 2))]
    pub state: String,
    #[serde(default)]
    pub description: String,
    /// GeoJSON-style boundary polygon, opaque to the core
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boundaries: Option<serde_json::Value>,
    #[serde(default)]
    pub demographics: Demographics,
    #[serde(default)]
    pub lifestyle_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub walkability_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_rating: Option<f32>,
    /// Explicit references to Wikipedia articles about this neighborhood
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wikipedia_page_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}
