//! Structured search constraints
//!
//! Every query builder accepts a `SearchFilters`; all of it lands in
//! non-scoring filter context.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::property::{GeoPoint, ListingStatus, PropertyType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl PriceRange {
    pub fn between(min: f64, max: f64) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Km,
    Mi,
}

impl DistanceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceUnit::Km => "km",
            DistanceUnit::Mi => "mi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoFilter {
    pub center: GeoPoint,
    pub radius: f64,
    pub unit: DistanceUnit,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub price_range: PriceRange,
    pub bedrooms_min: Option<u32>,
    pub bedrooms_max: Option<u32>,
    pub bathrooms_min: Option<f32>,
    pub bathrooms_max: Option<f32>,
    pub property_types: Vec<PropertyType>,
    pub cities: Vec<String>,
    pub states: Vec<String>,
    pub features: Vec<String>,
    pub status: Vec<ListingStatus>,
    pub geo: Option<GeoFilter>,
    pub listed_after: Option<NaiveDate>,
    pub listed_before: Option<NaiveDate>,
    pub max_days_on_market: Option<u32>,
    pub has_parking: Option<bool>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.price_range.is_empty()
            && self.bedrooms_min.is_none()
            && self.bedrooms_max.is_none()
            && self.bathrooms_min.is_none()
            && self.bathrooms_max.is_none()
            && self.property_types.is_empty()
            && self.cities.is_empty()
            && self.states.is_empty()
            && self.features.is_empty()
            && self.status.is_empty()
            && self.geo.is_none()
            && self.listed_after.is_none()
            && self.listed_before.is_none()
            && self.max_days_on_market.is_none()
            && self.has_parking.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filters_are_empty() {
        assert!(SearchFilters::default().is_empty());
    }

    #[test]
    fn any_constraint_makes_filters_non_empty() {
        let filters = SearchFilters {
            bedrooms_min: Some(2),
            ..Default::default()
        };
        assert!(!filters.is_empty());
    }
}
