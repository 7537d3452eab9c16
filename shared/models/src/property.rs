//! Property listing schema
//!
//! The canonical document shape for the property index. Field names here are
//! the index field names: `state` (never `state_code`), nested `address`.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Nested address object. `state` is a 2-letter USPS code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Address {
    pub street: String,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(equal = 2))]
    pub state: String,
    pub zip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

/// Controlled property-type vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
    SingleFamily,
    Condo,
    Townhouse,
    MultiFamily,
    Apartment,
    Land,
    Other,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::SingleFamily => "single-family",
            PropertyType::Condo => "condo",
            PropertyType::Townhouse => "townhouse",
            PropertyType::MultiFamily => "multi-family",
            PropertyType::Apartment => "apartment",
            PropertyType::Land => "land",
            PropertyType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Pending,
    Sold,
    OffMarket,
}

/// One point of price history, ordered ascending by date on the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Property {
    pub listing_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood_id: Option<String>,
    #[validate(nested)]
    pub address: Address,
    pub property_type: PropertyType,
    #[validate(range(min = 0.0))]
    pub price: f64,
    pub bedrooms: u32,
    pub bathrooms: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub square_feet: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_built: Option<u16>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_on_market: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parking_spaces: Option<u32>,
    /// Derived: price / square_feet when both present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_sqft: Option<f64>,
    /// Derived: property_type ∪ features ∪ amenities
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub price_history: Vec<PricePoint>,
    /// Dense vector, dimension fixed by the catalog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Property {
    /// Compute the derived fields in place. Idempotent.
    pub fn finalize(&mut self) {
        self.price_per_sqft = match self.square_feet {
            Some(sqft) if sqft > 0 && self.price > 0.0 => Some(self.price / sqft as f64),
            _ => None,
        };

        let mut tags: Vec<String> = Vec::with_capacity(1 + self.features.len() + self.amenities.len());
        tags.push(self.property_type.as_str().to_string());
        for tag in self.features.iter().chain(self.amenities.iter()) {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        self.search_tags = tags;
    }

    /// Invariant checks beyond the derive-level ones.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.listing_id.trim().is_empty() {
            return Err("listing_id must not be empty".to_string());
        }
        if let Some(year) = self.year_built {
            let current = Utc::now().year() as u16;
            if year > current {
                return Err(format!("year_built {} is in the future", year));
            }
        }
        if let Some(id) = &self.neighborhood_id {
            if id.trim().is_empty() {
                return Err("neighborhood_id must not be empty when present".to_string());
            }
        }
        for window in self.price_history.windows(2) {
            if window[0].date > window[1].date {
                return Err("price_history must be ordered ascending by date".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_property() -> Property {
        Property {
            listing_id: "prop-001".to_string(),
            neighborhood_id: Some("n1".to_string()),
            address: Address {
                street: "123 Oak St".to_string(),
                city: "San Francisco".to_string(),
                state: "CA".to_string(),
                zip: "94110".to_string(),
                location: Some(GeoPoint { lat: 37.7489, lon: -122.4184 }),
            },
            property_type: PropertyType::SingleFamily,
            price: 1_200_000.0,
            bedrooms: 3,
            bathrooms: 2.5,
            square_feet: Some(1600),
            year_built: Some(1927),
            description: "Charming Victorian with modern kitchen".to_string(),
            features: vec!["Hardwood Floors".to_string(), "Garden".to_string()],
            amenities: vec!["garage".to_string()],
            status: Some(ListingStatus::Active),
            listing_date: None,
            days_on_market: Some(12),
            parking_spaces: Some(1),
            price_per_sqft: None,
            search_tags: vec![],
            price_history: vec![],
            embedding: None,
        }
    }

    #[test]
    fn finalize_computes_price_per_sqft() {
        let mut prop = sample_property();
        prop.finalize();
        assert_eq!(prop.price_per_sqft, Some(750.0));
    }

    #[test]
    fn finalize_skips_price_per_sqft_without_sqft() {
        let mut prop = sample_property();
        prop.square_feet = None;
        prop.finalize();
        assert!(prop.price_per_sqft.is_none());
    }

    #[test]
    fn finalize_builds_search_tags_union() {
        let mut prop = sample_property();
        prop.finalize();
        assert_eq!(
            prop.search_tags,
            vec!["single-family", "hardwood floors", "garden", "garage"]
        );
        // Idempotent
        prop.finalize();
        assert_eq!(prop.search_tags.len(), 4);
    }

    #[test]
    fn serialized_shape_uses_canonical_field_names() {
        let mut prop = sample_property();
        prop.finalize();
        let json = serde_json::to_string(&prop).unwrap();
        assert!(json.contains("\"state\":\"CA\""));
        assert!(!json.contains("state_code"));
        // Address is a nested object, not flattened siblings
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["address"]["city"], "San Francisco");
        assert!(value.get("city").is_none());
    }

    #[test]
    fn future_year_built_is_rejected() {
        let mut prop = sample_property();
        prop.year_built = Some(3000);
        assert!(prop.check_invariants().is_err());
    }

    #[test]
    fn three_letter_state_fails_validation() {
        use validator::Validate;
        let mut prop = sample_property();
        prop.address.state = "CAL".to_string();
        assert!(prop.validate().is_err());
    }
}
