use serde::{Deserialize, Serialize};

pub mod filters;
pub mod neighborhood;
pub mod property;
pub mod relationships;
pub mod wikipedia;

pub use filters::{DistanceUnit, GeoFilter, PriceRange, SearchFilters};
pub use neighborhood::{Demographics, Neighborhood};
pub use property::{Address, GeoPoint, ListingStatus, PricePoint, Property, PropertyType};
pub use relationships::{PropertyRelationships, WikipediaLink};
pub use wikipedia::{ArticleLocation, WikipediaArticle};

/// The entity families the platform indexes. Each primary index owns
/// exactly one kind; `PropertyRelationships` is derived from the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Property,
    Neighborhood,
    Wikipedia,
    PropertyRelationships,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Property => "property",
            EntityKind::Neighborhood => "neighborhood",
            EntityKind::Wikipedia => "wikipedia",
            EntityKind::PropertyRelationships => "property_relationships",
        }
    }

    /// Field holding the document id for this entity.
    pub fn id_field(&self) -> &'static str {
        match self {
            EntityKind::Property | EntityKind::PropertyRelationships => "listing_id",
            EntityKind::Neighborhood => "neighborhood_id",
            EntityKind::Wikipedia => "page_id",
        }
    }
}
