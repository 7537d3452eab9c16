//! Canonical embedding text
//!
//! One pure function per entity type. Ordering and separators are stable by
//! contract: changing them invalidates every previously stored embedding.

use estatehub_models::{Neighborhood, Property, WikipediaArticle};

const FIELD_SEPARATOR: &str = " | ";
const CONTENT_FALLBACK_CHARS: usize = 500;

/// `description | features | "street, city, state" | amenities | hints`
pub fn property_text(property: &Property) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(5);

    if !property.description.trim().is_empty() {
        parts.push(property.description.trim().to_string());
    }
    if !property.features.is_empty() {
        parts.push(property.features.join(", "));
    }
    parts.push(format!(
        "{}, {}, {}",
        property.address.street, property.address.city, property.address.state
    ));
    if !property.amenities.is_empty() {
        parts.push(property.amenities.join(", "));
    }
    if let Some(hints) = persona_hints(property) {
        parts.push(hints);
    }

    parts.join(FIELD_SEPARATOR)
}

/// Deterministic lifestyle hints derived from listing attributes.
fn persona_hints(property: &Property) -> Option<String> {
    let mut hints: Vec<&str> = Vec::new();
    if property.bedrooms >= 4 {
        hints.push("spacious family home");
    }
    if property.parking_spaces.unwrap_or(0) > 0 {
        hints.push("with parking");
    }
    if property
        .year_built
        .map(|year| year < 1940)
        .unwrap_or(false)
    {
        hints.push("classic architecture");
    }
    if hints.is_empty() {
        None
    } else {
        Some(hints.join(", "))
    }
}

/// `description | name | population | median_income | lifestyle_tags`
pub fn neighborhood_text(neighborhood: &Neighborhood) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(5);

    if !neighborhood.description.trim().is_empty() {
        parts.push(neighborhood.description.trim().to_string());
    }
    parts.push(neighborhood.name.clone());
    if let Some(population) = neighborhood.demographics.population {
        parts.push(format!("population {}", population));
    }
    if let Some(income) = neighborhood.demographics.median_income {
        parts.push(format!("median income {:.0}", income));
    }
    if !neighborhood.lifestyle_tags.is_empty() {
        parts.push(neighborhood.lifestyle_tags.join(", "));
    }

    parts.join(FIELD_SEPARATOR)
}

/// `title + "\n\n" + long_summary`, falling back to the head of the full
/// content when no summary exists.
pub fn wikipedia_text(article: &WikipediaArticle) -> String {
    let body = if !article.long_summary.trim().is_empty() {
        article.long_summary.trim().to_string()
    } else {
        article
            .full_content
            .chars()
            .take(CONTENT_FALLBACK_CHARS)
            .collect::<String>()
            .trim()
            .to_string()
    };
    format!("{}\n\n{}", article.title, body)
}
