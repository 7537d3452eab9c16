//! Location-intent extraction
//!
//! Parses free-text queries into structured location intent: the recognized
//! city/state/neighborhood plus the query with those tokens removed.
//! Extraction is gazetteer-driven and fully deterministic; on a miss the
//! original query passes through untouched so retrieval always proceeds.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationIntent {
    /// Lowercased, for filter construction
    pub city: Option<String>,
    /// 2-letter code
    pub state: Option<String>,
    /// Lowercased, for filter construction
    pub neighborhood: Option<String>,
    /// Original-cased forms, for display
    pub display_city: Option<String>,
    pub display_neighborhood: Option<String>,
    /// The query with recognized location tokens removed; never empty
    pub cleaned_query: String,
    pub confidence: f32,
    pub has_location: bool,
}

/// Full state names to USPS codes.
static STATE_NAMES: &[(&str, &str)] = &[
    ("alabama", "AL"), ("alaska", "AK"), ("arizona", "AZ"), ("arkansas", "AR"),
    ("california", "CA"), ("colorado", "CO"), ("connecticut", "CT"), ("delaware", "DE"),
    ("florida", "FL"), ("georgia", "GA"), ("hawaii", "HI"), ("idaho", "ID"),
    ("illinois", "IL"), ("indiana", "IN"), ("iowa", "IA"), ("kansas", "KS"),
    ("kentucky", "KY"), ("louisiana", "LA"), ("maine", "ME"), ("maryland", "MD"),
    ("massachusetts", "MA"), ("michigan", "MI"), ("minnesota", "MN"), ("mississippi", "MS"),
    ("missouri", "MO"), ("montana", "MT"), ("nebraska", "NE"), ("nevada", "NV"),
    ("new hampshire", "NH"), ("new jersey", "NJ"), ("new mexico", "NM"), ("new york", "NY"),
    ("north carolina", "NC"), ("north dakota", "ND"), ("ohio", "OH"), ("oklahoma", "OK"),
    ("oregon", "OR"), ("pennsylvania", "PA"), ("rhode island", "RI"), ("south carolina", "SC"),
    ("south dakota", "SD"), ("tennessee", "TN"), ("texas", "TX"), ("utah", "UT"),
    ("vermont", "VT"), ("virginia", "VA"), ("washington", "WA"), ("west virginia", "WV"),
    ("wisconsin", "WI"), ("wyoming", "WY"), ("district of columbia", "DC"),
];

/// Known cities with their home state.
static CITIES: &[(&str, &str)] = &[
    ("san francisco", "CA"), ("oakland", "CA"), ("berkeley", "CA"), ("san jose", "CA"),
    ("palo alto", "CA"), ("mountain view", "CA"), ("sacramento", "CA"), ("salinas", "CA"),
    ("los angeles", "CA"), ("san diego", "CA"), ("santa cruz", "CA"), ("temecula", "CA"),
    ("seattle", "WA"), ("portland", "OR"), ("park city", "UT"), ("salt lake city", "UT"),
    ("austin", "TX"), ("dallas", "TX"), ("houston", "TX"), ("denver", "CO"),
    ("chicago", "IL"), ("boston", "MA"), ("miami", "FL"), ("atlanta", "GA"),
    ("new york", "NY"), ("brooklyn", "NY"), ("phoenix", "AZ"), ("las vegas", "NV"),
];

/// Known neighborhoods with their city and state.
static NEIGHBORHOODS: &[(&str, &str, &str)] = &[
    ("mission district", "san francisco", "CA"),
    ("pacific heights", "san francisco", "CA"),
    ("noe valley", "san francisco", "CA"),
    ("russian hill", "san francisco", "CA"),
    ("nob hill", "san francisco", "CA"),
    ("hayes valley", "san francisco", "CA"),
    ("south of market", "san francisco", "CA"),
    ("marina district", "san francisco", "CA"),
    ("sunset district", "san francisco", "CA"),
    ("richmond district", "san francisco", "CA"),
    ("capitol hill", "seattle", "WA"),
    ("queen anne", "seattle", "WA"),
    ("rockridge", "oakland", "CA"),
    ("temescal", "oakland", "CA"),
];

static STATE_CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:,\s*)?\b([A-Z]{2})\b").expect("valid state code pattern"));

#[derive(Debug, Clone, Default)]
pub struct LocationExtractor;

impl LocationExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, query: &str) -> LocationIntent {
        let mut intent = LocationIntent {
            cleaned_query: query.to_string(),
            ..Default::default()
        };
        let lowered = query.to_lowercase();
        let mut matched_phrases: Vec<String> = Vec::new();

        // Most specific first: neighborhood implies city and state.
        if let Some((name, (city, state))) =
            find_longest(&lowered, NEIGHBORHOODS.iter().map(|(n, c, s)| (*n, (*c, *s))))
        {
            intent.neighborhood = Some(name.to_string());
            intent.display_neighborhood = original_case(query, &name);
            intent.city = Some(city.to_string());
            intent.state = Some(state.to_string());
            intent.confidence = 0.95;
            matched_phrases.push(name);
        }

        if intent.city.is_none() {
            if let Some((name, state)) = find_longest(&lowered, CITIES.iter().map(|(c, s)| (*c, *s))) {
                intent.city = Some(name.to_string());
                intent.display_city = original_case(query, &name);
                intent.state = Some(state.to_string());
                intent.confidence = 0.9;
                matched_phrases.push(name);
            }
        } else if let Some(city) = &intent.city {
            // The neighborhood's city may also be spelled out; strip it too.
            if find_term(&lowered, city).is_some() {
                matched_phrases.push(city.clone());
            }
        }

        // Explicit state: full name, or an uppercase 2-letter code.
        if let Some((name, code)) = find_longest(&lowered, STATE_NAMES.iter().map(|(n, c)| (*n, *c))) {
            if intent.state.is_none() {
                intent.state = Some(code.to_string());
                intent.confidence = 0.6;
            }
            matched_phrases.push(name);
        } else {
            for capture in STATE_CODE_PATTERN.captures_iter(query) {
                let code = &capture[1];
                if STATE_NAMES.iter().any(|(_, c)| *c == code) {
                    if intent.state.is_none() {
                        intent.state = Some(code.to_string());
                        intent.confidence = 0.6;
                    }
                    if intent.state.as_deref() == Some(code) {
                        matched_phrases.push(code.to_string());
                    }
                    break;
                }
            }
        }

        intent.has_location =
            intent.city.is_some() || intent.state.is_some() || intent.neighborhood.is_some();

        if intent.has_location {
            let cleaned = strip_phrases(query, &matched_phrases);
            // The cleaned query is never empty; fall back to the original.
            intent.cleaned_query = if cleaned.is_empty() {
                query.to_string()
            } else {
                cleaned
            };
        }

        intent
    }
}

/// Longest gazetteer entry found in the query, with word boundaries.
fn find_longest<'a, T: Clone, I: Iterator<Item = (&'a str, T)>>(
    lowered: &str,
    entries: I,
) -> Option<(String, T)> {
    let mut best: Option<(String, T)> = None;
    for (name, payload) in entries {
        if find_term(lowered, name).is_some() {
            let longer = best.as_ref().map_or(true, |(b, _)| name.len() > b.len());
            if longer {
                best = Some((name.to_string(), payload));
            }
        }
    }
    best
}

/// Word-boundary substring search over a lowercased haystack.
fn find_term(haystack: &str, term: &str) -> Option<(usize, usize)> {
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(term) {
        let start = from + pos;
        let end = start + term.len();
        let before_ok = start == 0
            || !haystack[..start].chars().next_back().map_or(false, |c| c.is_alphanumeric());
        let after_ok = end == haystack.len()
            || !haystack[end..].chars().next().map_or(false, |c| c.is_alphanumeric());
        if before_ok && after_ok {
            return Some((start, end));
        }
        from = end;
    }
    None
}

/// Remove each matched phrase (and any leading "in"/"near"/"around"/"at"
/// preposition) from the query, then tidy whitespace and punctuation.
fn strip_phrases(query: &str, phrases: &[String]) -> String {
    let mut cleaned = query.to_string();
    for phrase in phrases {
        let pattern = format!(
            r"(?:\b(?:in|near|around|at)\s+)?\b{}\b\s*,?",
            regex::escape(phrase)
        );
        if let Ok(re) = RegexBuilder::new(&pattern).case_insensitive(true).build() {
            cleaned = re.replace_all(&cleaned, " ").into_owned();
        }
    }

    let collapsed: String = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_matches(|c: char| c == ',' || c == '-' || c.is_whitespace()).to_string()
}

fn original_case(query: &str, lowered_phrase: &str) -> Option<String> {
    let lowered = query.to_lowercase();
    find_term(&lowered, lowered_phrase).map(|(start, end)| query[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(query: &str) -> LocationIntent {
        LocationExtractor::new().extract(query)
    }

    #[test]
    fn city_query_extracts_city_and_state() {
        let intent = extract("modern kitchen with stainless steel appliances in San Francisco");
        assert_eq!(intent.city.as_deref(), Some("san francisco"));
        assert_eq!(intent.state.as_deref(), Some("CA"));
        assert_eq!(intent.cleaned_query, "modern kitchen with stainless steel appliances");
        assert!(intent.has_location);
        assert_eq!(intent.display_city.as_deref(), Some("San Francisco"));
    }

    #[test]
    fn neighborhood_beats_city_in_specificity() {
        let intent = extract("victorian near Noe Valley");
        assert_eq!(intent.neighborhood.as_deref(), Some("noe valley"));
        assert_eq!(intent.city.as_deref(), Some("san francisco"));
        assert_eq!(intent.state.as_deref(), Some("CA"));
        assert!(intent.confidence >= 0.95);
        assert_eq!(intent.cleaned_query, "victorian");
    }

    #[test]
    fn explicit_state_code_is_recognized() {
        let intent = extract("ski cabin in Park City, UT");
        assert_eq!(intent.city.as_deref(), Some("park city"));
        assert_eq!(intent.state.as_deref(), Some("UT"));
        assert_eq!(intent.cleaned_query, "ski cabin");
    }

    #[test]
    fn lowercase_in_is_not_a_state_code() {
        let intent = extract("walk in closet and large garage");
        assert!(!intent.has_location);
        assert_eq!(intent.cleaned_query, "walk in closet and large garage");
    }

    #[test]
    fn full_state_name_only() {
        let intent = extract("ranch homes in Texas");
        assert!(intent.city.is_none());
        assert_eq!(intent.state.as_deref(), Some("TX"));
        assert_eq!(intent.cleaned_query, "ranch homes");
    }

    #[test]
    fn no_location_passes_query_through() {
        let intent = extract("open floor plan with lots of light");
        assert!(!intent.has_location);
        assert_eq!(intent.confidence, 0.0);
        assert_eq!(intent.cleaned_query, "open floor plan with lots of light");
    }

    #[test]
    fn location_only_query_falls_back_to_original() {
        let intent = extract("San Francisco");
        assert!(intent.has_location);
        assert_eq!(intent.cleaned_query, "San Francisco");
    }

    #[test]
    fn extraction_is_idempotent() {
        let queries = [
            "modern kitchen with stainless steel appliances in San Francisco",
            "victorian near Noe Valley",
            "ski cabin in Park City, UT",
            "open floor plan with lots of light",
            "San Francisco",
        ];
        let extractor = LocationExtractor::new();
        for query in queries {
            let once = extractor.extract(query);
            let twice = extractor.extract(&once.cleaned_query);
            assert_eq!(once.cleaned_query, twice.cleaned_query, "query: {}", query);
        }
    }
}
