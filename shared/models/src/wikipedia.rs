//! Wikipedia article schema
//!
//! Articles are immutable once indexed; a reindex is a full replace.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleLocation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaArticle {
    /// Upstream page ids arrive as integers or strings; always a string here.
    #[serde(deserialize_with = "page_id_as_string")]
    pub page_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub long_summary: String,
    #[serde(default)]
    pub full_content: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub key_topics: Vec<String>,
    #[serde(default)]
    pub location: ArticleLocation,
    /// In [0, 1]
    pub relevance_score: f32,
    /// In [0, 1]
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

fn page_id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInt {
        String(String),
        Int(i64),
    }

    Ok(match StringOrInt::deserialize(deserializer)? {
        StringOrInt::String(s) => s,
        StringOrInt::Int(i) => i.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_page_ids_coerce_to_string() {
        let json = r#"{
            "page_id": 49728,
            "title": "Mission District, San Francisco",
            "relevance_score": 0.92,
            "confidence": 0.88
        }"#;
        let article: WikipediaArticle = serde_json::from_str(json).unwrap();
        assert_eq!(article.page_id, "49728");
    }

    #[test]
    fn string_page_ids_pass_through() {
        let json = r#"{
            "page_id": "49728",
            "title": "Mission District, San Francisco",
            "relevance_score": 0.92,
            "confidence": 0.88
        }"#;
        let article: WikipediaArticle = serde_json::from_str(json).unwrap();
        assert_eq!(article.page_id, "49728");
    }
}
