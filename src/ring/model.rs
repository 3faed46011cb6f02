use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One URL belonging to a ring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub who: Option<String>,
    /// Fields this crate does not interpret, kept as published
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Catalog metadata for one ring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingDefinition {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "collectionURL")]
    pub collection_url: String,
    #[serde(
        rename = "dataRefreshSeconds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub data_refresh_seconds: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RingEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            who: None,
            extra: Map::new(),
        }
    }
}

impl RingDefinition {
    /// Title to show, falling back to the id
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}
