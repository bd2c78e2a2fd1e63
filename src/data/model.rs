//! Building blocks shared by the repository entity models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A `{"href": ...}` entry of a HAL `_links` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalLink {
    pub href: String,
}

pub type HalLinks = BTreeMap<String, HalLink>;

/// One value of a metadata field such as `dc.description`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataValue {
    pub value: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default = "MetadataValue::default_confidence")]
    pub confidence: i32,
    #[serde(default)]
    pub place: u32,
}

impl MetadataValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: None,
            authority: None,
            confidence: Self::default_confidence(),
            place: 0,
        }
    }

    fn default_confidence() -> i32 {
        -1
    }
}

/// Metadata keyed by field name, values in display order.
pub type MetadataMap = BTreeMap<String, Vec<MetadataValue>>;

/// First value of `field`, if any.
pub fn first_metadata_value<'a>(metadata: &'a MetadataMap, field: &str) -> Option<&'a str> {
    metadata
        .get(field)
        .and_then(|values| values.first())
        .map(|v| v.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_defaults() {
        let value: MetadataValue = serde_json::from_str(r#"{"value":"Staff"}"#).unwrap();
        assert_eq!(value, MetadataValue::new("Staff"));
    }

    #[test]
    fn test_first_metadata_value() {
        let mut metadata = MetadataMap::new();
        metadata.insert(
            "dc.description".to_string(),
            vec![MetadataValue::new("first"), MetadataValue::new("second")],
        );
        assert_eq!(first_metadata_value(&metadata, "dc.description"), Some("first"));
        assert_eq!(first_metadata_value(&metadata, "dc.title"), None);
    }
}
