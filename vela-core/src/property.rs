//! Property bags - loosely-typed configuration attached to platform objects
//!
//! The platform hands adapters configuration as ordered lists of named
//! properties. Adapters convert a bag into a typed config struct once, at the
//! boundary, and fail eagerly on anything missing or ill-typed.

use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, AdapterResult};

/// A single property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<PropertyValue>),
}

/// A named property on a platform asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetProperty {
    pub name: String,
    pub value: PropertyValue,
}

/// An ordered collection of asset properties
///
/// Lookups scan in order and return the first property with a matching name,
/// matching how the platform resolves duplicate entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyBag {
    properties: Vec<AssetProperty>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a property, builder-style
    pub fn with(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.push(name, value);
        self
    }

    /// Shorthand for adding a string property
    pub fn with_string(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(name, PropertyValue::String(value.into()))
    }

    pub fn push(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.properties.push(AssetProperty {
            name: name.into(),
            value,
        });
    }

    /// Get the first property with the given name
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// Get a string property value
    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(PropertyValue::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Get an integer property value
    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.get(name) {
            Some(PropertyValue::Int(n)) => Some(*n),
            _ => None,
        }
    }

    /// Get a boolean property value
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name) {
            Some(PropertyValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Get a boolean property with a default value
    pub fn get_bool_or(&self, name: &str, default: bool) -> bool {
        self.get_bool(name).unwrap_or(default)
    }

    /// Get a list property value
    pub fn get_list(&self, name: &str) -> Option<&[PropertyValue]> {
        match self.get(name) {
            Some(PropertyValue::List(items)) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Get a required string property, failing if absent or not a string
    pub fn require_string(&self, name: &str) -> AdapterResult<&str> {
        match self.get(name) {
            Some(PropertyValue::String(s)) if !s.is_empty() => Ok(s.as_str()),
            Some(PropertyValue::String(_)) => {
                Err(AdapterError::invalid_property(name, "must not be empty"))
            }
            Some(_) => Err(AdapterError::invalid_property(name, "expected a string")),
            None => Err(AdapterError::MissingProperty(name.to_string())),
        }
    }

    /// Get a required integer property
    pub fn require_int(&self, name: &str) -> AdapterResult<i64> {
        match self.get(name) {
            Some(PropertyValue::Int(n)) => Ok(*n),
            Some(_) => Err(AdapterError::invalid_property(name, "expected an integer")),
            None => Err(AdapterError::MissingProperty(name.to_string())),
        }
    }

    /// Collect a list property into strings, rejecting non-string elements
    pub fn string_list(&self, name: &str) -> AdapterResult<Vec<String>> {
        let items = self
            .get_list(name)
            .ok_or_else(|| AdapterError::MissingProperty(name.to_string()))?;

        items
            .iter()
            .map(|item| match item {
                PropertyValue::String(s) => Ok(s.clone()),
                _ => Err(AdapterError::invalid_property(
                    name,
                    "expected a list of strings",
                )),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bag() -> PropertyBag {
        PropertyBag::new()
            .with_string("name", "front-lb")
            .with("port", PropertyValue::Int(443))
            .with("enabled", PropertyValue::Bool(true))
            .with(
                "zones",
                PropertyValue::List(vec![
                    PropertyValue::String("us-east-1a".to_string()),
                    PropertyValue::String("us-east-1b".to_string()),
                ]),
            )
    }

    #[test]
    fn typed_getters() {
        let bag = sample_bag();
        assert_eq!(bag.get_string("name"), Some("front-lb"));
        assert_eq!(bag.get_int("port"), Some(443));
        assert_eq!(bag.get_bool("enabled"), Some(true));
        assert!(bag.get_bool_or("missing", true));
        assert_eq!(bag.get_string("port"), None); // wrong type
    }

    #[test]
    fn first_match_wins_on_duplicates() {
        let bag = PropertyBag::new()
            .with_string("name", "first")
            .with_string("name", "second");
        assert_eq!(bag.get_string("name"), Some("first"));
    }

    #[test]
    fn require_string_errors() {
        let bag = sample_bag();
        assert!(matches!(
            bag.require_string("missing"),
            Err(AdapterError::MissingProperty(_))
        ));
        assert!(matches!(
            bag.require_string("port"),
            Err(AdapterError::InvalidProperty { .. })
        ));

        let empty = PropertyBag::new().with_string("name", "");
        assert!(matches!(
            empty.require_string("name"),
            Err(AdapterError::InvalidProperty { .. })
        ));
    }

    #[test]
    fn string_list_collects() {
        let bag = sample_bag();
        let zones = bag.string_list("zones").unwrap();
        assert_eq!(zones, vec!["us-east-1a", "us-east-1b"]);
    }

    #[test]
    fn string_list_rejects_mixed_types() {
        let bag = PropertyBag::new().with(
            "zones",
            PropertyValue::List(vec![
                PropertyValue::String("us-east-1a".to_string()),
                PropertyValue::Int(2),
            ]),
        );
        assert!(bag.string_list("zones").is_err());
    }

    #[test]
    fn bag_serialization() {
        let bag = sample_bag();
        let json = serde_json::to_string(&bag).unwrap();
        let restored: PropertyBag = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, bag);
    }
}
