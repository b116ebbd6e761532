//! Directory entry types
//!
//! A `DirectoryEntry` is one observed directory record: a distinguished name
//! plus its attributes. Entries are immutable snapshots; a newer observation
//! replaces an older one instead of mutating it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value for an attribute, which may be single or multi-valued.
///
/// Serializes as a plain JSON string or a JSON array of strings, matching
/// the shape directory clients report entries in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A single value.
    Single(String),
    /// Multiple values, in the order the directory returned them.
    Multi(Vec<String>),
}

impl AttributeValue {
    /// Get the value if this is single-valued.
    pub fn as_single(&self) -> Option<&str> {
        match self {
            AttributeValue::Single(s) => Some(s),
            AttributeValue::Multi(_) => None,
        }
    }

    /// Get the first value (the only value for single-valued attributes).
    pub fn first(&self) -> Option<&str> {
        match self {
            AttributeValue::Single(s) => Some(s),
            AttributeValue::Multi(values) => values.first().map(String::as_str),
        }
    }

    /// Get all values (works for both single and multi-valued).
    pub fn values(&self) -> Vec<&str> {
        match self {
            AttributeValue::Single(s) => vec![s.as_str()],
            AttributeValue::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Consume the value into its list of values.
    pub fn into_values(self) -> Vec<String> {
        match self {
            AttributeValue::Single(s) => vec![s],
            AttributeValue::Multi(values) => values,
        }
    }

    /// Check if this value is structured (serializes as a JSON array).
    pub fn is_structured(&self) -> bool {
        matches!(self, AttributeValue::Multi(_))
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Single(s)
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Single(s.to_string())
    }
}

impl<T: Into<String>> From<Vec<T>> for AttributeValue {
    fn from(values: Vec<T>) -> Self {
        AttributeValue::Multi(values.into_iter().map(Into::into).collect())
    }
}

/// One directory record identified by its distinguished name.
///
/// Attributes live in a sorted map so two observations of the same record
/// always serialize with the same key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    dn: String,
    #[serde(flatten)]
    attributes: BTreeMap<String, AttributeValue>,
}

impl DirectoryEntry {
    /// Create an entry with no attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set an attribute using builder pattern.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Set an attribute value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttributeValue>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// The distinguished name.
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Get an attribute value.
    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Get the first value of an attribute.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AttributeValue::first)
    }

    /// Check if an attribute exists.
    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Iterate over all attributes in name order.
    pub fn attributes(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.attributes.iter()
    }

    /// Number of attributes (the dn is not counted).
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Check if the entry carries no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// The entry as a generic JSON tree (`dn` plus one key per attribute).
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::with_capacity(self.attributes.len() + 1);
        object.insert("dn".to_string(), serde_json::Value::String(self.dn.clone()));
        for (name, value) in &self.attributes {
            let json = match value {
                AttributeValue::Single(s) => serde_json::Value::String(s.clone()),
                AttributeValue::Multi(values) => serde_json::Value::Array(
                    values
                        .iter()
                        .cloned()
                        .map(serde_json::Value::String)
                        .collect(),
                ),
            };
            object.insert(name.clone(), json);
        }
        serde_json::Value::Object(object)
    }

    /// The entry's JSON text, as used for content matching and hashing.
    pub fn serialized(&self) -> String {
        // A map of strings cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serializes_dn_first_then_sorted_attributes() {
        let entry = DirectoryEntry::new("uid=alice,dc=x")
            .with("sn", "Smith")
            .with("mail", "alice@x.com")
            .with("cn", "Alice");

        assert_eq!(
            entry.serialized(),
            r#"{"dn":"uid=alice,dc=x","cn":"Alice","mail":"alice@x.com","sn":"Smith"}"#
        );
    }

    #[test]
    fn test_multi_value_serializes_as_array() {
        let entry = DirectoryEntry::new("uid=bob,dc=x").with("objectClass", vec!["top", "person"]);
        assert_eq!(
            entry.serialized(),
            r#"{"dn":"uid=bob,dc=x","objectClass":["top","person"]}"#
        );
    }

    #[test]
    fn test_entry_deserializes_from_json() {
        let entry: DirectoryEntry = serde_json::from_str(
            r#"{"dn":"uid=carol,dc=x","mail":"carol@x.com","objectClass":["top","inetOrgPerson"]}"#,
        )
        .unwrap();

        assert_eq!(entry.dn(), "uid=carol,dc=x");
        assert_eq!(entry.get_first("mail"), Some("carol@x.com"));
        assert_eq!(
            entry.get("objectClass"),
            Some(&AttributeValue::Multi(vec![
                "top".to_string(),
                "inetOrgPerson".to_string()
            ]))
        );
        assert_eq!(entry.len(), 2);
    }

    #[test]
    fn test_to_json_matches_serialized_form() {
        let entry = DirectoryEntry::new("uid=dave,dc=x")
            .with("mail", "dave@x.com")
            .with("memberOf", vec!["cn=a", "cn=b"]);

        let parsed: serde_json::Value = serde_json::from_str(&entry.serialized()).unwrap();
        assert_eq!(parsed, entry.to_json());
    }

    #[test]
    fn test_attribute_value_accessors() {
        let single = AttributeValue::from("one");
        assert_eq!(single.as_single(), Some("one"));
        assert_eq!(single.first(), Some("one"));
        assert!(!single.is_structured());

        let multi = AttributeValue::from(vec!["a", "b"]);
        assert_eq!(multi.as_single(), None);
        assert_eq!(multi.first(), Some("a"));
        assert_eq!(multi.values(), vec!["a", "b"]);
        assert!(multi.is_structured());
        assert_eq!(multi.into_values(), vec!["a".to_string(), "b".to_string()]);
    }
}
