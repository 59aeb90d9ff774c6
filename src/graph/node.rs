//! Node implementation for the category-tagged store

use super::property::{properties_to_json, PropertyMap, PropertyValue};
use super::types::{Label, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key holding the record's string identifier
pub const ID_KEY: &str = "id";

/// A stored record
///
/// Nodes have:
/// - An internal handle
/// - One category label
/// - Properties (the record's fields, `id` included)
/// - Creation and update timestamps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Internal handle for this node
    pub id: NodeId,

    /// Category tag
    pub label: Label,

    /// Record fields
    pub properties: PropertyMap,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Node {
    /// Create a new node with no properties
    pub fn new(id: NodeId, label: impl Into<Label>) -> Self {
        Self::new_with_properties(id, label, PropertyMap::new())
    }

    /// Create a new node with a label and properties
    pub fn new_with_properties(id: NodeId, label: impl Into<Label>, properties: PropertyMap) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Node {
            id,
            label: label.into(),
            properties,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if node carries a specific label
    pub fn has_label(&self, label: &Label) -> bool {
        &self.label == label
    }

    /// The record's string id, if it has one
    pub fn record_id(&self) -> Option<&str> {
        self.properties.get(ID_KEY).and_then(|v| v.as_string())
    }

    /// Set a property value
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Option<PropertyValue> {
        let old = self.properties.insert(key.into(), value.into());
        self.update_timestamp();
        old
    }

    /// Replace every property at once
    pub fn replace_properties(&mut self, properties: PropertyMap) {
        self.properties = properties;
        self.update_timestamp();
    }

    /// Get a property value
    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Remove a property
    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        let removed = self.properties.shift_remove(key);
        if removed.is_some() {
            self.update_timestamp();
        }
        removed
    }

    /// Check if property exists
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    /// Get number of properties
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// The node as an external record, without its category
    pub fn to_record(&self) -> Map<String, Value> {
        properties_to_json(&self.properties)
    }

    fn update_timestamp(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_node() {
        let node = Node::new(NodeId::new(1), "Person");
        assert_eq!(node.id, NodeId::new(1));
        assert!(node.has_label(&Label::new("Person")));
        assert!(!node.has_label(&Label::new("Case")));
    }

    #[test]
    fn test_node_properties() {
        let mut node = Node::new(NodeId::new(4), "Person");

        node.set_property("id", "maparent");
        node.set_property("name", "Marc-Antoine Parent");
        node.set_property("active", true);

        assert_eq!(node.record_id(), Some("maparent"));
        assert_eq!(node.get_property("active").unwrap().as_boolean(), Some(true));
        assert_eq!(node.property_count(), 3);

        let removed = node.remove_property("active");
        assert!(removed.is_some());
        assert_eq!(node.property_count(), 2);
        assert!(!node.has_property("active"));
    }

    #[test]
    fn test_node_to_record_keeps_field_order() {
        let mut node = Node::new(NodeId::new(2), "Narrative");
        node.set_property("id", "n1");
        node.set_property("title", "Assessment");
        node.set_property("authors", vec![PropertyValue::from("maparent")]);

        let record = Value::Object(node.to_record());
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            serde_json::to_string(&json!({"id": "n1", "title": "Assessment", "authors": ["maparent"]})).unwrap()
        );
    }

    #[test]
    fn test_replacing_fields_bumps_updated_at() {
        let mut node = Node::new(NodeId::new(6), "Role");
        node.set_property("id", "r1");
        let created = node.created_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        let mut fields = PropertyMap::new();
        fields.insert("id".to_string(), PropertyValue::from("r1"));
        fields.insert("name".to_string(), PropertyValue::from("Scribe"));
        node.replace_properties(fields);

        assert_eq!(node.created_at, created);
        assert!(node.updated_at > created);
        assert_eq!(node.get_property("name").and_then(|v| v.as_string()), Some("Scribe"));
    }

    #[test]
    fn test_identity_is_the_internal_handle() {
        let mut first = Node::new(NodeId::new(7), "Skill");
        first.set_property("id", "s1");
        let mut renamed = first.clone();
        renamed.set_property("id", "s2");

        assert_eq!(first, renamed);
        assert_ne!(first, Node::new(NodeId::new(8), "Skill"));
    }
}
