//! Manager for uniqueness constraints
//!
//! Handles creation, lookup and maintenance of unique indices.

use super::unique::UniqueIndex;
use crate::graph::{Label, NodeId};
use std::collections::HashMap;

/// Key for identifying a constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstraintKey {
    pub label: Label,
    pub property: String,
}

impl ConstraintKey {
    fn new(label: &Label, property: &str) -> Self {
        Self {
            label: label.clone(),
            property: property.to_string(),
        }
    }
}

/// Manager for all unique indices
#[derive(Debug, Default)]
pub struct ConstraintManager {
    indices: HashMap<ConstraintKey, UniqueIndex>,
}

impl ConstraintManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a constraint for a label and property; existing ones are kept
    pub fn create_constraint(&mut self, label: Label, property: &str) -> bool {
        let key = ConstraintKey { label, property: property.to_string() };
        if self.indices.contains_key(&key) {
            return false;
        }
        self.indices.insert(key, UniqueIndex::new());
        true
    }

    /// Check if a constraint exists
    pub fn has_constraint(&self, label: &Label, property: &str) -> bool {
        self.indices.contains_key(&ConstraintKey::new(label, property))
    }

    /// Owner of `value`, when the pair is constrained and the value taken
    pub fn lookup(&self, label: &Label, property: &str, value: &str) -> Option<NodeId> {
        self.indices
            .get(&ConstraintKey::new(label, property))
            .and_then(|index| index.get(value))
    }

    /// Would claiming `value` for `node_id` violate a constraint?
    pub fn check(&self, label: &Label, property: &str, value: &str, node_id: NodeId) -> Result<(), NodeId> {
        match self.lookup(label, property, value) {
            Some(owner) if owner != node_id => Err(owner),
            _ => Ok(()),
        }
    }

    /// Record `value` for `node_id`; unconstrained pairs are ignored
    pub fn insert(&mut self, label: &Label, property: &str, value: &str, node_id: NodeId) -> Result<(), NodeId> {
        match self.indices.get_mut(&ConstraintKey::new(label, property)) {
            Some(index) => index.insert(value, node_id),
            None => Ok(()),
        }
    }

    pub fn remove(&mut self, label: &Label, property: &str, value: &str) {
        if let Some(index) = self.indices.get_mut(&ConstraintKey::new(label, property)) {
            index.remove(value);
        }
    }

    /// Empty every index while keeping the constraints themselves
    pub fn clear_entries(&mut self) {
        for index in self.indices.values_mut() {
            index.clear();
        }
    }

    pub fn constraint_count(&self) -> usize {
        self.indices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconstrained_pairs_accept_duplicates() {
        let mut manager = ConstraintManager::new();
        let label = Label::new("Person");
        assert!(manager.insert(&label, "id", "p1", NodeId::new(1)).is_ok());
        assert!(manager.insert(&label, "id", "p1", NodeId::new(2)).is_ok());
        assert_eq!(manager.lookup(&label, "id", "p1"), None);
    }

    #[test]
    fn test_constraint_rejects_second_owner() {
        let mut manager = ConstraintManager::new();
        let label = Label::new("Person");
        assert!(manager.create_constraint(label.clone(), "id"));
        assert!(!manager.create_constraint(label.clone(), "id"));

        manager.insert(&label, "id", "p1", NodeId::new(1)).unwrap();
        assert_eq!(manager.check(&label, "id", "p1", NodeId::new(2)), Err(NodeId::new(1)));
        assert!(manager.check(&label, "id", "p1", NodeId::new(1)).is_ok());

        // Other categories are independent
        let other = Label::new("Case");
        manager.create_constraint(other.clone(), "id");
        assert!(manager.insert(&other, "id", "p1", NodeId::new(3)).is_ok());

        manager.remove(&label, "id", "p1");
        assert!(manager.check(&label, "id", "p1", NodeId::new(2)).is_ok());
        assert_eq!(manager.constraint_count(), 2);
    }
}
