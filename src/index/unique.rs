//! Hash index enforcing one node per value

use crate::graph::NodeId;
use std::collections::HashMap;

/// Index for a unique property on a specific label
#[derive(Debug, Clone, Default)]
pub struct UniqueIndex {
    /// Value -> owning node
    entries: HashMap<String, NodeId>,
}

impl UniqueIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `value` for `node_id`.
    ///
    /// Returns the current owner when the value is taken by another node.
    pub fn insert(&mut self, value: &str, node_id: NodeId) -> Result<(), NodeId> {
        match self.entries.get(value) {
            Some(owner) if *owner != node_id => Err(*owner),
            _ => {
                self.entries.insert(value.to_string(), node_id);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, value: &str) -> Option<NodeId> {
        self.entries.remove(value)
    }

    pub fn get(&self, value: &str) -> Option<NodeId> {
        self.entries.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_index_ops() {
        let mut index = UniqueIndex::new();
        let n1 = NodeId::new(1);
        let n2 = NodeId::new(2);

        assert!(index.insert("a1111", n1).is_ok());
        // Re-claiming by the owner is fine
        assert!(index.insert("a1111", n1).is_ok());
        assert_eq!(index.insert("a1111", n2), Err(n1));
        assert_eq!(index.get("a1111"), Some(n1));

        assert_eq!(index.remove("a1111"), Some(n1));
        assert!(index.insert("a1111", n2).is_ok());
        assert_eq!(index.len(), 1);
    }
}
