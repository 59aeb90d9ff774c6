//! In-memory record store with optional RocksDB durability
//!
//! Records are nodes tagged with their category label. Lookups by
//! `(category, id)` go through the unique index when a constraint exists
//! for the category and fall back to a label scan otherwise.

use super::node::{Node, ID_KEY};
use super::property::{properties_from_json, PropertyMap, PropertyValue};
use super::types::{Label, NodeId};
use super::Record;
use crate::index::ConstraintManager;
use crate::persistence::{PersistentStorage, RecordLog, StorageError, WriteOp};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("{category} {id} not found")]
    NotFound { category: String, id: String },

    #[error("{category} {id} already exists")]
    ConstraintViolation { category: String, id: String },

    #[error("{0} record has no string id")]
    MissingId(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Property-equality filter over one category
#[derive(Debug, Clone)]
pub struct Filter {
    pub category: Label,
    pub equals: PropertyMap,
}

impl Filter {
    /// Every record of a category
    pub fn category(category: impl Into<Label>) -> Self {
        Self {
            category: category.into(),
            equals: PropertyMap::new(),
        }
    }

    /// Add an equality condition
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.equals.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, node: &Node) -> bool {
        node.has_label(&self.category)
            && self.equals.iter().all(|(key, wanted)| {
                node.get_property(key)
                    .map(|actual| actual.matches(wanted))
                    .unwrap_or_else(|| wanted.is_null())
            })
    }
}

/// Category-tagged record storage
///
/// - nodes: NodeId -> Node, ordered by creation
/// - label_index: Label -> NodeIds (index for fast category scans)
/// - constraints: unique `id` per category
/// - pending: writes staged until the next `commit`
pub struct GraphStore {
    nodes: BTreeMap<NodeId, Node>,
    label_index: HashMap<Label, BTreeSet<NodeId>>,
    constraints: ConstraintManager,
    pending: Vec<WriteOp>,
    persistence: Option<Box<dyn RecordLog>>,
    next_node_id: u64,
}

impl GraphStore {
    /// Create a new empty, memory-only store
    pub fn new() -> Self {
        GraphStore {
            nodes: BTreeMap::new(),
            label_index: HashMap::new(),
            constraints: ConstraintManager::new(),
            pending: Vec::new(),
            persistence: None,
            next_node_id: 1,
        }
    }

    /// Open a store backed by RocksDB at `path`, recovering existing records
    pub fn open(path: impl AsRef<Path>) -> GraphResult<Self> {
        let storage = PersistentStorage::open(path)?;
        let recovered = storage.scan_nodes()?;

        let mut store = Self::new();
        let count = recovered.len();
        for node in recovered {
            store.insert_recovered_node(node);
        }
        store.persistence = Some(Box::new(storage));

        info!("Recovered {} records from disk", count);
        Ok(store)
    }

    /// Create an empty store whose commits go to `log`
    pub fn with_log(log: Box<dyn RecordLog>) -> Self {
        let mut store = Self::new();
        store.persistence = Some(log);
        store
    }

    /// Whether writes reach disk on commit
    pub fn is_persistent(&self) -> bool {
        self.persistence.is_some()
    }

    /// Register a uniqueness constraint on `id` for each category.
    ///
    /// New constraints are backfilled from existing records and fail when
    /// those already contain duplicates.
    pub fn create_id_constraints<I, L>(&mut self, categories: I) -> GraphResult<()>
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        for category in categories {
            let label = category.into();
            if !self.constraints.create_constraint(label.clone(), ID_KEY) {
                continue;
            }
            let members: Vec<NodeId> = self.label_ids(&label).collect();
            for node_id in members {
                let Some(id) = self.nodes.get(&node_id).and_then(|n| n.record_id()) else {
                    continue;
                };
                if self.constraints.insert(&label, ID_KEY, id, node_id).is_err() {
                    return Err(GraphError::ConstraintViolation {
                        category: label.to_string(),
                        id: id.to_string(),
                    });
                }
            }
            debug!("Created unique_{}_id constraint", label.as_str().to_lowercase());
        }
        Ok(())
    }

    /// All records matching a filter, in creation order
    pub fn find(&self, filter: &Filter) -> Vec<Record> {
        self.label_ids(&filter.category)
            .filter_map(|id| self.nodes.get(&id))
            .filter(|node| filter.matches(node))
            .map(Node::to_record)
            .collect()
    }

    /// The record of a category with the given id
    pub fn find_one(&self, category: &str, id: &str) -> Option<Record> {
        self.locate(&Label::new(category), id)
            .and_then(|node_id| self.nodes.get(&node_id))
            .map(Node::to_record)
    }

    /// Insert a new record; its id must be free within the category
    pub fn insert(&mut self, category: &str, record: Record) -> GraphResult<Record> {
        let label = Label::new(category);
        let id = Self::record_id(category, &record)?;

        if self.locate(&label, &id).is_some() && self.constraints.has_constraint(&label, ID_KEY) {
            return Err(GraphError::ConstraintViolation {
                category: category.to_string(),
                id,
            });
        }

        let node_id = NodeId::new(self.next_node_id);
        self.next_node_id += 1;

        let node = Node::new_with_properties(node_id, label.clone(), properties_from_json(&record));
        // Checked above, cannot collide
        let _ = self.constraints.insert(&label, ID_KEY, &id, node_id);
        self.label_index.entry(label).or_default().insert(node_id);
        self.pending.push(WriteOp::Put(node.clone()));
        self.nodes.insert(node_id, node);

        debug!("Inserted {} {}", category, id);
        Ok(record)
    }

    /// Insert or replace a record
    pub fn store(&mut self, category: &str, record: Record) -> GraphResult<Record> {
        let id = Self::record_id(category, &record)?;
        if self.locate(&Label::new(category), &id).is_some() {
            self.update(category, &id, record)
        } else {
            self.insert(category, record)
        }
    }

    /// Replace the fields of an existing record
    pub fn update(&mut self, category: &str, id: &str, record: Record) -> GraphResult<Record> {
        let label = Label::new(category);
        let node_id = self.locate(&label, id).ok_or_else(|| GraphError::NotFound {
            category: category.to_string(),
            id: id.to_string(),
        })?;
        let new_id = Self::record_id(category, &record)?;

        if new_id != id {
            if self.constraints.check(&label, ID_KEY, &new_id, node_id).is_err() {
                return Err(GraphError::ConstraintViolation {
                    category: category.to_string(),
                    id: new_id,
                });
            }
            self.constraints.remove(&label, ID_KEY, id);
            let _ = self.constraints.insert(&label, ID_KEY, &new_id, node_id);
            self.pending.push(WriteOp::Delete {
                category: category.to_string(),
                id: id.to_string(),
            });
        }

        let node = self.nodes.get_mut(&node_id).ok_or_else(|| GraphError::NotFound {
            category: category.to_string(),
            id: id.to_string(),
        })?;
        node.replace_properties(properties_from_json(&record));
        self.pending.push(WriteOp::Put(node.clone()));

        debug!("Updated {} {}", category, new_id);
        Ok(record)
    }

    /// Remove a record, returning its last state
    pub fn delete(&mut self, category: &str, id: &str) -> GraphResult<Record> {
        let label = Label::new(category);
        let node_id = self.locate(&label, id).ok_or_else(|| GraphError::NotFound {
            category: category.to_string(),
            id: id.to_string(),
        })?;
        let node = self.nodes.remove(&node_id).ok_or_else(|| GraphError::NotFound {
            category: category.to_string(),
            id: id.to_string(),
        })?;

        if let Some(members) = self.label_index.get_mut(&label) {
            members.remove(&node_id);
        }
        self.constraints.remove(&label, ID_KEY, id);
        self.pending.push(WriteOp::Delete {
            category: category.to_string(),
            id: id.to_string(),
        });

        debug!("Deleted {} {}", category, id);
        Ok(node.to_record())
    }

    /// Flush staged writes; returns how many were applied.
    ///
    /// On failure the writes stay staged and the next commit retries them.
    pub fn commit(&mut self) -> GraphResult<usize> {
        let applied = match &self.persistence {
            Some(log) => log.apply(&self.pending)?,
            None => self.pending.len(),
        };
        self.pending.clear();
        Ok(applied)
    }

    /// Number of writes staged since the last commit
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Remove every record (constraints survive)
    pub fn clear(&mut self) -> GraphResult<()> {
        self.nodes.clear();
        self.label_index.clear();
        self.constraints.clear_entries();
        self.pending.clear();
        if let Some(log) = &self.persistence {
            let removed = log.clear()?;
            info!("Cleared {} persisted records", removed);
        }
        Ok(())
    }

    /// Get total number of records
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of records per category
    pub fn category_counts(&self) -> BTreeMap<String, usize> {
        self.label_index
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(label, ids)| (label.as_str().to_string(), ids.len()))
            .collect()
    }

    fn label_ids<'a>(&'a self, label: &Label) -> impl Iterator<Item = NodeId> + 'a {
        self.label_index
            .get(label)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    fn locate(&self, label: &Label, id: &str) -> Option<NodeId> {
        if self.constraints.has_constraint(label, ID_KEY) {
            return self.constraints.lookup(label, ID_KEY, id);
        }
        self.label_ids(label).find(|node_id| {
            self.nodes
                .get(node_id)
                .and_then(|n| n.record_id())
                .map(|rid| rid == id)
                .unwrap_or(false)
        })
    }

    fn record_id(category: &str, record: &Record) -> GraphResult<String> {
        record
            .get(ID_KEY)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| GraphError::MissingId(category.to_string()))
    }

    fn insert_recovered_node(&mut self, node: Node) {
        let node_id = node.id;
        if node_id.as_u64() >= self.next_node_id {
            self.next_node_id = node_id.as_u64() + 1;
        }
        self.label_index.entry(node.label.clone()).or_default().insert(node_id);
        self.nodes.insert(node_id, node);
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}
