//! Record store
//!
//! This module implements the category-tagged record model:
//! - Nodes carrying one category label and JSON-like properties
//! - Unique `id` constraints per category
//! - Staged writes flushed to RocksDB on commit

pub mod node;
pub mod property;
pub mod store;
pub mod types;

// Re-export main types
pub use node::{Node, ID_KEY};
pub use property::{properties_from_json, properties_to_json, PropertyMap, PropertyValue};
pub use store::{Filter, GraphError, GraphResult, GraphStore};
pub use types::{Label, NodeId};

/// A record as exchanged with callers: field name to JSON value
pub type Record = serde_json::Map<String, serde_json::Value>;
