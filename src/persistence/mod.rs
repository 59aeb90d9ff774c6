//! Persistence layer
//!
//! The in-memory store stages its writes as `WriteOp`s; `commit()` hands
//! them to RocksDB as one atomic batch.

pub mod storage;

pub use storage::{PersistentStorage, StorageError, StorageResult};

use crate::graph::Node;

/// Durable target for committed writes
pub trait RecordLog: Send + Sync {
    /// Apply staged writes atomically; all or none reach the log
    fn apply(&self, ops: &[WriteOp]) -> StorageResult<usize>;

    /// Remove every persisted record
    fn clear(&self) -> StorageResult<usize>;
}

impl RecordLog for PersistentStorage {
    fn apply(&self, ops: &[WriteOp]) -> StorageResult<usize> {
        PersistentStorage::apply(self, ops)
    }

    fn clear(&self) -> StorageResult<usize> {
        PersistentStorage::clear(self)
    }
}

/// A staged write waiting for the next commit
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Create or replace a record
    Put(Node),
    /// Remove a record
    Delete { category: String, id: String },
}
