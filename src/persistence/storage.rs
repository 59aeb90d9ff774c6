//! RocksDB storage layer implementation
//!
//! Records live in the `records` column family under `"{category}:{id}"`.

use super::WriteOp;
use crate::graph::{Label, Node, NodeId, PropertyMap};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

const RECORDS_CF: &str = "records";

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB error
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Column family error
    #[error("Column family error: {0}")]
    ColumnFamily(String),

    /// Record without a string id cannot be keyed
    #[error("Record {0} has no id")]
    MissingId(NodeId),

    /// Path is not valid UTF-8
    #[error("Invalid storage path: {0}")]
    InvalidPath(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Serialized record for storage
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNode {
    id: u64,
    label: String,
    properties: Vec<u8>, // Serialized PropertyMap
    created_at: i64,
    updated_at: i64,
}

/// RocksDB-based persistent storage
pub struct PersistentStorage {
    db: Arc<DB>,
}

impl PersistentStorage {
    /// Open or create a new persistent storage
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or_else(|| StorageError::InvalidPath(path.as_ref().display().to_string()))?
            .to_string();

        info!("Opening persistent storage at: {}", path_str);

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_wal_recovery_mode(rocksdb::DBRecoveryMode::PointInTime);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(RECORDS_CF, Self::records_cf_options()),
        ];

        let db = DB::open_cf_descriptors(&opts, &path_str, cf_descriptors)?;

        info!("Persistent storage opened successfully");

        Ok(Self { db: Arc::new(db) })
    }

    fn records_cf_options() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn records_cf(&self) -> StorageResult<&ColumnFamily> {
        self.db
            .cf_handle(RECORDS_CF)
            .ok_or_else(|| StorageError::ColumnFamily(RECORDS_CF.to_string()))
    }

    /// Store a single record
    pub fn put_node(&self, node: &Node) -> StorageResult<()> {
        let cf = self.records_cf()?;
        let (key, value) = Self::encode(node)?;
        self.db.put_cf(cf, key, value)?;
        debug!("Stored {} record {:?}", node.label, node.record_id());
        Ok(())
    }

    /// Get a record by category and id
    pub fn get_node(&self, category: &str, id: &str) -> StorageResult<Option<Node>> {
        let cf = self.records_cf()?;
        match self.db.get_cf(cf, Self::record_key(category, id))? {
            Some(value) => Ok(Some(Self::decode(&value)?)),
            None => Ok(None),
        }
    }

    /// Delete a record
    pub fn delete_node(&self, category: &str, id: &str) -> StorageResult<()> {
        let cf = self.records_cf()?;
        self.db.delete_cf(cf, Self::record_key(category, id))?;
        debug!("Deleted {} record {}", category, id);
        Ok(())
    }

    /// Apply staged writes atomically
    pub fn apply(&self, ops: &[WriteOp]) -> StorageResult<usize> {
        if ops.is_empty() {
            return Ok(0);
        }

        let cf = self.records_cf()?;
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                WriteOp::Put(node) => {
                    let (key, value) = Self::encode(node)?;
                    batch.put_cf(cf, key, value);
                }
                WriteOp::Delete { category, id } => {
                    batch.delete_cf(cf, Self::record_key(category, id));
                }
            }
        }
        self.db.write(batch)?;

        debug!("Applied {} staged writes", ops.len());
        Ok(ops.len())
    }

    /// Flush all data to disk
    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        debug!("Flushed storage to disk");
        Ok(())
    }

    /// Read every stored record (for recovery)
    pub fn scan_nodes(&self) -> StorageResult<Vec<Node>> {
        let cf = self.records_cf()?;
        let mut nodes = Vec::new();

        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            nodes.push(Self::decode(&value)?);
        }

        Ok(nodes)
    }

    /// Remove every stored record
    pub fn clear(&self) -> StorageResult<usize> {
        let cf = self.records_cf()?;
        let mut batch = WriteBatch::default();
        let mut count = 0;
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(cf, key);
            count += 1;
        }
        self.db.write(batch)?;
        Ok(count)
    }

    fn encode(node: &Node) -> StorageResult<(Vec<u8>, Vec<u8>)> {
        let record_id = node.record_id().ok_or(StorageError::MissingId(node.id))?;
        let stored = StoredNode {
            id: node.id.as_u64(),
            label: node.label.as_str().to_string(),
            properties: bincode::serialize(&node.properties)?,
            created_at: node.created_at,
            updated_at: node.updated_at,
        };
        Ok((Self::record_key(node.label.as_str(), record_id), bincode::serialize(&stored)?))
    }

    fn decode(value: &[u8]) -> StorageResult<Node> {
        let stored: StoredNode = bincode::deserialize(value)?;
        let properties: PropertyMap = bincode::deserialize(&stored.properties)?;
        Ok(Node {
            id: NodeId::new(stored.id),
            label: Label::new(stored.label),
            properties,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }

    /// Create record key with category prefix
    fn record_key(category: &str, id: &str) -> Vec<u8> {
        format!("{}:{}", category, id).into_bytes()
    }
}
