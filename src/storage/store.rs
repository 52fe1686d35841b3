// ItemStore - Persistent storage for replicated items using sled
//
// Provides typed access for storing:
// - Replicated data items, one key per path
// - The store's logical clock
// - This node's identifier

use crate::identity::PeerId;
use crate::replication::DataItem;
use std::path::Path;
use thiserror::Error;

/// Key prefixes for organizing data
mod keys {
    pub const ITEM_PREFIX: &[u8] = b"item:";
    pub const CLOCK: &[u8] = b"replication:clock";
    pub const NODE_ID: &[u8] = b"node:id";
}

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// Statistics about the storage
#[derive(Clone, Debug)]
pub struct StorageStats {
    /// Number of persisted items
    pub item_count: usize,
    /// Approximate disk size in bytes
    pub disk_size_bytes: u64,
}

/// Persistent key-value store for replicated items
///
/// Uses sled for crash-safe, embedded storage.
/// All writes are atomic and durable after flush.
#[derive(Clone)]
pub struct ItemStore {
    db: sled::Db,
}

impl ItemStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Open a throwaway in-memory store
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Ok(Self { db })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        Ok(StorageStats {
            item_count: self.db.scan_prefix(keys::ITEM_PREFIX).count(),
            disk_size_bytes: self.db.size_on_disk().unwrap_or(0),
        })
    }

    fn item_key(path: &str) -> Vec<u8> {
        [keys::ITEM_PREFIX, path.as_bytes()].concat()
    }

    // ========================================================================
    // REPLICATED ITEMS
    // ========================================================================

    /// Persist an item, replacing whatever was stored for its path
    pub fn save_item(&self, item: &DataItem) -> Result<(), StoreError> {
        let bytes = item.to_bytes().map_err(|e| {
            StoreError::SerializationFailed(format!("item at '{}': {}", item.path(), e))
        })?;
        self.db.insert(Self::item_key(item.path()), bytes)?;
        self.save_clock(item.version())
    }

    /// Load the item stored for a path
    pub fn load_item(&self, path: &str) -> Result<Option<DataItem>, StoreError> {
        match self.db.get(Self::item_key(path))? {
            Some(bytes) => DataItem::from_bytes(&bytes)
                .map(Some)
                .ok_or_else(|| StoreError::DeserializationFailed(format!("item at '{}'", path))),
            None => Ok(None),
        }
    }

    /// Remove the item stored for a path
    pub fn delete_item(&self, path: &str, clock: u64) -> Result<(), StoreError> {
        self.db.remove(Self::item_key(path))?;
        self.save_clock(clock)
    }

    /// Load every persisted item, ordered by path
    pub fn load_items(&self) -> Result<Vec<DataItem>, StoreError> {
        let mut items = Vec::new();
        for result in self.db.scan_prefix(keys::ITEM_PREFIX) {
            let (key, value) = result?;
            let item = DataItem::from_bytes(&value).ok_or_else(|| {
                StoreError::DeserializationFailed(String::from_utf8_lossy(&key).into_owned())
            })?;
            items.push(item);
        }
        Ok(items)
    }

    // ========================================================================
    // LOGICAL CLOCK
    // ========================================================================

    fn save_clock(&self, clock: u64) -> Result<(), StoreError> {
        self.db.insert(keys::CLOCK, clock.to_be_bytes().to_vec())?;
        Ok(())
    }

    /// Load the last clock value written by the replication store
    pub fn load_clock(&self) -> Result<u64, StoreError> {
        match self.db.get(keys::CLOCK)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes[..].try_into().map_err(|_| {
                    StoreError::DeserializationFailed("Invalid clock length".to_string())
                })?;
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    // ========================================================================
    // NODE CONFIGURATION
    // ========================================================================

    /// Save the node ID
    pub fn save_node_id(&self, node_id: &PeerId) -> Result<(), StoreError> {
        self.db.insert(keys::NODE_ID, node_id.as_bytes())?;
        Ok(())
    }

    /// Load the node ID
    pub fn load_node_id(&self) -> Result<Option<PeerId>, StoreError> {
        match self.db.get(keys::NODE_ID)? {
            Some(bytes) => {
                let id = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    StoreError::DeserializationFailed("Invalid node ID encoding".to_string())
                })?;
                Ok(Some(PeerId::new(id)))
            }
            None => Ok(None),
        }
    }

    /// Get the node ID, creating one if it doesn't exist
    pub fn get_or_create_node_id(&self) -> Result<PeerId, StoreError> {
        if let Some(node_id) = self.load_node_id()? {
            return Ok(node_id);
        }

        let node_id = PeerId::generate();
        self.save_node_id(&node_id)?;
        Ok(node_id)
    }
}
