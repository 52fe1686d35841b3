// Replicated items and the change events they produce

use crate::identity::PeerId;
use serde::{Deserialize, Serialize};

/// A path-addressed payload held by the replication store.
///
/// `data` is the encoded payload; receivers decode it into a fresh instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItem {
    path: String,
    data: Vec<u8>,
    /// Store-wide logical clock value at the time of the write
    version: u64,
    /// Node that published this item
    origin: PeerId,
    /// Wall-clock time of the write (unix ms)
    updated_at: u64,
}

impl DataItem {
    pub fn new(path: &str, data: Vec<u8>, version: u64, origin: PeerId, updated_at: u64) -> Self {
        Self {
            path: path.to_string(),
            data,
            version,
            origin,
            updated_at,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn origin(&self) -> &PeerId {
        &self.origin
    }

    pub fn updated_at(&self) -> u64 {
        self.updated_at
    }

    /// Serialize for persistence
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Deserialize from persisted bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        postcard::from_bytes(bytes).ok()
    }
}

/// Kind of change observed on a path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataEventKind {
    Updated,
    Deleted,
}

/// One change to one path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataEvent {
    kind: DataEventKind,
    item: DataItem,
}

impl DataEvent {
    pub fn updated(item: DataItem) -> Self {
        Self {
            kind: DataEventKind::Updated,
            item,
        }
    }

    /// A deletion carries the last item that lived on the path
    pub fn deleted(item: DataItem) -> Self {
        Self {
            kind: DataEventKind::Deleted,
            item,
        }
    }

    pub fn kind(&self) -> DataEventKind {
        self.kind
    }

    pub fn item(&self) -> &DataItem {
        &self.item
    }

    pub fn into_item(self) -> DataItem {
        self.item
    }
}

/// Changes delivered together: everything that happened since the last delivery
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataEventBatch {
    events: Vec<DataEvent>,
}

impl DataEventBatch {
    pub fn new(events: Vec<DataEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[DataEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Latest event for a path within this batch
    pub fn latest_for(&self, path: &str) -> Option<&DataEvent> {
        self.events.iter().rev().find(|e| e.item.path() == path)
    }

    pub fn into_events(self) -> Vec<DataEvent> {
        self.events
    }
}
