// Replication Store - The shared path -> item map every attached node observes
//
// - One live item per path; a write replaces it entirely
// - A store-wide logical clock strictly orders writes
// - Subscribers receive events in publish order, grouped into batches

use crate::error::SyncError;
use crate::identity::PeerId;
use crate::replication::{DataEvent, DataEventBatch, DataItem};
use crate::storage::ItemStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::debug;

/// Handle identifying one registered subscriber
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving side of a store subscription
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<DataEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next batch: one event plus everything already queued behind it.
    ///
    /// Returns None once the subscriber has been removed from the store.
    pub async fn next_batch(&mut self) -> Option<DataEventBatch> {
        let first = self.rx.recv().await?;
        let mut events = vec![first];
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        Some(DataEventBatch::new(events))
    }

    /// Drain whatever is queued right now without waiting
    pub fn try_next_batch(&mut self) -> Option<DataEventBatch> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        if events.is_empty() {
            None
        } else {
            Some(DataEventBatch::new(events))
        }
    }
}

struct StoreInner {
    items: BTreeMap<String, DataItem>,
    clock: u64,
    subscribers: HashMap<SubscriptionId, mpsc::UnboundedSender<DataEvent>>,
    next_subscription: u64,
    storage: Option<ItemStore>,
}

impl StoreInner {
    fn notify(&mut self, event: &DataEvent) {
        // Receivers that went away are pruned on the fly
        self.subscribers
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }
}

/// Shared, eventually-consistent mapping from path to item.
///
/// Cloning yields another handle onto the same store.
#[derive(Clone)]
pub struct ReplicationStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl Default for ReplicationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicationStore {
    /// Create an empty, memory-only store
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                items: BTreeMap::new(),
                clock: 0,
                subscribers: HashMap::new(),
                next_subscription: 0,
                storage: None,
            })),
        }
    }

    /// Create a store backed by sled, restoring previously persisted items
    pub fn with_storage(storage: ItemStore) -> Result<Self, SyncError> {
        let items = storage.load_items()?;
        let mut clock = storage.load_clock()?;

        let mut map = BTreeMap::new();
        for item in items {
            clock = clock.max(item.version());
            map.insert(item.path().to_string(), item);
        }
        debug!(items = map.len(), clock, "restored replicated items");

        Ok(Self {
            inner: Arc::new(Mutex::new(StoreInner {
                items: map,
                clock,
                subscribers: HashMap::new(),
                next_subscription: 0,
                storage: Some(storage),
            })),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Publish encoded payload bytes under a path, replacing any existing item
    pub fn put(&self, path: &str, data: Vec<u8>, origin: &PeerId) -> Result<DataItem, SyncError> {
        let mut inner = self.lock();

        let version = inner.clock + 1;
        let item = DataItem::new(path, data, version, origin.clone(), Self::now());

        if let Some(storage) = &inner.storage {
            storage.save_item(&item)?;
        }

        inner.clock = version;
        inner.items.insert(path.to_string(), item.clone());
        inner.notify(&DataEvent::updated(item.clone()));

        debug!(path, version, origin = %origin, "item updated");
        Ok(item)
    }

    /// Remove the item at a path; emits a deletion when one existed
    pub fn delete(&self, path: &str, origin: &PeerId) -> Result<Option<DataItem>, SyncError> {
        let mut inner = self.lock();

        let Some(previous) = inner.items.get(path).cloned() else {
            return Ok(None);
        };

        let version = inner.clock + 1;
        if let Some(storage) = &inner.storage {
            storage.delete_item(path, version)?;
        }

        inner.clock = version;
        inner.items.remove(path);
        let tombstone = DataItem::new(path, previous.data().to_vec(), version, origin.clone(), Self::now());
        inner.notify(&DataEvent::deleted(tombstone));

        debug!(path, version, origin = %origin, "item deleted");
        Ok(Some(previous))
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Get the live item at a path
    pub fn get(&self, path: &str) -> Option<DataItem> {
        self.lock().items.get(path).cloned()
    }

    /// Current snapshot, ordered by path
    pub fn get_all(&self) -> Vec<DataItem> {
        self.lock().items.values().cloned().collect()
    }

    /// Number of live items
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Current logical clock value
    pub fn clock(&self) -> u64 {
        self.lock().clock
    }

    // ========================================================================
    // SUBSCRIPTIONS
    // ========================================================================

    /// Register for change notifications
    pub fn subscribe(&self) -> Subscription {
        let mut inner = self.lock();
        Self::register(&mut inner)
    }

    /// Register and take the snapshot in one step.
    ///
    /// Any write lands either in the returned snapshot or in the subscription,
    /// never both and never neither.
    pub fn subscribe_with_snapshot(&self) -> (Vec<DataItem>, Subscription) {
        let mut inner = self.lock();
        let snapshot = inner.items.values().cloned().collect();
        let subscription = Self::register(&mut inner);
        (snapshot, subscription)
    }

    fn register(inner: &mut StoreInner) -> Subscription {
        let id = SubscriptionId(inner.next_subscription);
        inner.next_subscription += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscribers.insert(id, tx);
        Subscription { id, rx }
    }

    /// Stop delivering changes to a subscriber
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.lock().subscribers.remove(&id).is_some();
        if !removed {
            debug!(?id, "unsubscribe for unknown subscription");
        }
        removed
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Flush persisted items to disk, if backed by storage
    pub fn flush(&self) -> Result<(), SyncError> {
        if let Some(storage) = &self.lock().storage {
            storage.flush()?;
        }
        Ok(())
    }
}
