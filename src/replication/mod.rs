// Replication module - Path-addressed data items kept consistent across nodes

mod item;
mod store;

pub use item::{DataEvent, DataEventBatch, DataEventKind, DataItem};
pub use store::{ReplicationStore, Subscription, SubscriptionId};
