// Storage module - PERSISTENCE
// Keeps replicated items durable across restarts using sled

mod store;

pub use store::{ItemStore, StorageStats, StoreError};
