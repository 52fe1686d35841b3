// wearsync - phone/watch companion sync
//
// Layers, leaves first:
// - payload: typed field sets and their self-describing byte codec
// - replication: path-addressed data items with change notifications
// - storage: sled persistence for replicated items
// - messaging: one-shot peer messages through a bounded dispatch queue
// - network: the in-process wearable network that links nodes together
// - session: connect/disconnect lifecycle and event dispatch
// - app: phone and watch companions plus the watch face model

pub mod app;
pub mod error;
pub mod identity;
pub mod messaging;
pub mod network;
pub mod payload;
pub mod replication;
pub mod session;
pub mod storage;

pub use error::SyncError;
