// Network module - THE LINK
// In-process wearable network: attachment, message routing and link faults

mod hub;

pub use hub::{InboundMessage, Link, LinkEvent, NetworkConfig, WearableNetwork};
