// Messaging module - HOW NODES TALK DIRECTLY
// One-shot messages to peers learned from inbound traffic

mod messenger;
mod peer;

pub use messenger::{Messenger, MessengerStats, SendOutcome, SendReceipt};
pub use peer::{PeerDirectory, PeerInfo};
