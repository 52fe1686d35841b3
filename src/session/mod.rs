// Session module - HOW A NODE STAYS IN SYNC
// Connection lifecycle, snapshot then incremental change dispatch, messaging

mod config;
mod connection;
mod events;
mod state;

pub use config::SessionConfig;
pub use connection::SyncSession;
pub use events::{ChangeOrigin, DataChange, ReceivedMessage, SessionEvent, SessionEvents};
pub use state::SessionState;
