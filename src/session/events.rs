// Session events - What the session dispatches to the application

use crate::identity::PeerId;
use crate::payload::Payload;
use crate::replication::DataEventKind;
use crate::session::SessionState;
use tokio::sync::mpsc;

/// Where a data change came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// State present when the session (re)entered Connected
    Snapshot,
    /// A write observed after the snapshot
    Incremental,
}

/// One decoded change to one path
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataChange {
    pub kind: DataEventKind,
    pub path: String,
    /// Decoded payload; empty for deletions
    pub payload: Payload,
    pub version: u64,
    pub source: PeerId,
}

/// A decoded inbound message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub source: PeerId,
    pub path: String,
    pub payload: Payload,
}

/// Events delivered to the application, in dispatch order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    DataChanged {
        origin: ChangeOrigin,
        changes: Vec<DataChange>,
    },
    MessageReceived(ReceivedMessage),
}

impl SessionEvent {
    /// Latest change for a path carried by this event, if any
    pub fn change_for(&self, path: &str) -> Option<&DataChange> {
        match self {
            Self::DataChanged { changes, .. } => changes.iter().rev().find(|c| c.path == path),
            _ => None,
        }
    }
}

/// Receiving side of a session's event stream
pub struct SessionEvents {
    rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionEvents {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the next event; None once the session is dropped
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    /// Take an event if one is queued
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        self.rx.try_recv().ok()
    }

    /// Take everything queued right now
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}
