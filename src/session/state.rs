// Session State - The connect/disconnect state machine

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a sync session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// Link temporarily down; comes back without a new connect()
    Suspended,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl SessionState {
    /// Check if transition to another state is valid
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected)
                | (Self::Connecting, Self::Disconnected) // Attach failed or cancelled
                | (Self::Connected, Self::Suspended)
                | (Self::Connected, Self::Disconnected)
                | (Self::Suspended, Self::Connected)
                | (Self::Suspended, Self::Disconnected)
        )
    }

    /// Check if writes (put/send) are accepted in this state
    pub fn accepts_writes(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if the session holds (or is acquiring) a link
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Suspended => "suspended",
        };
        f.write_str(name)
    }
}
