use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a sync session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Capacity of the outgoing message dispatch queue
    pub dispatch_queue_depth: usize,
    /// Give up on an attach attempt after this long. None waits indefinitely.
    pub connect_timeout_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dispatch_queue_depth: 64,
            connect_timeout_ms: None,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dispatch_queue_depth(mut self, depth: usize) -> Self {
        self.dispatch_queue_depth = depth;
        self
    }

    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.dispatch_queue_depth == 0 {
            return Err(SyncError::TransportFailure(
                "dispatch_queue_depth cannot be 0".to_string(),
            ));
        }
        if self.connect_timeout_ms == Some(0) {
            return Err(SyncError::TransportFailure(
                "connect_timeout_ms cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}
