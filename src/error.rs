// Sync errors - Reported through completion channels, never thrown across the event loop

use crate::identity::PeerId;
use crate::payload::CodecError;
use crate::session::SessionState;
use crate::storage::StoreError;
use thiserror::Error;

/// Errors surfaced by the sync layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Not connected")]
    NotConnected,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SyncError {
    /// Check if this error means the operation was attempted outside a live session
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::NotConnected)
    }

    /// Check if a later attempt (after the next successful connect) could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotConnected | Self::TransportFailure(_))
    }
}

impl From<CodecError> for SyncError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::MalformedPayload(reason) => Self::MalformedPayload(reason),
            other => Self::MalformedPayload(other.to_string()),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }
}
