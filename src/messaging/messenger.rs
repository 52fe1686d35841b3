// Messenger - One-shot peer messages through a single bounded dispatch queue
//
// A single worker drains the queue in FIFO order, so completions fire at most
// once and in the order sends were issued. Delivery is at-most-once; nothing
// is retried.

use crate::error::SyncError;
use crate::identity::PeerId;
use crate::network::WearableNetwork;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Result of a send, reported on the receipt
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Failed(SyncError),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// The failure reason, if the send failed
    pub fn error(&self) -> Option<&SyncError> {
        match self {
            Self::Delivered => None,
            Self::Failed(err) => Some(err),
        }
    }
}

/// Completion channel for one send
#[derive(Debug)]
pub struct SendReceipt {
    rx: oneshot::Receiver<SendOutcome>,
}

impl SendReceipt {
    /// A receipt that is already resolved
    pub fn resolved(outcome: SendOutcome) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }

    /// Wait for the outcome
    pub async fn outcome(self) -> SendOutcome {
        self.rx.await.unwrap_or_else(|_| {
            SendOutcome::Failed(SyncError::TransportFailure(
                "dispatch worker stopped".to_string(),
            ))
        })
    }
}

struct OutgoingMessage {
    source: PeerId,
    target: PeerId,
    path: String,
    data: Vec<u8>,
    reply: oneshot::Sender<SendOutcome>,
}

/// Counters kept by the dispatch worker
#[derive(Debug, Default)]
pub struct MessengerStats {
    submitted: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl MessengerStats {
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Handle onto a session's dispatch queue
#[derive(Clone)]
pub struct Messenger {
    tx: mpsc::Sender<OutgoingMessage>,
    stats: Arc<MessengerStats>,
}

impl Messenger {
    /// Start the dispatch worker. Must be called inside a tokio runtime.
    pub fn spawn(network: WearableNetwork, queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let stats = Arc::new(MessengerStats::default());

        tokio::spawn(run_dispatch(network, rx, stats.clone()));

        Self { tx, stats }
    }

    /// Queue a message for delivery; never blocks
    pub fn submit(&self, source: &PeerId, target: &PeerId, path: &str, data: Vec<u8>) -> SendReceipt {
        let (reply, rx) = oneshot::channel();
        let message = OutgoingMessage {
            source: source.clone(),
            target: target.clone(),
            path: path.to_string(),
            data,
            reply,
        };

        match self.tx.try_send(message) {
            Ok(()) => {
                self.stats.submitted.fetch_add(1, Ordering::Relaxed);
                SendReceipt { rx }
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(peer = %message.target, path = %message.path, "dispatch queue full");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                SendReceipt::resolved(SendOutcome::Failed(SyncError::TransportFailure(
                    "dispatch queue full".to_string(),
                )))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                SendReceipt::resolved(SendOutcome::Failed(SyncError::TransportFailure(
                    "dispatch worker stopped".to_string(),
                )))
            }
        }
    }

    pub fn stats(&self) -> &MessengerStats {
        &self.stats
    }
}

async fn run_dispatch(
    network: WearableNetwork,
    mut rx: mpsc::Receiver<OutgoingMessage>,
    stats: Arc<MessengerStats>,
) {
    while let Some(message) = rx.recv().await {
        let outcome = match network.deliver(
            &message.source,
            &message.target,
            &message.path,
            message.data,
        ) {
            Ok(()) => {
                stats.delivered.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Delivered
            }
            Err(err) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Failed(err)
            }
        };

        debug!(
            peer = %message.target,
            path = %message.path,
            delivered = outcome.is_delivered(),
            "send completed"
        );
        // Caller may have dropped the receipt
        let _ = message.reply.send(outcome);
    }
}
