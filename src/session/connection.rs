// Sync Session - Connect/disconnect lifecycle over the wearable network
//
// - connect(): Disconnected -> Connecting -> Connected (or back to Disconnected)
// - On entering Connected the current snapshot is dispatched exactly once,
//   then incremental changes follow
// - put/send outside Connected fail immediately; nothing is buffered
// - Every transition happens under one mutex; late callbacks from an older
//   connection are recognised by their epoch and dropped

use crate::error::SyncError;
use crate::identity::PeerId;
use crate::messaging::{Messenger, MessengerStats, PeerDirectory, SendOutcome, SendReceipt};
use crate::network::{InboundMessage, Link, LinkEvent, WearableNetwork};
use crate::payload::{Payload, PayloadCodec};
use crate::replication::{DataEventBatch, DataEventKind, DataItem, Subscription, SubscriptionId};
use crate::session::{
    ChangeOrigin, DataChange, ReceivedMessage, SessionConfig, SessionEvent, SessionEvents,
    SessionState,
};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

struct SessionCore {
    state: SessionState,
    /// Bumped on every connect and disconnect
    epoch: u64,
    link_generation: Option<u64>,
    subscription: Option<SubscriptionId>,
    pump: Option<JoinHandle<()>>,
    peers: PeerDirectory,
}

struct Shared {
    node_id: PeerId,
    network: WearableNetwork,
    core: Mutex<SessionCore>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

/// A node's logical connection to the sync subsystem.
///
/// Cloning yields another handle onto the same session. The session is torn
/// down when the last handle is dropped.
#[derive(Clone)]
pub struct SyncSession {
    config: SessionConfig,
    messenger: Messenger,
    shared: Arc<Shared>,
}

impl SyncSession {
    /// Create a disconnected session. Must be called inside a tokio runtime.
    pub fn new(
        node_id: PeerId,
        network: WearableNetwork,
        config: SessionConfig,
    ) -> (Self, SessionEvents) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let messenger = Messenger::spawn(network.clone(), config.dispatch_queue_depth);

        let shared = Arc::new(Shared {
            node_id,
            network,
            core: Mutex::new(SessionCore {
                state: SessionState::Disconnected,
                epoch: 0,
                link_generation: None,
                subscription: None,
                pump: None,
                peers: PeerDirectory::new(),
            }),
            events: events_tx,
        });

        let session = Self {
            config,
            messenger,
            shared,
        };
        (session, SessionEvents::new(events_rx))
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Connect to the network.
    ///
    /// Resolves once the attach attempt settles. On success the snapshot has
    /// already been queued on the event stream when this returns.
    pub async fn connect(&self) -> Result<(), SyncError> {
        let epoch = {
            let mut core = self.shared.lock();
            if core.state != SessionState::Disconnected {
                return Err(SyncError::InvalidTransition {
                    from: core.state,
                    to: SessionState::Connecting,
                });
            }
            core.epoch += 1;
            self.shared.transition(&mut core, SessionState::Connecting);
            core.epoch
        };

        let attach = self.shared.network.attach(&self.shared.node_id);
        let attempt = match self.config.connect_timeout() {
            Some(limit) => match timeout(limit, attach).await {
                Ok(result) => result,
                Err(_) => Err(SyncError::TransportFailure("connect timed out".to_string())),
            },
            None => attach.await,
        };

        let mut core = self.shared.lock();

        if core.epoch != epoch || core.state != SessionState::Connecting {
            // disconnect() ran while the attach was in flight
            if let Ok(link) = &attempt {
                self.shared.network.detach(link.node(), link.generation());
            }
            debug!(node = %self.shared.node_id, "discarding attach result after disconnect");
            return Err(SyncError::NotConnected);
        }

        match attempt {
            Ok(link) => {
                let (snapshot, subscription) =
                    self.shared.network.store().subscribe_with_snapshot();

                core.link_generation = Some(link.generation());
                core.subscription = Some(subscription.id());
                self.shared.transition(&mut core, SessionState::Connected);
                self.shared.dispatch_snapshot(snapshot);

                core.pump = Some(tokio::spawn(run_pump(
                    Arc::downgrade(&self.shared),
                    epoch,
                    link,
                    subscription,
                )));
                Ok(())
            }
            Err(err) => {
                warn!(node = %self.shared.node_id, error = %err, "connect failed");
                self.shared.transition(&mut core, SessionState::Disconnected);
                Err(err)
            }
        }
    }

    /// Disconnect immediately: unsubscribe, detach and forget known peers
    pub fn disconnect(&self) -> Result<(), SyncError> {
        let mut core = self.shared.lock();
        if !core.state.is_active() {
            return Err(SyncError::InvalidTransition {
                from: core.state,
                to: SessionState::Disconnected,
            });
        }

        core.epoch += 1;
        self.shared.teardown(&mut core);
        self.shared.transition(&mut core, SessionState::Disconnected);
        Ok(())
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Publish a payload as the replicated item at `path`
    pub async fn put(&self, path: &str, payload: &Payload) -> Result<DataItem, SyncError> {
        let data = PayloadCodec::encode(payload)?;

        let core = self.shared.lock();
        if !core.state.accepts_writes() {
            return Err(SyncError::NotConnected);
        }
        let item = self.shared.network.publish(&self.shared.node_id, path, data)?;
        drop(core);

        debug!(node = %self.shared.node_id, path, version = item.version(), "put");
        Ok(item)
    }

    /// Send a one-shot message to a peer previously seen inbound.
    ///
    /// Never blocks; the outcome arrives on the returned receipt.
    pub fn send(&self, peer: &PeerId, path: &str, payload: &Payload) -> SendReceipt {
        let data = match PayloadCodec::encode(payload) {
            Ok(data) => data,
            Err(err) => return SendReceipt::resolved(SendOutcome::Failed(err.into())),
        };

        let core = self.shared.lock();
        if !core.state.accepts_writes() {
            return SendReceipt::resolved(SendOutcome::Failed(SyncError::NotConnected));
        }
        if !core.peers.contains(peer) {
            debug!(node = %self.shared.node_id, peer = %peer, path, "send to unknown peer");
            return SendReceipt::resolved(SendOutcome::Failed(SyncError::UnknownPeer(
                peer.clone(),
            )));
        }

        // Submitted under the lock so queue order matches issue order
        self.messenger
            .submit(&self.shared.node_id, peer, path, data)
    }

    /// Reply to the source of an inbound message
    pub fn reply(&self, to: &ReceivedMessage, path: &str, payload: &Payload) -> SendReceipt {
        self.send(&to.source, path, payload)
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Decoded current snapshot, ordered by path. Undecodable items are skipped.
    pub fn get_all(&self) -> Result<Vec<(String, Payload)>, SyncError> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }

        Ok(self
            .shared
            .network
            .store()
            .get_all()
            .iter()
            .filter_map(|item| self.shared.decode_change(DataEventKind::Updated, item))
            .map(|change| (change.path, change.payload))
            .collect())
    }

    /// Decoded current payload at one path
    pub fn get(&self, path: &str) -> Result<Option<Payload>, SyncError> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }

        match self.shared.network.store().get(path) {
            Some(item) => Ok(Some(PayloadCodec::decode(item.data())?)),
            None => Ok(None),
        }
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    pub fn node_id(&self) -> &PeerId {
        &self.shared.node_id
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Peers observed as message sources during this connection
    pub fn known_peers(&self) -> Vec<PeerId> {
        self.shared.lock().peers.peers()
    }

    /// Source of the most recent inbound message
    pub fn last_peer(&self) -> Option<PeerId> {
        self.shared.lock().peers.last_inbound().cloned()
    }

    pub fn messenger_stats(&self) -> &MessengerStats {
        self.messenger.stats()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

// ============================================================================
// SHARED STATE / DISPATCH
// ============================================================================

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, core: &mut SessionCore, to: SessionState) {
        let from = core.state;
        debug_assert!(from.can_transition_to(&to), "{} -> {}", from, to);
        core.state = to;

        info!(node = %self.node_id, %from, %to, "session state changed");
        let _ = self.events.send(SessionEvent::StateChanged { from, to });
    }

    /// Release everything the current connection holds
    fn teardown(&self, core: &mut SessionCore) {
        if let Some(id) = core.subscription.take() {
            self.network.store().unsubscribe(id);
        }
        if let Some(generation) = core.link_generation.take() {
            self.network.detach(&self.node_id, generation);
        }
        if let Some(pump) = core.pump.take() {
            pump.abort();
        }
        core.peers.clear();
    }

    fn is_current(core: &SessionCore, epoch: u64, state: SessionState) -> bool {
        core.epoch == epoch && core.state == state
    }

    fn decode_change(&self, kind: DataEventKind, item: &DataItem) -> Option<DataChange> {
        let payload = match kind {
            DataEventKind::Deleted => Payload::new(),
            DataEventKind::Updated => match PayloadCodec::decode(item.data()) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(
                        node = %self.node_id,
                        path = item.path(),
                        version = item.version(),
                        error = %err,
                        "dropping undecodable item"
                    );
                    return None;
                }
            },
        };

        Some(DataChange {
            kind,
            path: item.path().to_string(),
            payload,
            version: item.version(),
            source: item.origin().clone(),
        })
    }

    /// Caller holds the core lock
    fn dispatch_snapshot(&self, items: Vec<DataItem>) {
        let changes: Vec<DataChange> = items
            .iter()
            .filter_map(|item| self.decode_change(DataEventKind::Updated, item))
            .collect();

        debug!(node = %self.node_id, items = changes.len(), "dispatching snapshot");
        let _ = self.events.send(SessionEvent::DataChanged {
            origin: ChangeOrigin::Snapshot,
            changes,
        });
    }

    fn on_data_batch(&self, epoch: u64, batch: DataEventBatch) {
        let core = self.lock();
        if !Self::is_current(&core, epoch, SessionState::Connected) {
            debug!(node = %self.node_id, events = batch.len(), "dropping stale change batch");
            return;
        }

        let changes: Vec<DataChange> = batch
            .events()
            .iter()
            .filter_map(|event| self.decode_change(event.kind(), event.item()))
            .collect();
        if changes.is_empty() {
            return;
        }

        debug!(node = %self.node_id, changes = changes.len(), "dispatching changes");
        let _ = self.events.send(SessionEvent::DataChanged {
            origin: ChangeOrigin::Incremental,
            changes,
        });
    }

    fn on_message(&self, epoch: u64, message: InboundMessage) {
        let mut core = self.lock();
        if !Self::is_current(&core, epoch, SessionState::Connected) {
            debug!(node = %self.node_id, path = message.path(), "dropping stale message");
            return;
        }

        core.peers.record_inbound(message.source(), message.path());

        let payload = match PayloadCodec::decode(message.data()) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    node = %self.node_id,
                    peer = %message.source(),
                    path = message.path(),
                    error = %err,
                    "dropping malformed message"
                );
                return;
            }
        };

        debug!(node = %self.node_id, peer = %message.source(), path = message.path(), "message received");
        let _ = self.events.send(SessionEvent::MessageReceived(ReceivedMessage {
            source: message.source().clone(),
            path: message.path().to_string(),
            payload,
        }));
    }

    /// Returns true when the session moved to Suspended
    fn on_suspended(&self, epoch: u64) -> bool {
        let mut core = self.lock();
        if !Self::is_current(&core, epoch, SessionState::Connected) {
            return false;
        }

        if let Some(id) = core.subscription.take() {
            self.network.store().unsubscribe(id);
        }
        self.transition(&mut core, SessionState::Suspended);
        true
    }

    /// Resubscribe with a fresh snapshot; returns the new subscription
    fn on_resumed(&self, epoch: u64) -> Option<Subscription> {
        let mut core = self.lock();
        if !Self::is_current(&core, epoch, SessionState::Suspended) {
            return None;
        }

        let (snapshot, subscription) = self.network.store().subscribe_with_snapshot();
        core.subscription = Some(subscription.id());
        self.transition(&mut core, SessionState::Connected);
        self.dispatch_snapshot(snapshot);
        Some(subscription)
    }

    fn on_lost(&self, epoch: u64, reason: &str) {
        let mut core = self.lock();
        if core.epoch != epoch || !core.state.is_active() {
            return;
        }

        warn!(node = %self.node_id, reason, "connection lost");
        core.epoch += 1;
        self.teardown(&mut core);
        self.transition(&mut core, SessionState::Disconnected);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let core = self
            .core
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(id) = core.subscription.take() {
            self.network.store().unsubscribe(id);
        }
        if let Some(generation) = core.link_generation.take() {
            self.network.detach(&self.node_id, generation);
        }
        if let Some(pump) = core.pump.take() {
            pump.abort();
        }
    }
}

// ============================================================================
// EVENT PUMP
// ============================================================================

enum PumpInput {
    Batch(Option<DataEventBatch>),
    Link(Option<LinkEvent>),
}

async fn next_batch(subscription: &mut Option<Subscription>) -> Option<DataEventBatch> {
    match subscription {
        Some(sub) => sub.next_batch().await,
        None => std::future::pending().await,
    }
}

/// Moves store changes and link events into the session, one at a time
async fn run_pump(shared: Weak<Shared>, epoch: u64, mut link: Link, subscription: Subscription) {
    let mut subscription = Some(subscription);

    loop {
        let input = tokio::select! {
            batch = next_batch(&mut subscription) => PumpInput::Batch(batch),
            event = link.recv() => PumpInput::Link(event),
        };

        let Some(session) = shared.upgrade() else {
            break;
        };

        match input {
            PumpInput::Batch(Some(batch)) => session.on_data_batch(epoch, batch),
            PumpInput::Batch(None) => subscription = None,
            PumpInput::Link(Some(LinkEvent::Message(message))) => session.on_message(epoch, message),
            PumpInput::Link(Some(LinkEvent::Suspended)) => {
                if session.on_suspended(epoch) {
                    subscription = None;
                }
            }
            PumpInput::Link(Some(LinkEvent::Resumed)) => {
                if let Some(fresh) = session.on_resumed(epoch) {
                    subscription = Some(fresh);
                }
            }
            PumpInput::Link(Some(LinkEvent::Lost(reason))) => {
                session.on_lost(epoch, &reason);
                break;
            }
            PumpInput::Link(None) => {
                session.on_lost(epoch, "link closed");
                break;
            }
        }
    }
}
