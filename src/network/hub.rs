// Wearable Network - The link layer every node attaches to
//
// Owns the shared replication store and routes one-shot messages between
// attached nodes. Also exposes the faults a real link has (refused attach,
// suspension, severed connection) so sessions can be driven through them.

use crate::error::SyncError;
use crate::identity::PeerId;
use crate::replication::{DataItem, ReplicationStore};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tracing::{debug, info};

// ============================================================================
// NETWORK CONFIG
// ============================================================================

/// Configuration for the wearable network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Simulated delay before an attach attempt resolves
    pub attach_latency_ms: u64,
    /// Maximum number of simultaneously attached nodes
    pub max_nodes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            attach_latency_ms: 0,
            max_nodes: 16,
        }
    }
}

impl NetworkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attach_latency_ms(mut self, ms: u64) -> Self {
        self.attach_latency_ms = ms;
        self
    }

    pub fn with_max_nodes(mut self, max: usize) -> Self {
        self.max_nodes = max;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.max_nodes == 0 {
            return Err(SyncError::TransportFailure("max_nodes cannot be 0".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// LINK EVENTS
// ============================================================================

/// A one-shot message as it arrives at its target
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    source: PeerId,
    path: String,
    data: Vec<u8>,
}

impl InboundMessage {
    pub fn new(source: PeerId, path: &str, data: Vec<u8>) -> Self {
        Self {
            source,
            path: path.to_string(),
            data,
        }
    }

    pub fn source(&self) -> &PeerId {
        &self.source
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Events the network pushes down an attached node's link
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEvent {
    /// A message addressed to this node
    Message(InboundMessage),
    /// Link temporarily unusable; it will come back on its own
    Suspended,
    /// Link usable again after a suspension
    Resumed,
    /// Link gone for good
    Lost(String),
}

/// The receiving end of an attachment
pub struct Link {
    node: PeerId,
    generation: u64,
    events: mpsc::UnboundedReceiver<LinkEvent>,
}

impl Link {
    pub fn node(&self) -> &PeerId {
        &self.node
    }

    /// Attachment generation, used to detach exactly this link
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Next link event; None once the network dropped the link
    pub async fn recv(&mut self) -> Option<LinkEvent> {
        self.events.recv().await
    }
}

// ============================================================================
// WEARABLE NETWORK
// ============================================================================

struct NodeLink {
    generation: u64,
    tx: mpsc::UnboundedSender<LinkEvent>,
    suspended: bool,
}

struct NetworkInner {
    nodes: HashMap<PeerId, NodeLink>,
    refused: HashSet<PeerId>,
    next_generation: u64,
}

/// Shared link layer; cloning yields another handle onto the same network
#[derive(Clone)]
pub struct WearableNetwork {
    config: NetworkConfig,
    store: ReplicationStore,
    inner: Arc<Mutex<NetworkInner>>,
}

impl Default for WearableNetwork {
    fn default() -> Self {
        Self::new(NetworkConfig::default())
    }
}

impl WearableNetwork {
    /// Create a network with a fresh memory-only store
    pub fn new(config: NetworkConfig) -> Self {
        Self::with_store(config, ReplicationStore::new())
    }

    /// Create a network around an existing (possibly persistent) store
    pub fn with_store(config: NetworkConfig, store: ReplicationStore) -> Self {
        Self {
            config,
            store,
            inner: Arc::new(Mutex::new(NetworkInner {
                nodes: HashMap::new(),
                refused: HashSet::new(),
                next_generation: 1,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NetworkInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// The replicated store shared by every attached node
    pub fn store(&self) -> &ReplicationStore {
        &self.store
    }

    // ========================================================================
    // ATTACHMENT
    // ========================================================================

    /// Attach a node. Resolves asynchronously; an existing link for the same
    /// node is replaced.
    pub async fn attach(&self, node: &PeerId) -> Result<Link, SyncError> {
        if self.config.attach_latency_ms > 0 {
            sleep(Duration::from_millis(self.config.attach_latency_ms)).await;
        }

        let mut inner = self.lock();

        if inner.refused.contains(node) {
            return Err(SyncError::TransportFailure(format!(
                "connection refused for {}",
                node
            )));
        }
        if !inner.nodes.contains_key(node) && inner.nodes.len() >= self.config.max_nodes {
            return Err(SyncError::TransportFailure("network full".to_string()));
        }

        let generation = inner.next_generation;
        inner.next_generation += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        inner.nodes.insert(
            node.clone(),
            NodeLink {
                generation,
                tx,
                suspended: false,
            },
        );

        info!(node = %node, generation, "node attached");
        Ok(Link {
            node: node.clone(),
            generation,
            events: rx,
        })
    }

    /// Detach a node's link, but only if it is still the given generation
    pub fn detach(&self, node: &PeerId, generation: u64) -> bool {
        let mut inner = self.lock();
        match inner.nodes.get(node) {
            Some(link) if link.generation == generation => {
                inner.nodes.remove(node);
                info!(node = %node, generation, "node detached");
                true
            }
            _ => false,
        }
    }

    /// Check if a node is attached and its link is usable
    pub fn is_reachable(&self, node: &PeerId) -> bool {
        self.lock()
            .nodes
            .get(node)
            .map(|link| !link.suspended)
            .unwrap_or(false)
    }

    /// All currently attached nodes, in id order
    pub fn attached_nodes(&self) -> Vec<PeerId> {
        let mut nodes: Vec<PeerId> = self.lock().nodes.keys().cloned().collect();
        nodes.sort();
        nodes
    }

    // ========================================================================
    // TRAFFIC
    // ========================================================================

    /// Publish an item on behalf of an attached node
    pub fn publish(&self, origin: &PeerId, path: &str, data: Vec<u8>) -> Result<DataItem, SyncError> {
        if !self.is_reachable(origin) {
            return Err(SyncError::NotConnected);
        }
        self.store.put(path, data, origin)
    }

    /// Route a one-shot message from one attached node to another
    pub fn deliver(
        &self,
        source: &PeerId,
        target: &PeerId,
        path: &str,
        data: Vec<u8>,
    ) -> Result<(), SyncError> {
        let inner = self.lock();

        match inner.nodes.get(source) {
            Some(link) if !link.suspended => {}
            _ => return Err(SyncError::NotConnected),
        }

        let link = match inner.nodes.get(target) {
            Some(link) if !link.suspended => link,
            _ => return Err(SyncError::UnknownPeer(target.clone())),
        };

        link.tx
            .send(LinkEvent::Message(InboundMessage::new(source.clone(), path, data)))
            .map_err(|_| SyncError::UnknownPeer(target.clone()))?;

        debug!(from = %source, to = %target, path, "message routed");
        Ok(())
    }

    // ========================================================================
    // LINK FAULTS
    // ========================================================================

    /// Refuse (or stop refusing) attach attempts from a node
    pub fn refuse_connections(&self, node: &PeerId, refuse: bool) {
        let mut inner = self.lock();
        if refuse {
            inner.refused.insert(node.clone());
        } else {
            inner.refused.remove(node);
        }
    }

    /// Temporarily suspend a node's link
    pub fn suspend(&self, node: &PeerId) -> bool {
        let mut inner = self.lock();
        match inner.nodes.get_mut(node) {
            Some(link) if !link.suspended => {
                link.suspended = true;
                let _ = link.tx.send(LinkEvent::Suspended);
                info!(node = %node, "link suspended");
                true
            }
            _ => false,
        }
    }

    /// Bring a suspended link back
    pub fn resume(&self, node: &PeerId) -> bool {
        let mut inner = self.lock();
        match inner.nodes.get_mut(node) {
            Some(link) if link.suspended => {
                link.suspended = false;
                let _ = link.tx.send(LinkEvent::Resumed);
                info!(node = %node, "link resumed");
                true
            }
            _ => false,
        }
    }

    /// Drop a node's link for good
    pub fn sever(&self, node: &PeerId, reason: &str) -> bool {
        let mut inner = self.lock();
        match inner.nodes.remove(node) {
            Some(link) => {
                let _ = link.tx.send(LinkEvent::Lost(reason.to_string()));
                info!(node = %node, reason, "link severed");
                true
            }
            None => false,
        }
    }
}
