// Peer Directory - Remote nodes this session has heard from
//
// A peer becomes addressable only after it sent us something. Entries are
// transient: they live for one connected session and are never persisted.

use crate::identity::PeerId;
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// What we know about a peer from its inbound traffic
#[derive(Clone, Debug)]
pub struct PeerInfo {
    id: PeerId,
    /// Last time a message from this peer arrived (unix ms)
    last_seen: u64,
    /// Path of the most recent message from this peer
    last_path: String,
    messages_received: u64,
}

impl PeerInfo {
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    pub fn last_path(&self) -> &str {
        &self.last_path
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }
}

/// Registry of peers observed as message sources
#[derive(Debug, Default)]
pub struct PeerDirectory {
    peers: HashMap<PeerId, PeerInfo>,
    last_inbound: Option<PeerId>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound message from a peer
    pub fn record_inbound(&mut self, source: &PeerId, path: &str) {
        let now = Self::now();
        let info = self.peers.entry(source.clone()).or_insert_with(|| PeerInfo {
            id: source.clone(),
            last_seen: now,
            last_path: String::new(),
            messages_received: 0,
        });
        info.last_seen = now;
        info.last_path = path.to_string();
        info.messages_received += 1;

        self.last_inbound = Some(source.clone());
    }

    /// Check if a peer has ever been observed inbound
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.contains_key(peer)
    }

    pub fn get(&self, peer: &PeerId) -> Option<&PeerInfo> {
        self.peers.get(peer)
    }

    /// Source of the most recent inbound message
    pub fn last_inbound(&self) -> Option<&PeerId> {
        self.last_inbound.as_ref()
    }

    /// All known peers, in id order
    pub fn peers(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.peers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Forget every peer
    pub fn clear(&mut self) {
        self.peers.clear();
        self.last_inbound = None;
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
