//! Connected peers and the registry tracking them.

use core::fmt;
use std::{collections::HashMap, sync::Arc};

use alloy_primitives::B256;
use auto_impl::auto_impl;
use parking_lot::RwLock;
use paymaster_evm::SignedPaymasterTransaction;
use tracing::debug;

use crate::{BroadcastConfig, KnownCache, NewBlock};

/// Why a peer is being disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum DisconnectReason {
    /// The local node is shutting down.
    #[display("client quitting")]
    Quitting,
    /// The disconnect was requested by the local node for another reason.
    #[display("disconnect requested")]
    Requested,
}

/// Errors delivering a message to a peer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    /// The connection is gone.
    #[error("peer {0} disconnected")]
    Disconnected(String),
    /// The outbound queue of the peer is full.
    #[error("peer {0} send queue full")]
    QueueFull(String),
}

/// A remote node messages can be queued for.
///
/// Sends hand the message to the connection's own writer and must not block.
#[auto_impl(&, Box, Arc)]
pub trait Peer: Send + Sync {
    /// Returns the unique id of the peer.
    fn id(&self) -> &str;

    /// Queues `txs` for delivery.
    fn send_transactions(&self, txs: &[SignedPaymasterTransaction]) -> Result<(), PeerError>;

    /// Queues a full block for delivery.
    fn send_new_block(&self, block: &NewBlock) -> Result<(), PeerError>;

    /// Closes the connection.
    fn disconnect(&self, reason: DisconnectReason);
}

/// A registered peer with the hashes it is known to have.
pub struct PeerHandle {
    peer: Arc<dyn Peer>,
    known_txs: KnownCache,
    known_blocks: KnownCache,
}

impl fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerHandle")
            .field("id", &self.peer.id())
            .field("known_txs", &self.known_txs.len())
            .field("known_blocks", &self.known_blocks.len())
            .finish()
    }
}

impl PeerHandle {
    /// Wraps `peer` with empty known-hash caches sized by `config`.
    pub fn new(peer: Arc<dyn Peer>, config: &BroadcastConfig) -> Self {
        Self {
            peer,
            known_txs: KnownCache::new(config.max_known_txs),
            known_blocks: KnownCache::new(config.max_known_blocks),
        }
    }

    /// Returns the peer id.
    pub fn id(&self) -> &str {
        self.peer.id()
    }

    /// Returns whether the peer is known to have transaction `hash`.
    pub fn knows_transaction(&self, hash: &B256) -> bool {
        self.known_txs.contains(hash)
    }

    /// Returns whether the peer is known to have block `hash`.
    pub fn knows_block(&self, hash: &B256) -> bool {
        self.known_blocks.contains(hash)
    }

    /// Records that the peer has transaction `hash`.
    pub fn mark_transaction(&self, hash: B256) {
        self.known_txs.insert(hash);
    }

    /// Records that the peer has block `hash`.
    pub fn mark_block(&self, hash: B256) {
        self.known_blocks.insert(hash);
    }

    /// Marks `txs` as known and queues them for the peer.
    pub fn send_transactions(&self, txs: &[SignedPaymasterTransaction]) -> Result<(), PeerError> {
        for tx in txs {
            self.known_txs.insert(tx.hash());
        }
        self.peer.send_transactions(txs)
    }

    /// Marks `block` as known and queues it for the peer.
    pub fn send_new_block(&self, block: &NewBlock) -> Result<(), PeerError> {
        self.known_blocks.insert(block.hash);
        self.peer.send_new_block(block)
    }

    /// Closes the connection.
    pub fn disconnect(&self, reason: DisconnectReason) {
        self.peer.disconnect(reason);
    }
}

/// Errors from peer registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerSetError {
    /// A peer with the same id is already registered.
    #[error("peer {0} already registered")]
    AlreadyRegistered(String),
    /// No peer with this id is registered.
    #[error("peer {0} not registered")]
    NotRegistered(String),
    /// The set was closed and accepts no new peers.
    #[error("peer set closed")]
    Closed,
}

#[derive(Debug, Default)]
struct Peers {
    peers: HashMap<String, Arc<PeerHandle>>,
    closed: bool,
}

/// The set of connected peers.
#[derive(Debug)]
pub struct PeerSet {
    inner: RwLock<Peers>,
    config: BroadcastConfig,
}

impl Default for PeerSet {
    fn default() -> Self {
        Self::new(BroadcastConfig::default())
    }
}

impl PeerSet {
    /// Creates an empty set whose peers get known-hash caches sized by `config`.
    pub fn new(config: BroadcastConfig) -> Self {
        Self { inner: RwLock::new(Peers::default()), config }
    }

    /// Adds `peer` to the set.
    pub fn register(&self, peer: Arc<dyn Peer>) -> Result<Arc<PeerHandle>, PeerSetError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(PeerSetError::Closed);
        }
        let id = peer.id().to_owned();
        if inner.peers.contains_key(&id) {
            return Err(PeerSetError::AlreadyRegistered(id));
        }
        let handle = Arc::new(PeerHandle::new(peer, &self.config));
        inner.peers.insert(id.clone(), Arc::clone(&handle));
        debug!(target: "peer_set", peer = %id, peers = inner.peers.len(), "Registered peer");
        Ok(handle)
    }

    /// Removes the peer with `id` from the set.
    pub fn unregister(&self, id: &str) -> Result<Arc<PeerHandle>, PeerSetError> {
        let mut inner = self.inner.write();
        let handle =
            inner.peers.remove(id).ok_or_else(|| PeerSetError::NotRegistered(id.to_owned()))?;
        debug!(target: "peer_set", peer = %id, peers = inner.peers.len(), "Unregistered peer");
        Ok(handle)
    }

    /// Returns the peer with `id`.
    pub fn peer(&self, id: &str) -> Option<Arc<PeerHandle>> {
        self.inner.read().peers.get(id).cloned()
    }

    /// Returns the peers not known to have transaction `hash`.
    pub fn peers_without_transaction(&self, hash: &B256) -> Vec<Arc<PeerHandle>> {
        self.filter(|peer| !peer.knows_transaction(hash))
    }

    /// Returns the peers not known to have block `hash`.
    pub fn peers_without_block(&self, hash: &B256) -> Vec<Arc<PeerHandle>> {
        self.filter(|peer| !peer.knows_block(hash))
    }

    /// Returns the number of registered peers.
    pub fn len(&self) -> usize {
        self.inner.read().peers.len()
    }

    /// Returns whether no peer is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.read().peers.is_empty()
    }

    /// Returns whether the set was closed.
    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    /// Disconnects every peer and refuses further registrations.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        for peer in inner.peers.values() {
            peer.disconnect(DisconnectReason::Quitting);
        }
        inner.closed = true;
        debug!(target: "peer_set", peers = inner.peers.len(), "Closed peer set");
    }

    fn filter(&self, keep: impl Fn(&PeerHandle) -> bool) -> Vec<Arc<PeerHandle>> {
        self.inner.read().peers.values().filter(|peer| keep(peer)).cloned().collect()
    }
}
