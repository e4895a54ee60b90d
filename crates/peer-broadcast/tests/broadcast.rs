//! Tests for peer tracking and the broadcast loops.

use std::sync::Arc;

use alloy_primitives::{Signature, B256, U256};
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use parking_lot::Mutex;
use paymaster_evm::{PaymasterTransaction, SignedPaymasterTransaction};
use peer_broadcast::{
    broadcast_block, broadcast_transaction, BroadcastConfig, BroadcastError, Broadcaster,
    DisconnectReason, Metrics, NewBlock, Peer, PeerError, PeerSet, PeerSetError,
};

#[derive(Debug, Default)]
struct MockPeer {
    id: String,
    failing: bool,
    txs: Mutex<Vec<B256>>,
    blocks: Mutex<Vec<B256>>,
    disconnected: Mutex<Option<DisconnectReason>>,
}

impl MockPeer {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self { id: id.to_owned(), ..Default::default() })
    }

    fn failing(id: &str) -> Arc<Self> {
        Arc::new(Self { id: id.to_owned(), failing: true, ..Default::default() })
    }

    fn txs(&self) -> Vec<B256> {
        self.txs.lock().clone()
    }

    fn blocks(&self) -> Vec<B256> {
        self.blocks.lock().clone()
    }
}

impl Peer for MockPeer {
    fn id(&self) -> &str {
        &self.id
    }

    fn send_transactions(&self, txs: &[SignedPaymasterTransaction]) -> Result<(), PeerError> {
        if self.failing {
            return Err(PeerError::Disconnected(self.id.clone()));
        }
        self.txs.lock().extend(txs.iter().map(SignedPaymasterTransaction::hash));
        Ok(())
    }

    fn send_new_block(&self, block: &NewBlock) -> Result<(), PeerError> {
        if self.failing {
            return Err(PeerError::QueueFull(self.id.clone()));
        }
        self.blocks.lock().push(block.hash);
        Ok(())
    }

    fn disconnect(&self, reason: DisconnectReason) {
        *self.disconnected.lock() = Some(reason);
    }
}

fn transaction(nonce: u64) -> SignedPaymasterTransaction {
    let tx = PaymasterTransaction { chain_id: 88, nonce, gas: 21_000, ..Default::default() };
    SignedPaymasterTransaction::new(tx, Signature::new(U256::from(1), U256::from(2), false))
}

fn block(number: u64) -> NewBlock {
    let hash = B256::with_last_byte(number as u8);
    NewBlock { number, hash, transactions: vec![transaction(0)] }
}

#[test]
fn test_register_and_unregister() {
    let peers = PeerSet::default();
    peers.register(MockPeer::new("a")).unwrap();
    assert_eq!(
        peers.register(MockPeer::new("a")).unwrap_err(),
        PeerSetError::AlreadyRegistered("a".to_owned())
    );
    assert_eq!(peers.len(), 1);
    assert_eq!(peers.peer("a").unwrap().id(), "a");

    peers.unregister("a").unwrap();
    assert!(peers.is_empty());
    assert_eq!(peers.unregister("a").unwrap_err(), PeerSetError::NotRegistered("a".to_owned()));
}

#[test]
fn test_close_disconnects_and_refuses_peers() {
    let peers = PeerSet::default();
    let a = MockPeer::new("a");
    peers.register(a.clone()).unwrap();

    peers.close();
    assert!(peers.is_closed());
    assert_eq!(*a.disconnected.lock(), Some(DisconnectReason::Quitting));
    assert_eq!(peers.register(MockPeer::new("b")).unwrap_err(), PeerSetError::Closed);
}

#[test]
fn test_transaction_relayed_once_per_peer() {
    let peers = PeerSet::default();
    let (a, b) = (MockPeer::new("a"), MockPeer::new("b"));
    peers.register(a.clone()).unwrap();
    let handle_b = peers.register(b.clone()).unwrap();

    let tx = transaction(1);
    handle_b.mark_transaction(tx.hash());
    assert_eq!(peers.peers_without_transaction(&tx.hash()).len(), 1);

    broadcast_transaction(&peers, &tx);
    broadcast_transaction(&peers, &tx);

    assert_eq!(a.txs(), vec![tx.hash()]);
    assert!(b.txs().is_empty());
    assert!(peers.peers_without_transaction(&tx.hash()).is_empty());
}

#[test]
fn test_failing_peer_does_not_stop_fan_out() {
    let peers = PeerSet::default();
    let (bad, good) = (MockPeer::failing("bad"), MockPeer::new("good"));
    peers.register(bad.clone()).unwrap();
    peers.register(good.clone()).unwrap();

    let block = block(7);
    broadcast_block(&peers, &block);

    assert_eq!(good.blocks(), vec![block.hash]);
    assert!(bad.blocks().is_empty());
    assert!(peers.peers_without_block(&block.hash).is_empty());
}

#[test]
fn test_sends_are_counted_per_peer() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let peers = PeerSet::default();
    peers.register(MockPeer::failing("bad")).unwrap();
    peers.register(MockPeer::new("good")).unwrap();

    metrics::with_local_recorder(&recorder, || {
        Metrics::describe();
        broadcast_transaction(&peers, &transaction(0));
        broadcast_transaction(&peers, &transaction(1));
        // already known to both peers
        broadcast_transaction(&peers, &transaction(1));
        broadcast_block(&peers, &block(7));
    });

    let snapshot = snapshotter.snapshot().into_vec();
    let described = snapshot.iter().any(|(key, _, description, _)| {
        key.key().name() == Metrics::BLOCKS_SENT && description.is_some()
    });
    assert!(described);
    let counter = |name: &str, labels: &[(&str, &str)]| {
        snapshot
            .iter()
            .find_map(|(key, _, _, value)| {
                let key = key.key();
                let key_labels = key.labels().map(|label| (label.key(), label.value()));
                let found = key.name() == name && key_labels.eq(labels.iter().copied());
                match value {
                    DebugValue::Counter(count) if found => Some(*count),
                    _ => None,
                }
            })
            .unwrap_or_default()
    };
    let (peer, kind) = (Metrics::PEER_LABEL, Metrics::KIND_LABEL);
    assert_eq!(counter(Metrics::TRANSACTIONS_SENT, &[(peer, "good")]), 2);
    assert_eq!(counter(Metrics::TRANSACTIONS_SENT, &[(peer, "bad")]), 0);
    assert_eq!(counter(Metrics::BLOCKS_SENT, &[(peer, "good")]), 1);
    assert_eq!(
        counter(Metrics::SEND_FAILURES, &[(peer, "bad"), (kind, Metrics::TRANSACTION_KIND)]),
        2
    );
    assert_eq!(counter(Metrics::SEND_FAILURES, &[(peer, "bad"), (kind, Metrics::BLOCK_KIND)]), 1);
}

#[test]
fn test_known_transactions_are_bounded() {
    let config = BroadcastConfig { max_known_txs: 2, ..Default::default() };
    let peers = PeerSet::new(config);
    let a = MockPeer::new("a");
    let handle = peers.register(a.clone()).unwrap();

    for nonce in 0..3 {
        broadcast_transaction(&peers, &transaction(nonce));
    }
    assert!(!handle.knows_transaction(&transaction(0).hash()));
    assert!(handle.knows_transaction(&transaction(2).hash()));

    broadcast_transaction(&peers, &transaction(0));
    assert_eq!(a.txs().len(), 4);
}

#[tokio::test]
async fn test_stop_relays_queued_events() {
    let peers = Arc::new(PeerSet::default());
    let a = MockPeer::new("a");
    peers.register(a.clone()).unwrap();

    let (broadcaster, handle) = Broadcaster::spawn(Arc::clone(&peers), &BroadcastConfig::default());
    let tx = transaction(3);
    handle.send_transaction(tx.clone()).await.unwrap();
    handle.send_block(block(9)).await.unwrap();
    broadcaster.stop().await.unwrap();

    assert_eq!(a.txs(), vec![tx.hash()]);
    assert_eq!(a.blocks(), vec![block(9).hash]);
    assert_eq!(*a.disconnected.lock(), Some(DisconnectReason::Quitting));
    assert!(matches!(handle.send_transaction(transaction(4)).await, Err(BroadcastError::Closed)));
    assert!(matches!(handle.try_send_block(block(10)), Err(BroadcastError::Closed)));
}

#[tokio::test]
async fn test_full_channel_rejects_try_send() {
    let peers = Arc::new(PeerSet::default());
    let config = BroadcastConfig { tx_channel_size: 1, ..Default::default() };
    let (broadcaster, handle) = Broadcaster::spawn(peers, &config);

    // the loops cannot run before this task yields
    handle.try_send_transaction(transaction(0)).unwrap();
    assert!(matches!(
        handle.try_send_transaction(transaction(1)),
        Err(BroadcastError::ChannelFull)
    ));
    broadcaster.stop().await.unwrap();
}
