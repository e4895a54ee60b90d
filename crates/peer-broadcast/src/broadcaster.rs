//! Fan-out loops relaying transactions and mined blocks to peers.
//!
//! Producers queue events through a [`BroadcastHandle`]. Each event kind has its own bounded
//! channel and its own loop, so a slow block fan-out never delays transaction relay. A full
//! channel makes [`BroadcastHandle::send_transaction`] wait, which is the backpressure on the
//! transaction pool and block import paths.

use std::sync::Arc;

use alloy_primitives::B256;
use paymaster_evm::{BlockOutcome, SignedPaymasterTransaction};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::{BroadcastConfig, Metrics, PeerSet};

/// A mined block propagated in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlock {
    /// Block height.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Transactions included in the block, in order.
    pub transactions: Vec<SignedPaymasterTransaction>,
}

impl NewBlock {
    /// Builds the propagated form of a block from what its execution produced.
    pub fn from_outcome(number: u64, hash: B256, outcome: &BlockOutcome) -> Self {
        Self { number, hash, transactions: outcome.transactions.clone() }
    }
}

/// Errors queueing events or shutting the loops down.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// The channel is at capacity.
    #[error("broadcast channel full")]
    ChannelFull,
    /// The broadcaster has stopped.
    #[error("broadcaster stopped")]
    Closed,
    /// A broadcast loop panicked.
    #[error("broadcast loop failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl<T> From<TrySendError<T>> for BroadcastError {
    fn from(err: TrySendError<T>) -> Self {
        match err {
            TrySendError::Full(_) => Self::ChannelFull,
            TrySendError::Closed(_) => Self::Closed,
        }
    }
}

/// Producer side of the broadcast channels.
#[derive(Debug, Clone)]
pub struct BroadcastHandle {
    txs: mpsc::Sender<SignedPaymasterTransaction>,
    blocks: mpsc::Sender<Arc<NewBlock>>,
}

impl BroadcastHandle {
    /// Queues `tx` for relay, waiting while the channel is full.
    pub async fn send_transaction(
        &self,
        tx: SignedPaymasterTransaction,
    ) -> Result<(), BroadcastError> {
        self.txs.send(tx).await.map_err(|_| BroadcastError::Closed)
    }

    /// Queues `tx` for relay without waiting.
    pub fn try_send_transaction(
        &self,
        tx: SignedPaymasterTransaction,
    ) -> Result<(), BroadcastError> {
        Ok(self.txs.try_send(tx)?)
    }

    /// Queues `block` for propagation, waiting while the channel is full.
    pub async fn send_block(&self, block: NewBlock) -> Result<(), BroadcastError> {
        self.blocks.send(Arc::new(block)).await.map_err(|_| BroadcastError::Closed)
    }

    /// Queues `block` for propagation without waiting.
    pub fn try_send_block(&self, block: NewBlock) -> Result<(), BroadcastError> {
        Ok(self.blocks.try_send(Arc::new(block))?)
    }
}

/// Owner of the running broadcast loops.
#[derive(Debug)]
pub struct Broadcaster {
    peers: Arc<PeerSet>,
    cancellation_token: CancellationToken,
    tx_loop: JoinHandle<()>,
    block_loop: JoinHandle<()>,
}

impl Broadcaster {
    /// Spawns the transaction and block loops on the current tokio runtime.
    pub fn spawn(peers: Arc<PeerSet>, config: &BroadcastConfig) -> (Self, BroadcastHandle) {
        let (tx_sender, tx_receiver) = mpsc::channel(config.tx_channel_size.max(1));
        let (block_sender, block_receiver) = mpsc::channel(config.block_channel_size.max(1));
        let cancellation_token = CancellationToken::new();

        let tx_loop = tokio::spawn(run_loop(
            "transaction",
            tx_receiver,
            cancellation_token.clone(),
            Arc::clone(&peers),
            |peers, tx: SignedPaymasterTransaction| broadcast_transaction(peers, &tx),
        ));
        let block_loop = tokio::spawn(run_loop(
            "block",
            block_receiver,
            cancellation_token.clone(),
            Arc::clone(&peers),
            |peers, block: Arc<NewBlock>| broadcast_block(peers, &block),
        ));
        info!(
            target: "broadcast",
            tx_channel_size = config.tx_channel_size,
            block_channel_size = config.block_channel_size,
            "Started broadcast loops"
        );

        let handle = BroadcastHandle { txs: tx_sender, blocks: block_sender };
        (Self { peers, cancellation_token, tx_loop, block_loop }, handle)
    }

    /// Returns the peer set events are relayed to.
    pub const fn peers(&self) -> &Arc<PeerSet> {
        &self.peers
    }

    /// Returns the token that stops both loops when cancelled.
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Stops the loops, relays what was already queued, waits for both loops to exit and then
    /// disconnects every peer.
    pub async fn stop(self) -> Result<(), BroadcastError> {
        self.cancellation_token.cancel();
        let tx_result = self.tx_loop.await;
        let block_result = self.block_loop.await;
        self.peers.close();
        info!(target: "broadcast", "Stopped broadcast loops");
        tx_result?;
        block_result?;
        Ok(())
    }
}

/// Drains `receiver` until cancelled, then refuses new events and relays the ones still queued.
async fn run_loop<T, F>(
    kind: &'static str,
    mut receiver: mpsc::Receiver<T>,
    cancellation_token: CancellationToken,
    peers: Arc<PeerSet>,
    relay: F,
) where
    F: Fn(&PeerSet, T),
{
    loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => break,
            event = receiver.recv() => match event {
                Some(event) => relay(&peers, event),
                None => break,
            },
        }
    }

    receiver.close();
    let mut drained = 0usize;
    while let Some(event) = receiver.recv().await {
        relay(&peers, event);
        drained += 1;
    }
    debug!(target: "broadcast", kind, drained, "Broadcast loop exited");
}

/// Sends `tx` to every peer not known to have it.
pub fn broadcast_transaction(peers: &PeerSet, tx: &SignedPaymasterTransaction) {
    let hash = tx.hash();
    let recipients = peers.peers_without_transaction(&hash);
    for peer in &recipients {
        let id = peer.id().to_owned();
        match peer.send_transactions(core::slice::from_ref(tx)) {
            Ok(()) => {
                ::metrics::counter!(Metrics::TRANSACTIONS_SENT, Metrics::PEER_LABEL => id)
                    .increment(1);
            }
            Err(err) => {
                error!(target: "broadcast", peer = %id, %hash, %err, "Failed to send transaction");
                ::metrics::counter!(
                    Metrics::SEND_FAILURES,
                    Metrics::PEER_LABEL => id,
                    Metrics::KIND_LABEL => Metrics::TRANSACTION_KIND
                )
                .increment(1);
            }
        }
    }
    trace!(target: "broadcast", %hash, recipients = recipients.len(), "Broadcast transaction");
}

/// Sends `block` in full to every peer not known to have it.
pub fn broadcast_block(peers: &PeerSet, block: &NewBlock) {
    let hash = block.hash;
    let recipients = peers.peers_without_block(&hash);
    for peer in &recipients {
        let id = peer.id().to_owned();
        match peer.send_new_block(block) {
            Ok(()) => {
                ::metrics::counter!(Metrics::BLOCKS_SENT, Metrics::PEER_LABEL => id).increment(1);
            }
            Err(err) => {
                error!(target: "broadcast", peer = %id, %hash, %err, "Failed to send block");
                ::metrics::counter!(
                    Metrics::SEND_FAILURES,
                    Metrics::PEER_LABEL => id,
                    Metrics::KIND_LABEL => Metrics::BLOCK_KIND
                )
                .increment(1);
            }
        }
    }
    trace!(
        target: "broadcast",
        number = block.number,
        %hash,
        recipients = recipients.len(),
        "Propagated block"
    );
}
