use serde::{Deserialize, Serialize};

/// Capacity of the pending transaction channel.
pub const TX_CHANNEL_SIZE: usize = 4096;
/// Capacity of the mined block channel.
pub const BLOCK_CHANNEL_SIZE: usize = 64;
/// Maximum transaction hashes remembered per peer.
pub const MAX_KNOWN_TXS: usize = 32_768;
/// Maximum block hashes remembered per peer.
pub const MAX_KNOWN_BLOCKS: usize = 1024;

/// Sizes of the broadcast channels and of the per-peer known-hash caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastConfig {
    /// Transactions queued before producers are made to wait.
    pub tx_channel_size: usize,
    /// Blocks queued before producers are made to wait.
    pub block_channel_size: usize,
    /// Transaction hashes remembered per peer.
    pub max_known_txs: usize,
    /// Block hashes remembered per peer.
    pub max_known_blocks: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            tx_channel_size: TX_CHANNEL_SIZE,
            block_channel_size: BLOCK_CHANNEL_SIZE,
            max_known_txs: MAX_KNOWN_TXS,
            max_known_blocks: MAX_KNOWN_BLOCKS,
        }
    }
}
