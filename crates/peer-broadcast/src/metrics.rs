//! Metric identifiers for propagation to peers.

/// Identifiers of the propagation metrics, labelled by peer id.
#[derive(Debug, Clone)]
pub struct Metrics;

impl Metrics {
    /// Counter of transactions sent to a peer.
    pub const TRANSACTIONS_SENT: &str = "peer_broadcast_transactions_sent";
    /// Counter of blocks sent to a peer.
    pub const BLOCKS_SENT: &str = "peer_broadcast_blocks_sent";
    /// Counter of sends a peer refused.
    pub const SEND_FAILURES: &str = "peer_broadcast_send_failures";

    /// Label carrying the peer id.
    pub const PEER_LABEL: &str = "peer";
    /// Label carrying the event kind of a failed send.
    pub const KIND_LABEL: &str = "kind";
    /// Transaction event kind.
    pub const TRANSACTION_KIND: &str = "transaction";
    /// Block event kind.
    pub const BLOCK_KIND: &str = "block";

    /// Describes the propagation metrics.
    pub fn describe() {
        ::metrics::describe_counter!(
            Self::TRANSACTIONS_SENT,
            ::metrics::Unit::Count,
            "Transactions sent to a peer"
        );
        ::metrics::describe_counter!(
            Self::BLOCKS_SENT,
            ::metrics::Unit::Count,
            "Blocks sent to a peer"
        );
        ::metrics::describe_counter!(
            Self::SEND_FAILURES,
            ::metrics::Unit::Count,
            "Sends refused by a peer"
        );
    }
}
