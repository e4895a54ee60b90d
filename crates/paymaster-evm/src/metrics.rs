//! Metric identifiers for block execution.

/// Identifiers of the metrics recorded while executing blocks.
///
/// Recording goes through the [`metrics`](::metrics) facade and is a no-op until the embedding
/// node installs a recorder.
#[derive(Debug, Clone)]
pub struct Metrics;

impl Metrics {
    /// Counter of transactions included in a block.
    pub const TRANSACTIONS_INCLUDED: &str = "paymaster_evm_transactions_included";
    /// Counter of transactions rejected from a block.
    pub const TRANSACTIONS_REJECTED: &str = "paymaster_evm_transactions_rejected";
    /// Counter of gas charged to included transactions.
    pub const GAS_USED: &str = "paymaster_evm_gas_used";

    /// Label naming who paid for an included transaction.
    pub const PAYER_LABEL: &str = "payer";
    /// The sender paid.
    pub const SENDER_PAYER: &str = "sender";
    /// A paymaster paid.
    pub const PAYMASTER_PAYER: &str = "paymaster";

    /// Describes the block execution metrics.
    pub fn describe() {
        ::metrics::describe_counter!(
            Self::TRANSACTIONS_INCLUDED,
            ::metrics::Unit::Count,
            "Transactions included in a block"
        );
        ::metrics::describe_counter!(
            Self::TRANSACTIONS_REJECTED,
            ::metrics::Unit::Count,
            "Transactions rejected from a block"
        );
        ::metrics::describe_counter!(Self::GAS_USED, "Gas charged to included transactions");
    }
}
