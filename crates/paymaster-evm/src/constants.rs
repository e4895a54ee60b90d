//! Protocol constants for the sponsored state transition.
//!
//! Grouped by concern as sub-modules.

/// Intrinsic gas schedule.
pub mod gas {
    /// Base cost of a message call transaction.
    pub const TX_GAS: u64 = 21_000;
    /// Base cost of a contract creation transaction once Homestead is active.
    pub const TX_GAS_CONTRACT_CREATION: u64 = 53_000;
    /// Cost per non-zero byte of transaction data.
    pub const TX_DATA_NON_ZERO_GAS: u64 = 68;
    /// Cost per zero byte of transaction data.
    pub const TX_DATA_ZERO_GAS: u64 = 4;
    /// Divisor applied to gas used when capping the refund counter.
    pub const REFUND_QUOTIENT: u64 = 2;
}

/// Fee-token (non-native gas payment) parameters of the production network.
pub mod fee_token {
    /// Block height after which the current fee-token rate and the fee-recipient payout apply.
    pub const FORK_BLOCK: u64 = 13_523_400;
    /// Gas price charged to fee-token transactions after [`FORK_BLOCK`].
    pub const GAS_PRICE: u128 = 250_000_000;
    /// Gas price charged to fee-token transactions up to and including [`FORK_BLOCK`].
    pub const GAS_PRICE_BEFORE_FORK: u128 = 2_500;
}

/// Chain parameters of the production network.
pub mod chain {
    /// Chain id used by [`ChainConfig::default`](crate::ChainConfig).
    pub const CHAIN_ID: u64 = 88;
    /// Homestead activation height.
    pub const HOMESTEAD_BLOCK: u64 = 1;
}

/// Wire format parameters of sponsored transactions.
pub mod tx {
    /// Length of the paymaster address prefix of a paymaster payload.
    pub const PAYMASTER_ADDRESS_LEN: usize = 20;
    /// EIP-2718 type byte of the sponsored transaction envelope.
    pub const PAYMASTER_TX_TYPE: u8 = 0x7e;
}
