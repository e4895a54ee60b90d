use alloy_primitives::{Address, B256, U256};

use crate::{GasError, GasPoolError, StateError, VmError};

/// Consensus-level failures: a message failing with one of these must not be included in the
/// block.
#[derive(Debug, thiserror::Error)]
pub enum StateTransitionError {
    /// The account nonce is behind the message nonce.
    #[error("nonce too high: address {address}, tx: {tx} state: {state}")]
    NonceTooHigh {
        /// Sender.
        address: Address,
        /// Nonce carried by the message.
        tx: u64,
        /// Nonce held by the account.
        state: u64,
    },
    /// The account nonce is ahead of the message nonce.
    #[error("nonce too low: address {address}, tx: {tx} state: {state}")]
    NonceTooLow {
        /// Sender.
        address: Address,
        /// Nonce carried by the message.
        tx: u64,
        /// Nonce held by the account.
        state: u64,
    },
    /// The account nonce cannot be incremented.
    #[error("nonce has max value: address {address}, nonce: {nonce}")]
    NonceMax {
        /// Sender.
        address: Address,
        /// Nonce held by the account.
        nonce: u64,
    },
    /// The sender has contract code.
    #[error("sender not an eoa: address {address}, codehash: {code_hash}")]
    SenderNotEoa {
        /// Sender.
        address: Address,
        /// Code hash of the sender account.
        code_hash: B256,
    },
    /// The payer cannot cover `gas_limit * gas_price`.
    #[error("insufficient balance to pay for gas: payer {payer}, have {have}, want {want}")]
    InsufficientBalance {
        /// Account charged for gas.
        payer: Address,
        /// Balance available to pay with.
        have: U256,
        /// Maximum gas cost.
        want: U256,
    },
    /// The block gas pool cannot cover the message gas limit.
    #[error("gas limit reached: requested {requested}, available {available}")]
    GasPoolExhausted {
        /// Gas left in the pool.
        available: u64,
        /// Gas limit of the message.
        requested: u64,
    },
    /// Returning gas pushed the block gas pool above `u64::MAX`.
    #[error("gas pool pushed above uint64")]
    GasPoolOverflow,
    /// The gas left after validation does not cover intrinsic gas.
    #[error("intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGasTooLow {
        /// Gas available.
        have: u64,
        /// Intrinsic gas of the message.
        want: u64,
    },
    /// Intrinsic gas does not fit in a `u64`.
    #[error("gas uint64 overflow")]
    GasOverflow,
    /// The sender cannot fund the value transfer of the top-level call.
    #[error("insufficient funds for transfer: address {address}, value {value}")]
    InsufficientFundsForTransfer {
        /// Sender.
        address: Address,
        /// Value of the transfer.
        value: U256,
    },
    /// The paymaster post call consumed more gas than the transaction had left.
    #[error("paymaster post transaction out of gas: used {gas_used}, remaining {gas_remaining}")]
    PostTransactionOutOfGas {
        /// Gas consumed by the post call.
        gas_used: u64,
        /// Gas left after the main call.
        gas_remaining: u64,
    },
    /// The paymaster validation call failed in the interpreter.
    #[error("paymaster {paymaster} validation failed: {error}")]
    PaymasterValidationFailed {
        /// Paymaster contract.
        paymaster: Address,
        /// Interpreter failure.
        error: VmError,
    },
    /// Paymaster return data does not match the fixed interface.
    #[error("paymaster abi mismatch: {0}")]
    Abi(#[from] alloy_sol_types::Error),
    /// World-state access failed.
    #[error(transparent)]
    State(#[from] StateError),
}

impl From<GasError> for StateTransitionError {
    fn from(err: GasError) -> Self {
        match err {
            GasError::Overflow => Self::GasOverflow,
        }
    }
}

impl From<GasPoolError> for StateTransitionError {
    fn from(err: GasPoolError) -> Self {
        match err {
            GasPoolError::Exhausted { available, requested } => {
                Self::GasPoolExhausted { available, requested }
            }
            GasPoolError::Overflow => Self::GasPoolOverflow,
        }
    }
}
