//! The EVM seam the state transition dispatches calls through.

use alloy_primitives::{Address, Bytes, U256};
use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};

use crate::{StateDb, StateError};

/// Block-level values visible to the state transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockContext {
    /// Height of the block being built.
    pub number: u64,
    /// Block producer credited with fees before the fee-recipient fork.
    pub coinbase: Address,
    /// Total gas available to the block's transactions.
    pub gas_limit: u64,
}

/// Failure of a call inside the interpreter.
///
/// These are execution-level outcomes: the transaction is still included and charged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
pub enum VmError {
    /// Execution ran out of gas.
    #[display("out of gas")]
    OutOfGas,
    /// Execution reverted; unused gas is returned to the caller.
    #[display("execution reverted")]
    Reverted,
    /// An undefined opcode was hit.
    #[display("invalid opcode")]
    InvalidOpcode,
    /// The call stack limit was reached.
    #[display("max call depth exceeded")]
    CallDepthExceeded,
    /// The caller could not fund the value transfer of a nested call.
    #[display("insufficient balance for transfer")]
    InsufficientBalance,
    /// Contract creation targeted an address that already holds code or a nonce.
    #[display("contract address collision")]
    ContractAddressCollision,
    /// Any other interpreter failure.
    #[display("{_0}")]
    Other(String),
}

impl VmError {
    /// Returns whether the failed call handed its unused gas back.
    pub const fn returns_gas(&self) -> bool {
        matches!(self, Self::Reverted)
    }
}

/// Result of a message call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOutcome {
    /// Data returned (or revert data).
    pub output: Bytes,
    /// Gas left unused by the call.
    pub gas_left: u64,
    /// Interpreter failure, if any.
    pub error: Option<VmError>,
}

/// Result of a contract creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOutcome {
    /// Data returned by the init code.
    pub output: Bytes,
    /// Address of the new contract.
    pub address: Address,
    /// Gas left unused by the creation.
    pub gas_left: u64,
    /// Interpreter failure, if any.
    pub error: Option<VmError>,
}

/// An execution context able to run calls and creations against its world state.
///
/// The EVM owns the state handle for the duration of a block; the state transition reaches
/// accounts through [`Evm::state`] only.
#[auto_impl(&mut, Box)]
pub trait Evm {
    /// World state the EVM executes against.
    type State: StateDb;

    /// Returns the block being built.
    fn block(&self) -> &BlockContext;

    /// Returns the world state.
    fn state(&mut self) -> &mut Self::State;

    /// Runs a message call from `caller` to `target` with `gas` and `value`.
    ///
    /// State changes of a failed call are discarded by the implementation.
    fn call(
        &mut self,
        caller: Address,
        target: Address,
        data: Bytes,
        gas: u64,
        value: U256,
    ) -> Result<CallOutcome, StateError>;

    /// Runs `init_code` as a contract creation from `caller`. Bumps the caller nonce.
    fn create(
        &mut self,
        caller: Address,
        init_code: Bytes,
        gas: u64,
        value: U256,
    ) -> Result<CreateOutcome, StateError>;

    /// Returns whether `from` can fund a transfer of `amount`.
    fn can_transfer(&mut self, from: Address, amount: U256) -> Result<bool, StateError> {
        Ok(self.state().balance(from)? >= amount)
    }
}
