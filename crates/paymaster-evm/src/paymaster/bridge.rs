//! Sub-calls into the paymaster contract around the sponsored transaction.

use alloy_primitives::{Bytes, FixedBytes, B256, U256};
use alloy_sol_types::SolCall;
use tracing::{debug, trace};

use super::abi::IPaymaster;
use crate::{Evm, Message, StateError, VmError};

/// Errors from paymaster sub-calls.
#[derive(Debug, thiserror::Error)]
pub enum PaymasterError {
    /// Return data did not match the fixed interface.
    #[error("paymaster abi mismatch: {0}")]
    Abi(#[from] alloy_sol_types::Error),
    /// The paymaster call failed inside the interpreter.
    #[error("paymaster call failed after {gas_used} gas: {error}")]
    Vm {
        /// Interpreter failure.
        error: VmError,
        /// Gas consumed before failing.
        gas_used: u64,
    },
    /// World-state access failed.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Outcome of `validateAndPayForPaymasterTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    /// Magic value returned by the paymaster.
    pub magic: FixedBytes<4>,
    /// Opaque context forwarded to `postTransaction`.
    pub context: Bytes,
    /// Gas consumed by the call.
    pub gas_used: u64,
}

/// Outcome of `postTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostOutcome {
    /// Gas consumed by the call.
    pub gas_used: u64,
    /// Interpreter failure, if the call did not succeed.
    pub error: Option<VmError>,
}

/// Asks the paymaster named by `message` to sponsor it.
///
/// A failing call is returned as [`PaymasterError::Vm`] so the caller can reject the
/// transaction before any gas is bought.
pub fn validate_and_pay_for_paymaster<E: Evm>(
    evm: &mut E,
    message: &Message,
    tx_hash: B256,
) -> Result<Validation, PaymasterError> {
    let call = IPaymaster::validateAndPayForPaymasterTransactionCall {
        txHash: tx_hash,
        transaction: transaction_view(message),
    };
    let outcome = sub_call(evm, message, call.abi_encode().into())?;
    if let Some(error) = outcome.error {
        return Err(PaymasterError::Vm { error, gas_used: outcome.gas_used });
    }

    let ret =
        IPaymaster::validateAndPayForPaymasterTransactionCall::abi_decode_returns(&outcome.output)?;
    debug!(
        target: "paymaster",
        paymaster = %message.paymaster,
        magic = %ret.magic,
        gas_used = outcome.gas_used,
        "Paymaster validation returned"
    );
    Ok(Validation { magic: ret.magic, context: ret.context, gas_used: outcome.gas_used })
}

/// Reports the executed transaction back to its paymaster.
pub fn post_transaction<E: Evm>(
    evm: &mut E,
    message: &Message,
    tx_hash: B256,
    context: Bytes,
    max_refunded_gas: u64,
    success: bool,
) -> Result<PostOutcome, PaymasterError> {
    let call = IPaymaster::postTransactionCall {
        context,
        transaction: transaction_view(message),
        txHash: tx_hash,
        txResult: IPaymaster::ExecutionResult { success },
        maxRefundedGas: U256::from(max_refunded_gas),
    };
    let outcome = sub_call(evm, message, call.abi_encode().into())?;
    debug!(
        target: "paymaster",
        paymaster = %message.paymaster,
        gas_used = outcome.gas_used,
        error = ?outcome.error,
        "Paymaster post transaction returned"
    );
    Ok(PostOutcome { gas_used: outcome.gas_used, error: outcome.error })
}

fn transaction_view(message: &Message) -> IPaymaster::Transaction {
    IPaymaster::Transaction { from: message.from }
}

struct SubCall {
    output: Bytes,
    gas_used: u64,
    error: Option<VmError>,
}

/// Calls the paymaster as the original sender with the full gas limit and no value. Sub-calls
/// are not transactions: no nonce or EOA rules apply to them.
fn sub_call<E: Evm>(evm: &mut E, message: &Message, data: Bytes) -> Result<SubCall, StateError> {
    trace!(
        target: "paymaster",
        from = %message.from,
        to = %message.paymaster,
        len = data.len(),
        "Paymaster sub-call"
    );
    let outcome = evm.call(message.from, message.paymaster, data, message.gas_limit, U256::ZERO)?;
    Ok(SubCall {
        output: outcome.output,
        gas_used: message.gas_limit.saturating_sub(outcome.gas_left),
        error: outcome.error,
    })
}
