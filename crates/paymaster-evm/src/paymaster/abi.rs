//! The fixed paymaster contract interface.

use alloy_primitives::{fixed_bytes, FixedBytes};
use alloy_sol_types::{sol, SolCall};

sol! {
    /// Entry points every paymaster contract exposes.
    #[allow(missing_docs)]
    #[derive(Debug, PartialEq, Eq)]
    interface IPaymaster {
        /// View of the sponsored transaction handed to the paymaster.
        struct Transaction {
            address from;
        }

        /// Outcome of the sponsored transaction reported to the paymaster.
        struct ExecutionResult {
            bool success;
        }

        /// Asks the paymaster to sponsor `txHash`. Returns a magic value and an opaque context
        /// forwarded to `postTransaction`.
        function validateAndPayForPaymasterTransaction(bytes32 txHash, Transaction transaction)
            external
            payable
            returns (bytes4 magic, bytes context);

        /// Settles a sponsored transaction after it executed.
        function postTransaction(
            bytes context,
            Transaction transaction,
            bytes32 txHash,
            ExecutionResult txResult,
            uint256 maxRefundedGas
        ) external payable;
    }
}

/// Magic value by which a paymaster declines sponsorship.
pub const INVALID_MAGIC: FixedBytes<4> = fixed_bytes!("ffffffff");

/// Magic value conventionally returned by paymasters accepting sponsorship: the selector of
/// `validateAndPayForPaymasterTransaction`. Any value other than [`INVALID_MAGIC`] accepts.
pub const VALIDATION_SUCCESS_MAGIC: FixedBytes<4> =
    FixedBytes(IPaymaster::validateAndPayForPaymasterTransactionCall::SELECTOR);

/// Returns whether `magic` accepts sponsorship.
pub fn is_valid_magic(magic: FixedBytes<4>) -> bool {
    magic != INVALID_MAGIC
}
