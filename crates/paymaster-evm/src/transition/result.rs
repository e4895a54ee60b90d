use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

use crate::VmError;

/// Outcome of a message that was executed and must be included in the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Gas charged, refunds already deducted.
    pub gas_used: u64,
    /// Failure of the top-level call. The transaction is still charged.
    pub error: Option<VmError>,
    /// Data returned by the top-level call, or revert data.
    pub return_data: Bytes,
    /// Account that paid for gas.
    pub payer: Address,
    /// Address of the created contract for successful creations.
    pub contract_address: Option<Address>,
}

impl ExecutionResult {
    /// Returns whether the top-level call succeeded.
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns whether the top-level call failed.
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Returns the revert data if the call reverted.
    pub fn revert_data(&self) -> Option<&Bytes> {
        matches!(self.error, Some(VmError::Reverted)).then_some(&self.return_data)
    }
}
