use alloy_primitives::{Bytes, FixedBytes};
use alloy_sol_types::{SolCall, SolValue};

use super::{CallInput, ContractOutput, MemoryState};
use crate::{
    paymaster::{IPaymaster, VALIDATION_SUCCESS_MAGIC},
    VmError,
};

/// Scripted behaviour of a paymaster contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymasterScript {
    /// Magic returned by validation.
    pub magic: FixedBytes<4>,
    /// Context returned by validation.
    pub context: Bytes,
    /// Gas consumed by validation.
    pub validation_gas: u64,
    /// Gas consumed by the post call.
    pub post_gas: u64,
    /// Makes validation fail.
    pub validation_error: Option<VmError>,
    /// Makes the post call fail.
    pub post_error: Option<VmError>,
    /// Makes validation return data that does not decode.
    pub malformed_return: bool,
}

impl Default for PaymasterScript {
    fn default() -> Self {
        Self {
            magic: VALIDATION_SUCCESS_MAGIC,
            context: Bytes::new(),
            validation_gas: 10_000,
            post_gas: 5_000,
            validation_error: None,
            post_error: None,
            malformed_return: false,
        }
    }
}

impl PaymasterScript {
    /// Sets the returned magic.
    pub const fn with_magic(mut self, magic: FixedBytes<4>) -> Self {
        self.magic = magic;
        self
    }

    /// Sets the returned context.
    pub fn with_context(mut self, context: Bytes) -> Self {
        self.context = context;
        self
    }

    /// Sets the gas consumed by validation.
    pub const fn with_validation_gas(mut self, gas: u64) -> Self {
        self.validation_gas = gas;
        self
    }

    /// Sets the gas consumed by the post call.
    pub const fn with_post_gas(mut self, gas: u64) -> Self {
        self.post_gas = gas;
        self
    }

    /// Makes validation fail with `error`.
    pub fn with_validation_error(mut self, error: VmError) -> Self {
        self.validation_error = Some(error);
        self
    }

    /// Makes the post call fail with `error`.
    pub fn with_post_error(mut self, error: VmError) -> Self {
        self.post_error = Some(error);
        self
    }

    /// Makes validation return undecodable data.
    pub const fn with_malformed_return(mut self) -> Self {
        self.malformed_return = true;
        self
    }

    /// Turns the script into a contract for [`ScriptedEvm::deploy`](super::ScriptedEvm::deploy).
    pub fn into_contract(
        self,
    ) -> impl Fn(&mut MemoryState, &CallInput) -> ContractOutput + Send + Sync + 'static {
        move |_, input| {
            let selector = input.selector();
            if selector == Some(IPaymaster::validateAndPayForPaymasterTransactionCall::SELECTOR) {
                if let Some(error) = self.validation_error.clone() {
                    return ContractOutput::failure(error, self.validation_gas);
                }
                if self.malformed_return {
                    return ContractOutput::success(vec![0x01, 0x02, 0x03], self.validation_gas);
                }
                let ret = (self.magic, self.context.clone()).abi_encode_params();
                ContractOutput::success(ret, self.validation_gas)
            } else if selector == Some(IPaymaster::postTransactionCall::SELECTOR) {
                match self.post_error.clone() {
                    Some(error) => ContractOutput::failure(error, self.post_gas),
                    None => ContractOutput::success(Bytes::new(), self.post_gas),
                }
            } else {
                ContractOutput::failure(VmError::Reverted, 0)
            }
        }
    }
}
