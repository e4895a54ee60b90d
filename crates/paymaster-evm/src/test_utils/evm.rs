use core::fmt;
use std::{collections::HashMap, sync::Arc};

use alloy_primitives::{Address, Bytes, U256};
use revm::primitives::KECCAK_EMPTY;

use super::MemoryState;
use crate::{BlockContext, CallOutcome, CreateOutcome, Evm, StateDb, StateError, VmError};

/// Gas charged per byte of init code by [`ScriptedEvm::create`].
pub const CREATE_GAS_PER_BYTE: u64 = 200;

/// Inputs of a call made through [`ScriptedEvm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallInput {
    /// Caller.
    pub caller: Address,
    /// Callee.
    pub target: Address,
    /// Call data.
    pub data: Bytes,
    /// Gas handed to the call.
    pub gas: u64,
    /// Value transferred.
    pub value: U256,
}

impl CallInput {
    /// Returns the 4-byte selector of the call data, if present.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.data.get(..4).and_then(|selector| selector.try_into().ok())
    }
}

/// What a scripted contract does when called.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractOutput {
    /// Returned data.
    pub output: Bytes,
    /// Gas consumed.
    pub gas_used: u64,
    /// Failure, if any.
    pub error: Option<VmError>,
    /// Gas added to the refund counter on success.
    pub refund: u64,
}

impl ContractOutput {
    /// A successful call returning `output`.
    pub fn success(output: impl Into<Bytes>, gas_used: u64) -> Self {
        Self { output: output.into(), gas_used, ..Default::default() }
    }

    /// A failed call.
    pub fn failure(error: VmError, gas_used: u64) -> Self {
        Self { gas_used, error: Some(error), ..Default::default() }
    }

    /// Adds `refund` to the refund counter on success.
    pub const fn with_refund(mut self, refund: u64) -> Self {
        self.refund = refund;
        self
    }
}

/// A contract implemented as a Rust closure.
pub type Contract = dyn Fn(&mut MemoryState, &CallInput) -> ContractOutput + Send + Sync;

/// An [`Evm`] whose contracts are closures, recording every call it runs.
#[derive(Default)]
pub struct ScriptedEvm {
    state: MemoryState,
    block: BlockContext,
    contracts: HashMap<Address, Arc<Contract>>,
    calls: Vec<CallInput>,
}

impl fmt::Debug for ScriptedEvm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedEvm")
            .field("state", &self.state)
            .field("block", &self.block)
            .field("contracts", &self.contracts.keys().collect::<Vec<_>>())
            .field("calls", &self.calls)
            .finish()
    }
}

impl ScriptedEvm {
    /// Creates an EVM over `state` building `block`.
    pub fn new(state: MemoryState, block: BlockContext) -> Self {
        Self { state, block, contracts: HashMap::new(), calls: Vec::new() }
    }

    /// Deploys `contract` at `address`, giving the account non-empty code.
    pub fn deploy<F>(&mut self, address: Address, contract: F)
    where
        F: Fn(&mut MemoryState, &CallInput) -> ContractOutput + Send + Sync + 'static,
    {
        self.state.set_account_code(address, Bytes::from_static(&[0xfe]));
        self.contracts.insert(address, Arc::new(contract));
    }

    /// Deploys `contract` at `address`.
    pub fn with_contract<F>(mut self, address: Address, contract: F) -> Self
    where
        F: Fn(&mut MemoryState, &CallInput) -> ContractOutput + Send + Sync + 'static,
    {
        self.deploy(address, contract);
        self
    }

    /// Returns every call run so far, in order.
    pub fn calls(&self) -> &[CallInput] {
        &self.calls
    }

    /// Returns the calls run against `target`.
    pub fn calls_to(&self, target: Address) -> Vec<&CallInput> {
        self.calls.iter().filter(|call| call.target == target).collect()
    }

    /// Returns the world state.
    pub const fn memory_state(&self) -> &MemoryState {
        &self.state
    }

    /// Consumes the EVM and returns its world state.
    pub fn into_state(self) -> MemoryState {
        self.state
    }
}

impl Evm for ScriptedEvm {
    type State = MemoryState;

    fn block(&self) -> &BlockContext {
        &self.block
    }

    fn state(&mut self) -> &mut Self::State {
        &mut self.state
    }

    fn call(
        &mut self,
        caller: Address,
        target: Address,
        data: Bytes,
        gas: u64,
        value: U256,
    ) -> Result<CallOutcome, StateError> {
        let input = CallInput { caller, target, data, gas, value };
        self.calls.push(input.clone());

        if self.state.balance(caller)? < value {
            return Ok(CallOutcome {
                gas_left: gas,
                error: Some(VmError::InsufficientBalance),
                ..Default::default()
            });
        }

        let snapshot = self.state.snapshot();
        self.state.sub_balance(caller, value)?;
        self.state.add_balance(target, value)?;

        let Some(contract) = self.contracts.get(&target).cloned() else {
            return Ok(CallOutcome { gas_left: gas, ..Default::default() });
        };
        let mut out = contract(&mut self.state, &input);
        if out.gas_used > gas {
            out = ContractOutput::failure(VmError::OutOfGas, gas);
        }

        match out.error {
            Some(error) => {
                self.state.revert_to_snapshot(snapshot)?;
                let gas_left = if error.returns_gas() { gas - out.gas_used } else { 0 };
                Ok(CallOutcome { output: out.output, gas_left, error: Some(error) })
            }
            None => {
                self.state.add_refund(out.refund);
                Ok(CallOutcome { output: out.output, gas_left: gas - out.gas_used, error: None })
            }
        }
    }

    fn create(
        &mut self,
        caller: Address,
        init_code: Bytes,
        gas: u64,
        value: U256,
    ) -> Result<CreateOutcome, StateError> {
        let nonce = self.state.nonce(caller)?;
        let address = caller.create(nonce);
        self.state.set_nonce(caller, nonce + 1)?;

        let cost = CREATE_GAS_PER_BYTE.saturating_mul(init_code.len() as u64);
        if cost > gas {
            return Ok(CreateOutcome {
                address,
                error: Some(VmError::OutOfGas),
                ..Default::default()
            });
        }
        let code_hash = self.state.code_hash(address)?;
        let occupied = !code_hash.is_zero() && code_hash != KECCAK_EMPTY;
        if occupied || self.state.nonce(address)? != 0 {
            return Ok(CreateOutcome {
                address,
                error: Some(VmError::ContractAddressCollision),
                ..Default::default()
            });
        }

        self.state.sub_balance(caller, value)?;
        self.state.add_balance(address, value)?;
        self.state.set_account_code(address, init_code);
        Ok(CreateOutcome { output: Bytes::new(), address, gas_left: gas - cost, error: None })
    }
}
