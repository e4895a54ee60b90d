use alloy_primitives::{Address, Bytes, B256, U256};
use delegate::delegate;
use revm::database::EmptyDB;

use crate::{CacheState, StateDb, StateError};

/// An in-memory world state for testing purposes.
#[derive(Debug, Default, Clone, derive_more::Deref, derive_more::DerefMut)]
pub struct MemoryState {
    #[deref]
    #[deref_mut]
    state: CacheState<EmptyDB>,
}

impl MemoryState {
    /// Sets the code for an account.
    pub fn set_account_code(&mut self, address: Address, code: Bytes) {
        self.state.set_code(address, code).unwrap();
    }

    /// Sets the code for an account.
    pub fn account_code(mut self, address: Address, code: Bytes) -> Self {
        self.set_account_code(address, code);
        self
    }

    /// Sets the balance for an account.
    pub fn set_account_balance(&mut self, address: Address, balance: U256) {
        let current = self.state.balance(address).unwrap();
        self.state.sub_balance(address, current).unwrap();
        self.state.add_balance(address, balance).unwrap();
    }

    /// Sets the balance for an account.
    pub fn account_balance(mut self, address: Address, balance: U256) -> Self {
        self.set_account_balance(address, balance);
        self
    }

    /// Sets the nonce for an account.
    pub fn set_account_nonce(&mut self, address: Address, nonce: u64) {
        self.state.set_nonce(address, nonce).unwrap();
    }

    /// Sets the nonce for an account.
    pub fn account_nonce(mut self, address: Address, nonce: u64) -> Self {
        self.set_account_nonce(address, nonce);
        self
    }
}

impl StateDb for MemoryState {
    delegate! {
        to self.state {
            fn exists(&mut self, address: Address) -> Result<bool, StateError>;
            fn create_account(&mut self, address: Address) -> Result<(), StateError>;
            fn balance(&mut self, address: Address) -> Result<U256, StateError>;
            fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError>;
            fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError>;
            fn nonce(&mut self, address: Address) -> Result<u64, StateError>;
            fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), StateError>;
            fn code_hash(&mut self, address: Address) -> Result<B256, StateError>;
            fn refund(&self) -> u64;
            fn add_refund(&mut self, gas: u64);
            fn snapshot(&mut self) -> usize;
            fn revert_to_snapshot(&mut self, id: usize) -> Result<(), StateError>;
            fn finalise(&mut self);
        }
    }
}
