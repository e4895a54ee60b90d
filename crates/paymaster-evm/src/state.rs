//! World-state access used by the state transition.
//!
//! [`StateDb`] is the narrow interface the transition mutates accounts through. [`CacheState`]
//! implements it on top of revm's [`CacheDB`], so any revm [`DatabaseRef`] backend can serve as
//! the underlying store while all writes stay in the in-memory cache.

use alloy_primitives::{Address, Bytes, B256, U256};
use auto_impl::auto_impl;
use revm::{
    database::{AccountState, CacheDB, DbAccount},
    primitives::KECCAK_EMPTY,
    state::Bytecode,
    DatabaseRef,
};

/// Errors raised by world-state operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Debiting would take the balance below zero.
    #[error("balance underflow for {address}: balance {balance}, debit {amount}")]
    BalanceUnderflow {
        /// Account being debited.
        address: Address,
        /// Its balance before the debit.
        balance: U256,
        /// Amount of the debit.
        amount: U256,
    },
    /// Crediting would overflow the 256-bit balance.
    #[error("balance overflow for {address}")]
    BalanceOverflow {
        /// Account being credited.
        address: Address,
    },
    /// The snapshot id was never issued or has already been reverted.
    #[error("unknown state snapshot {0}")]
    UnknownSnapshot(usize),
    /// The backing database failed.
    #[error("database error: {0}")]
    Database(#[source] Box<dyn core::error::Error + Send + Sync>),
}

/// Mutable world state as seen by one block-processing loop.
#[auto_impl(&mut, Box)]
pub trait StateDb {
    /// Returns whether an account exists at `address`.
    fn exists(&mut self, address: Address) -> Result<bool, StateError>;

    /// Creates an empty account at `address`, keeping any balance it already holds.
    fn create_account(&mut self, address: Address) -> Result<(), StateError>;

    /// Returns the native balance of `address`.
    fn balance(&mut self, address: Address) -> Result<U256, StateError>;

    /// Credits `amount` to `address`.
    fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError>;

    /// Debits `amount` from `address`.
    fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError>;

    /// Returns the nonce of `address`.
    fn nonce(&mut self, address: Address) -> Result<u64, StateError>;

    /// Sets the nonce of `address`.
    fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), StateError>;

    /// Returns the code hash of `address`: zero for missing accounts, [`KECCAK_EMPTY`] for
    /// accounts without code.
    fn code_hash(&mut self, address: Address) -> Result<B256, StateError>;

    /// Returns the refund counter accumulated by the current transaction.
    fn refund(&self) -> u64;

    /// Adds `gas` to the refund counter.
    fn add_refund(&mut self, gas: u64);

    /// Records the current state and returns an id to revert to.
    fn snapshot(&mut self) -> usize;

    /// Discards every change made since snapshot `id` was taken.
    fn revert_to_snapshot(&mut self, id: usize) -> Result<(), StateError>;

    /// Ends the current transaction: clears the refund counter and the snapshot journal.
    fn finalise(&mut self);
}

/// [`StateDb`] over a revm [`CacheDB`].
///
/// While a snapshot is open every account write first journals the cached account it
/// replaces, so reverting only touches the accounts written since the snapshot.
#[derive(Debug, Clone)]
pub struct CacheState<DB> {
    db: CacheDB<DB>,
    refund: u64,
    journal: Vec<JournalEntry>,
    checkpoints: Vec<Checkpoint>,
}

/// Cached account as it was before a write. `None` if it was not cached yet.
#[derive(Debug, Clone)]
struct JournalEntry {
    address: Address,
    prior: Option<DbAccount>,
}

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    journal_len: usize,
    refund: u64,
}

impl<DB: Default> Default for CacheState<DB> {
    fn default() -> Self {
        Self::new(DB::default())
    }
}

impl<DB> CacheState<DB> {
    /// Wraps `db` with an empty write cache.
    pub fn new(db: DB) -> Self {
        Self { db: CacheDB::new(db), refund: 0, journal: Vec::new(), checkpoints: Vec::new() }
    }

    /// Returns the underlying revm cache database.
    pub const fn cache_db(&self) -> &CacheDB<DB> {
        &self.db
    }

    /// Consumes the state and returns the underlying revm cache database.
    pub fn into_cache_db(self) -> CacheDB<DB> {
        self.db
    }
}

impl<DB> CacheState<DB>
where
    DB: DatabaseRef,
    DB::Error: Send + Sync + 'static,
{
    fn account(&mut self, address: Address) -> Result<&mut DbAccount, StateError> {
        self.db.load_account(address).map_err(|err| StateError::Database(Box::new(err)))
    }

    /// Loads `address` for writing, materialising it if it did not exist.
    fn account_mut(&mut self, address: Address) -> Result<&mut DbAccount, StateError> {
        if !self.checkpoints.is_empty() {
            let prior = self.db.cache.accounts.get(&address).cloned();
            self.journal.push(JournalEntry { address, prior });
        }
        let account = self.account(address)?;
        if account.account_state == AccountState::NotExisting {
            account.account_state = AccountState::None;
        }
        Ok(account)
    }

    /// Deploys `code` at `address`.
    pub fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), StateError> {
        let bytecode = Bytecode::new_legacy(code);
        let account = self.account_mut(address)?;
        account.info.code_hash = bytecode.hash_slow();
        account.info.code = Some(bytecode);
        Ok(())
    }
}

impl<DB> StateDb for CacheState<DB>
where
    DB: DatabaseRef,
    DB::Error: Send + Sync + 'static,
{
    fn exists(&mut self, address: Address) -> Result<bool, StateError> {
        Ok(self.account(address)?.account_state != AccountState::NotExisting)
    }

    fn create_account(&mut self, address: Address) -> Result<(), StateError> {
        self.account_mut(address).map(|_| ())
    }

    fn balance(&mut self, address: Address) -> Result<U256, StateError> {
        Ok(self.account(address)?.info.balance)
    }

    fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let account = self.account_mut(address)?;
        account.info.balance = account
            .info
            .balance
            .checked_add(amount)
            .ok_or(StateError::BalanceOverflow { address })?;
        Ok(())
    }

    fn sub_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let account = self.account_mut(address)?;
        let balance = account.info.balance;
        account.info.balance = balance.checked_sub(amount).ok_or(StateError::BalanceUnderflow {
            address,
            balance,
            amount,
        })?;
        Ok(())
    }

    fn nonce(&mut self, address: Address) -> Result<u64, StateError> {
        Ok(self.account(address)?.info.nonce)
    }

    fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), StateError> {
        self.account_mut(address)?.info.nonce = nonce;
        Ok(())
    }

    fn code_hash(&mut self, address: Address) -> Result<B256, StateError> {
        let account = self.account(address)?;
        if account.account_state == AccountState::NotExisting {
            return Ok(B256::ZERO);
        }
        Ok(account.info.code_hash)
    }

    fn refund(&self) -> u64 {
        self.refund
    }

    fn add_refund(&mut self, gas: u64) {
        self.refund = self.refund.saturating_add(gas);
    }

    fn snapshot(&mut self) -> usize {
        self.checkpoints.push(Checkpoint { journal_len: self.journal.len(), refund: self.refund });
        self.checkpoints.len() - 1
    }

    fn revert_to_snapshot(&mut self, id: usize) -> Result<(), StateError> {
        if id >= self.checkpoints.len() {
            return Err(StateError::UnknownSnapshot(id));
        }
        self.checkpoints.truncate(id + 1);
        let Some(checkpoint) = self.checkpoints.pop() else {
            return Err(StateError::UnknownSnapshot(id));
        };
        // Newest first, so an account written twice ends up with its oldest value.
        for entry in self.journal.drain(checkpoint.journal_len..).rev() {
            match entry.prior {
                Some(account) => {
                    self.db.cache.accounts.insert(entry.address, account);
                }
                None => {
                    self.db.cache.accounts.remove(&entry.address);
                }
            }
        }
        self.refund = checkpoint.refund;
        Ok(())
    }

    fn finalise(&mut self) {
        self.refund = 0;
        self.journal.clear();
        self.checkpoints.clear();
    }
}
