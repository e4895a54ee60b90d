//! Sequential application of a block's transactions.
//!
//! The executor owns the block gas pool and applies messages one at a time. Every message is
//! bracketed by a world-state snapshot: a rejected message is rolled back together with the gas
//! it reserved, so it leaves no trace in the block. Included messages produce a [`Receipt`].

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    apply_message, normalize, ChainConfig, Evm, ExecutionResult, GasPool, Message, Metrics,
    SignatureError, SignedPaymasterTransaction, StateDb, StateError, StateTransitionError,
    TransactionSigner,
};

/// Errors from block execution.
#[derive(Debug, thiserror::Error)]
pub enum BlockExecutionError {
    /// The transaction at `index` cannot be included in this block.
    #[error("transaction {index} rejected: {source}")]
    Rejected {
        /// Position of the transaction among those submitted to the executor.
        index: usize,
        /// Why it was rejected.
        #[source]
        source: StateTransitionError,
    },
    /// The sender of the transaction at `index` could not be recovered.
    #[error("transaction {index} has an invalid signature: {source}")]
    InvalidSignature {
        /// Position of the transaction among those submitted to the executor.
        index: usize,
        /// Why recovery failed.
        #[source]
        source: SignatureError,
    },
    /// Rolling back a rejected transaction failed.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Record of an included transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Transaction hash, when the message came from a signed transaction.
    pub tx_hash: Option<B256>,
    /// Whether the top-level call succeeded.
    pub success: bool,
    /// Gas charged for this transaction.
    pub gas_used: u64,
    /// Gas charged for this and every earlier transaction of the block.
    pub cumulative_gas_used: u64,
    /// Account that paid for gas.
    pub payer: Address,
    /// Address of the created contract, if any.
    pub contract_address: Option<Address>,
}

/// Everything a finished block execution produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockOutcome {
    /// Receipts of included transactions, in order.
    pub receipts: Vec<Receipt>,
    /// Signed transactions that were included, in order.
    pub transactions: Vec<SignedPaymasterTransaction>,
    /// Total gas charged.
    pub gas_used: u64,
    /// Gas left in the pool.
    pub gas_remaining: u64,
}

/// Applies messages to one EVM for one block.
#[derive(Debug)]
pub struct BlockExecutor<E> {
    evm: E,
    config: ChainConfig,
    fee_recipient: Address,
    gas_pool: GasPool,
    submitted: usize,
    outcome: BlockOutcome,
}

impl<E: Evm> BlockExecutor<E> {
    /// Creates an executor whose gas pool holds the block gas limit.
    pub fn new(evm: E, config: ChainConfig, fee_recipient: Address) -> Self {
        let gas_pool = GasPool::new(evm.block().gas_limit);
        Self {
            evm,
            config,
            fee_recipient,
            gas_pool,
            submitted: 0,
            outcome: BlockOutcome::default(),
        }
    }

    /// Returns the EVM.
    pub const fn evm(&self) -> &E {
        &self.evm
    }

    /// Returns the EVM mutably.
    pub fn evm_mut(&mut self) -> &mut E {
        &mut self.evm
    }

    /// Returns the gas left for further transactions.
    pub const fn gas_pool(&self) -> GasPool {
        self.gas_pool
    }

    /// Returns the receipts produced so far.
    pub fn receipts(&self) -> &[Receipt] {
        &self.outcome.receipts
    }

    /// Applies an already normalized message.
    pub fn execute_message(&mut self, msg: Message) -> Result<&Receipt, BlockExecutionError> {
        let index = self.next_index();
        self.apply(index, msg, None)
    }

    /// Recovers the sender of `tx`, normalizes it and applies it.
    pub fn execute_transaction<S: TransactionSigner>(
        &mut self,
        tx: &SignedPaymasterTransaction,
        signer: &S,
        fee_token_balance: Option<U256>,
    ) -> Result<&Receipt, BlockExecutionError> {
        let index = self.next_index();
        let block_number = self.evm.block().number;
        let msg = normalize(tx, signer, fee_token_balance, block_number, &self.config)
            .map_err(|source| BlockExecutionError::InvalidSignature { index, source })?;
        self.apply(index, msg, Some(tx))
    }

    /// Finishes the block, returning the EVM and what was produced.
    pub fn finish(mut self) -> (E, BlockOutcome) {
        self.outcome.gas_remaining = self.gas_pool.gas();
        (self.evm, self.outcome)
    }

    fn next_index(&mut self) -> usize {
        let index = self.submitted;
        self.submitted += 1;
        index
    }

    fn apply(
        &mut self,
        index: usize,
        msg: Message,
        tx: Option<&SignedPaymasterTransaction>,
    ) -> Result<&Receipt, BlockExecutionError> {
        let tx_hash = tx.map(SignedPaymasterTransaction::hash);
        let from = msg.from;
        let snapshot = self.evm.state().snapshot();
        let gas_pool = self.gas_pool;

        let applied =
            apply_message(&mut self.evm, msg, &mut self.gas_pool, &self.config, self.fee_recipient);
        let result = match applied {
            Ok(result) => result,
            Err(source) => {
                self.evm.state().revert_to_snapshot(snapshot)?;
                self.evm.state().finalise();
                self.gas_pool = gas_pool;
                ::metrics::counter!(Metrics::TRANSACTIONS_REJECTED).increment(1);
                warn!(target: "block_executor", index, ?tx_hash, %source, "Rejected transaction");
                return Err(BlockExecutionError::Rejected { index, source });
            }
        };
        self.evm.state().finalise();
        if let Some(tx) = tx {
            self.outcome.transactions.push(tx.clone());
        }
        let payer =
            if result.payer == from { Metrics::SENDER_PAYER } else { Metrics::PAYMASTER_PAYER };
        ::metrics::counter!(Metrics::TRANSACTIONS_INCLUDED, Metrics::PAYER_LABEL => payer)
            .increment(1);
        ::metrics::counter!(Metrics::GAS_USED).increment(result.gas_used);
        Ok(self.push_receipt(tx_hash, &result))
    }

    fn push_receipt(&mut self, tx_hash: Option<B256>, result: &ExecutionResult) -> &Receipt {
        self.outcome.gas_used += result.gas_used;
        let receipt = Receipt {
            tx_hash,
            success: result.is_success(),
            gas_used: result.gas_used,
            cumulative_gas_used: self.outcome.gas_used,
            payer: result.payer,
            contract_address: result.contract_address,
        };
        debug!(
            target: "block_executor",
            ?tx_hash,
            gas_used = receipt.gas_used,
            success = receipt.success,
            "Included transaction"
        );
        let position = self.outcome.receipts.len();
        self.outcome.receipts.push(receipt);
        &self.outcome.receipts[position]
    }
}
