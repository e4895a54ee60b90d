//! Tests for applying several transactions to one block.

use alloy_primitives::{address, Address, Bytes, TxKind, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use paymaster_evm::{
    paymaster::IPaymaster,
    test_utils::{ContractOutput, MemoryState, PaymasterScript, ScriptedEvm},
    BlockContext, BlockExecutionError, BlockExecutor, ChainConfig, ChainSigner, Evm, Message,
    Metrics, PaymasterTransaction, SignedPaymasterTransaction, StateDb, StateTransitionError,
};

const SENDER: Address = address!("2000000000000000000000000000000000000002");
const TARGET: Address = address!("3000000000000000000000000000000000000003");
const PAYMASTER: Address = address!("4000000000000000000000000000000000000004");
const COINBASE: Address = address!("5000000000000000000000000000000000000005");
const VAULT: Address = address!("7000000000000000000000000000000000000007");

const KEY: B256 = B256::new([0x42; 32]);
const GAS_PRICE: u64 = 10;
const BLOCK_GAS_LIMIT: u64 = 1_000_000;
const FUNDS: u64 = 1_000_000_000_000;

fn block() -> BlockContext {
    BlockContext { number: 1, coinbase: COINBASE, gas_limit: BLOCK_GAS_LIMIT }
}

fn transfer(from: Address, nonce: u64, gas_limit: u64) -> Message {
    let gas_price = U256::from(GAS_PRICE);
    Message::new(from, Some(TARGET), nonce, U256::ZERO, gas_limit, gas_price, Bytes::new())
}

fn executor(state: MemoryState) -> BlockExecutor<ScriptedEvm> {
    let evm = ScriptedEvm::new(state, block()).with_contract(TARGET, |_, _| {
        ContractOutput::success(Bytes::new(), 15_000).with_refund(4_000)
    });
    BlockExecutor::new(evm, ChainConfig::default(), Address::ZERO)
}

#[test]
fn test_gas_pool_tracks_included_transactions() {
    let state = MemoryState::default().account_balance(SENDER, U256::from(FUNDS));
    let mut executor = executor(state);

    executor.execute_message(transfer(SENDER, 0, 100_000)).unwrap();
    let err = executor.execute_message(transfer(SENDER, 5, 100_000)).unwrap_err();
    assert!(matches!(
        err,
        BlockExecutionError::Rejected {
            index: 1,
            source: StateTransitionError::NonceTooHigh { tx: 5, state: 1, .. }
        }
    ));
    executor.execute_message(transfer(SENDER, 1, 300_000)).unwrap();

    let receipts = executor.receipts();
    assert_eq!(receipts.len(), 2);
    assert_eq!(receipts[1].cumulative_gas_used, receipts[0].gas_used + receipts[1].gas_used);

    let (_, outcome) = executor.finish();
    let included: u64 = outcome.receipts.iter().map(|receipt| receipt.gas_used).sum();
    assert_eq!(outcome.gas_used, included);
    assert_eq!(outcome.gas_remaining, BLOCK_GAS_LIMIT - included);
}

#[test]
fn test_transaction_over_block_gas_limit_is_rejected() {
    let state = MemoryState::default().account_balance(SENDER, U256::from(FUNDS));
    let mut executor = executor(state);

    executor.execute_message(transfer(SENDER, 0, 600_000)).unwrap();
    let used = executor.receipts()[0].gas_used;
    let err = executor.execute_message(transfer(SENDER, 1, BLOCK_GAS_LIMIT)).unwrap_err();
    assert!(matches!(
        err,
        BlockExecutionError::Rejected { source: StateTransitionError::GasPoolExhausted { .. }, .. }
    ));
    assert_eq!(executor.gas_pool().gas(), BLOCK_GAS_LIMIT - used);
}

#[test]
fn test_rejected_transaction_leaves_no_trace() {
    let state = MemoryState::default()
        .account_balance(SENDER, U256::from(FUNDS))
        .account_balance(PAYMASTER, U256::from(FUNDS));
    let mut executor = executor(state);
    let script = PaymasterScript::default().with_post_gas(90_000).into_contract();
    executor.evm_mut().deploy(PAYMASTER, move |state, input| {
        if input.selector() == Some(IPaymaster::validateAndPayForPaymasterTransactionCall::SELECTOR)
        {
            state.set_account_balance(VAULT, U256::from(1));
        }
        script(state, input)
    });

    let msg = transfer(SENDER, 0, 100_000).with_paymaster_payload(PAYMASTER.to_vec().into());
    let err = executor.execute_message(msg).unwrap_err();
    assert!(matches!(
        err,
        BlockExecutionError::Rejected {
            index: 0,
            source: StateTransitionError::PostTransactionOutOfGas { .. }
        }
    ));

    assert!(executor.receipts().is_empty());
    assert_eq!(executor.gas_pool().gas(), BLOCK_GAS_LIMIT);
    let state = executor.evm_mut().state();
    assert_eq!(state.balance(VAULT).unwrap(), U256::ZERO);
    assert_eq!(state.balance(PAYMASTER).unwrap(), U256::from(FUNDS));
    assert_eq!(state.balance(SENDER).unwrap(), U256::from(FUNDS));
    assert_eq!(state.balance(COINBASE).unwrap(), U256::ZERO);
    assert_eq!(state.nonce(SENDER).unwrap(), 0);
    assert_eq!(state.refund(), 0);
}

fn signed_transfer(chain_id: u64, nonce: u64) -> (SignedPaymasterTransaction, Address) {
    let key = PrivateKeySigner::from_bytes(&KEY).unwrap();
    let tx = PaymasterTransaction {
        chain_id,
        nonce,
        gas_price: U256::from(GAS_PRICE),
        gas: 100_000,
        to: TxKind::Call(TARGET),
        value: U256::ZERO,
        data: Bytes::new(),
        paymaster_payload: Bytes::new(),
    };
    let signature = key.sign_hash_sync(&tx.signature_hash()).unwrap();
    (SignedPaymasterTransaction::new(tx, signature), key.address())
}

#[test]
fn test_execute_signed_transaction() {
    let config = ChainConfig::default();
    let (tx, sender) = signed_transfer(config.chain_id, 0);
    let state = MemoryState::default().account_balance(sender, U256::from(FUNDS));
    let mut executor = executor(state);
    let signer = ChainSigner::new(config.chain_id);

    let receipt = executor.execute_transaction(&tx, &signer, None).unwrap().clone();
    assert_eq!(receipt.tx_hash, Some(tx.hash()));
    assert_eq!(receipt.payer, sender);
    assert!(receipt.success);

    let (mut evm, outcome) = executor.finish();
    assert_eq!(outcome.transactions, vec![tx]);
    assert_eq!(evm.state().nonce(sender).unwrap(), 1);
}

#[test]
fn test_signature_for_other_chain_is_rejected() {
    let (tx, sender) = signed_transfer(1, 0);
    let state = MemoryState::default().account_balance(sender, U256::from(FUNDS));
    let mut executor = executor(state);

    let err = executor.execute_transaction(&tx, &ChainSigner::new(88), None).unwrap_err();
    assert!(matches!(err, BlockExecutionError::InvalidSignature { index: 0, .. }));
    let (_, outcome) = executor.finish();
    assert!(outcome.transactions.is_empty());
    assert_eq!(outcome.gas_remaining, BLOCK_GAS_LIMIT);
}

#[test]
fn test_fee_token_transaction_uses_fork_rate() {
    let config = ChainConfig::default();
    let (tx, sender) = signed_transfer(config.chain_id, 0);
    let mut executor = executor(MemoryState::default());

    let balance = U256::from(100_000u64) * config.fee_token_gas_price_before;
    let receipt = executor.execute_transaction(&tx, &ChainSigner::new(88), Some(balance)).unwrap();
    assert!(receipt.success);
    assert_eq!(receipt.payer, sender);

    let fee = U256::from(receipt.gas_used) * config.fee_token_gas_price_before;
    assert_eq!(executor.evm_mut().state().balance(COINBASE).unwrap(), fee);
    assert_eq!(executor.evm_mut().state().balance(sender).unwrap(), U256::ZERO);
}

#[test]
fn test_execution_is_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let state = MemoryState::default()
        .account_balance(SENDER, U256::from(FUNDS))
        .account_balance(PAYMASTER, U256::from(FUNDS));
    let mut executor = executor(state);
    executor.evm_mut().deploy(PAYMASTER, PaymasterScript::default().into_contract());

    let gas_used = metrics::with_local_recorder(&recorder, || {
        Metrics::describe();
        executor.execute_message(transfer(SENDER, 0, 100_000)).unwrap();
        executor.execute_message(transfer(SENDER, 5, 100_000)).unwrap_err();
        let sponsored =
            transfer(SENDER, 1, 100_000).with_paymaster_payload(PAYMASTER.to_vec().into());
        assert_eq!(executor.execute_message(sponsored).unwrap().payer, PAYMASTER);
        executor.receipts().iter().map(|receipt| receipt.gas_used).sum::<u64>()
    });

    let snapshot = snapshotter.snapshot().into_vec();
    let described = snapshot.iter().any(|(key, _, description, _)| {
        key.key().name() == Metrics::GAS_USED && description.is_some()
    });
    assert!(described);
    let counter = |name: &str, labels: &[(&str, &str)]| {
        snapshot
            .iter()
            .find_map(|(key, _, _, value)| {
                let key = key.key();
                let key_labels = key.labels().map(|label| (label.key(), label.value()));
                let found = key.name() == name && key_labels.eq(labels.iter().copied());
                match value {
                    DebugValue::Counter(count) if found => Some(*count),
                    _ => None,
                }
            })
            .unwrap_or_default()
    };
    let payer = Metrics::PAYER_LABEL;
    assert_eq!(counter(Metrics::TRANSACTIONS_INCLUDED, &[(payer, Metrics::SENDER_PAYER)]), 1);
    assert_eq!(counter(Metrics::TRANSACTIONS_INCLUDED, &[(payer, Metrics::PAYMASTER_PAYER)]), 1);
    assert_eq!(counter(Metrics::TRANSACTIONS_REJECTED, &[]), 1);
    assert_eq!(counter(Metrics::GAS_USED, &[]), gas_used);
}
