//! The per-message state transition.
//!
//! A message moves through a fixed sequence of steps, never going back:
//!
//! 1. paymaster validation, when a paymaster payload is attached;
//! 2. pre-check: nonce and EOA rules (skipped for simulated calls), then gas purchase;
//! 3. intrinsic gas deduction;
//! 4. value transfer check;
//! 5. execution of the call or creation;
//! 6. paymaster post call, when the paymaster accepted sponsorship;
//! 7. refund of unused gas;
//! 8. fee payout to the fee recipient or the coinbase.
//!
//! Failures in steps 1 to 4 and an out-of-gas post call reject the message with a
//! [`StateTransitionError`]. Interpreter failures of the main call are part of the
//! [`ExecutionResult`] and the message is still charged.

use alloy_primitives::{Address, Bytes, FixedBytes};
use revm::primitives::KECCAK_EMPTY;
use tracing::{debug, warn};

use crate::{
    intrinsic_gas,
    paymaster::{
        is_valid_magic, post_transaction, validate_and_pay_for_paymaster, PaymasterError,
        INVALID_MAGIC,
    },
    ChainConfig, Evm, GasPool, Message, StateDb, VmError,
};

mod accounting;

mod error;
pub use error::*;

mod result;
pub use result::*;

/// Working state of one message being applied.
///
/// Constructed, run and dropped within a single call; never shared across messages.
#[derive(Debug)]
pub struct StateTransition<'a, E> {
    evm: &'a mut E,
    msg: Message,
    gas_pool: &'a mut GasPool,
    config: &'a ChainConfig,

    gas_remaining: u64,
    initial_gas: u64,
    validation_gas: u64,

    paymaster_magic: FixedBytes<4>,
    paymaster_context: Bytes,
}

impl<'a, E: Evm> StateTransition<'a, E> {
    /// Prepares `msg` for execution against `evm`, reserving gas from `gas_pool`.
    pub fn new(
        evm: &'a mut E,
        msg: Message,
        gas_pool: &'a mut GasPool,
        config: &'a ChainConfig,
    ) -> Self {
        Self {
            evm,
            msg,
            gas_pool,
            config,
            gas_remaining: 0,
            initial_gas: 0,
            validation_gas: 0,
            paymaster_magic: INVALID_MAGIC,
            paymaster_context: Bytes::new(),
        }
    }

    /// Applies the message, paying fees to `fee_recipient` once the fee-recipient fork is
    /// active.
    ///
    /// On error the world state may already hold changes made by paymaster validation or
    /// execution; callers discard them by reverting to a snapshot taken beforehand.
    pub fn transition(
        mut self,
        fee_recipient: Address,
    ) -> Result<ExecutionResult, StateTransitionError> {
        // Only a payload naming a paymaster can move the charge off the sender.
        if self.msg.payload_paymaster().is_none() {
            self.msg.paymaster = self.msg.from;
        }
        if self.msg.has_paymaster_payload() {
            self.validate_paymaster()?;
        }

        self.pre_check()?;
        let from = self.msg.from;
        self.ensure_account(from)?;

        let block_number = self.evm.block().number;
        let intrinsic = intrinsic_gas(
            &self.msg.data,
            self.msg.is_create(),
            self.config.is_homestead(block_number),
        )?;
        if self.gas_remaining < intrinsic {
            return Err(StateTransitionError::IntrinsicGasTooLow {
                have: self.gas_remaining,
                want: intrinsic,
            });
        }
        self.gas_remaining -= intrinsic;

        let value = self.msg.value;
        if !value.is_zero() && !self.evm.can_transfer(from, value)? {
            return Err(StateTransitionError::InsufficientFundsForTransfer { address: from, value });
        }

        let (return_data, error, contract_address) = self.execute()?;

        if self.sponsored() {
            self.post_paymaster()?;
        }

        self.refund_gas()?;
        self.pay_fees(fee_recipient, block_number)?;

        let result = ExecutionResult {
            gas_used: self.gas_used(),
            error,
            return_data,
            payer: self.msg.paymaster,
            contract_address,
        };
        debug!(
            target: "state_transition",
            %from,
            payer = %result.payer,
            gas_used = result.gas_used,
            error = ?result.error,
            "Applied message"
        );
        Ok(result)
    }

    /// Runs paymaster validation, deciding who pays for gas.
    ///
    /// A payload too short to name a paymaster is never sent to a contract: the magic stays
    /// invalid and the sender pays. A paymaster returning [`INVALID_MAGIC`] declines and the
    /// sender pays as well.
    fn validate_paymaster(&mut self) -> Result<(), StateTransitionError> {
        let Some(paymaster) = self.msg.payload_paymaster() else {
            warn!(
                target: "state_transition",
                from = %self.msg.from,
                len = self.msg.paymaster_payload.len(),
                "Malformed paymaster payload, charging sender"
            );
            self.paymaster_magic = INVALID_MAGIC;
            self.msg.paymaster = self.msg.from;
            return Ok(());
        };

        self.msg.paymaster = paymaster;
        let tx_hash = self.msg.paymaster_tx_hash();
        let validation = validate_and_pay_for_paymaster(&mut *self.evm, &self.msg, tx_hash)
            .map_err(|err| paymaster_error(err, paymaster))?;

        self.validation_gas = validation.gas_used;
        self.paymaster_magic = validation.magic;
        self.paymaster_context = validation.context;
        if !is_valid_magic(self.paymaster_magic) {
            debug!(target: "state_transition", %paymaster, "Paymaster declined sponsorship");
            self.msg.paymaster = self.msg.from;
        }
        Ok(())
    }

    /// Enforces nonce and EOA rules unless disabled, then buys gas.
    fn pre_check(&mut self) -> Result<(), StateTransitionError> {
        if !self.msg.skip_account_checks {
            let address = self.msg.from;
            let tx = self.msg.nonce;
            let state = self.evm.state().nonce(address)?;
            if state < tx {
                return Err(StateTransitionError::NonceTooHigh { address, tx, state });
            }
            if state > tx {
                return Err(StateTransitionError::NonceTooLow { address, tx, state });
            }
            if state.checked_add(1).is_none() {
                return Err(StateTransitionError::NonceMax { address, nonce: state });
            }

            let code_hash = self.evm.state().code_hash(address)?;
            if !code_hash.is_zero() && code_hash != KECCAK_EMPTY {
                return Err(StateTransitionError::SenderNotEoa { address, code_hash });
            }
        }
        self.buy_gas()
    }

    /// Dispatches the call or creation with the gas left after intrinsic gas.
    fn execute(
        &mut self,
    ) -> Result<(Bytes, Option<VmError>, Option<Address>), StateTransitionError> {
        let from = self.msg.from;
        let data = self.msg.data.clone();
        let value = self.msg.value;

        match self.msg.to {
            None => {
                let outcome = self.evm.create(from, data, self.gas_remaining, value)?;
                self.gas_remaining = outcome.gas_left.min(self.gas_remaining);
                let address = outcome.error.is_none().then_some(outcome.address);
                Ok((outcome.output, outcome.error, address))
            }
            Some(to) => {
                let nonce = self.evm.state().nonce(from)?;
                let next = nonce
                    .checked_add(1)
                    .ok_or(StateTransitionError::NonceMax { address: from, nonce })?;
                self.evm.state().set_nonce(from, next)?;

                self.ensure_account(to)?;
                let outcome = self.evm.call(from, to, data, self.gas_remaining, value)?;
                self.gas_remaining = outcome.gas_left.min(self.gas_remaining);
                Ok((outcome.output, outcome.error, None))
            }
        }
    }

    /// Reports the transaction to the paymaster and charges the gas it used.
    ///
    /// The paymaster is always told the transaction succeeded and that no gas is refundable,
    /// whatever the main call returned.
    fn post_paymaster(&mut self) -> Result<(), StateTransitionError> {
        let paymaster = self.msg.paymaster;
        let tx_hash = self.msg.paymaster_tx_hash();
        let context = self.paymaster_context.clone();
        let outcome = post_transaction(&mut *self.evm, &self.msg, tx_hash, context, 0, true)
            .map_err(|err| paymaster_error(err, paymaster))?;

        if let Some(error) = &outcome.error {
            warn!(
                target: "state_transition",
                %paymaster,
                %error,
                "Paymaster post transaction failed"
            );
        }
        if outcome.gas_used > self.gas_remaining {
            return Err(StateTransitionError::PostTransactionOutOfGas {
                gas_used: outcome.gas_used,
                gas_remaining: self.gas_remaining,
            });
        }
        self.gas_remaining -= outcome.gas_used;
        Ok(())
    }

    /// Credits `gas_used * gas_price` to the fee recipient after the fork (when set) or to the
    /// coinbase before it.
    fn pay_fees(
        &mut self,
        fee_recipient: Address,
        block_number: u64,
    ) -> Result<(), StateTransitionError> {
        let fee = self.gas_cost(self.gas_used()).ok_or(StateTransitionError::GasOverflow)?;
        let recipient = if self.config.fee_recipient_active(block_number) {
            if fee_recipient.is_zero() {
                return Ok(());
            }
            fee_recipient
        } else {
            self.evm.block().coinbase
        };
        self.evm.state().add_balance(recipient, fee)?;
        Ok(())
    }

    /// Returns whether the paymaster accepted sponsorship and must be told about the outcome.
    fn sponsored(&self) -> bool {
        self.msg.payload_paymaster().is_some() && is_valid_magic(self.paymaster_magic)
    }

    fn ensure_account(&mut self, address: Address) -> Result<(), StateTransitionError> {
        let state = self.evm.state();
        if !state.exists(address)? {
            state.create_account(address)?;
        }
        Ok(())
    }
}

fn paymaster_error(err: PaymasterError, paymaster: Address) -> StateTransitionError {
    match err {
        PaymasterError::Abi(err) => StateTransitionError::Abi(err),
        PaymasterError::Vm { error, .. } => {
            StateTransitionError::PaymasterValidationFailed { paymaster, error }
        }
        PaymasterError::State(err) => StateTransitionError::State(err),
    }
}

/// Applies `msg` against `evm`, drawing gas from `gas_pool`.
pub fn apply_message<E: Evm>(
    evm: &mut E,
    msg: Message,
    gas_pool: &mut GasPool,
    config: &ChainConfig,
    fee_recipient: Address,
) -> Result<ExecutionResult, StateTransitionError> {
    StateTransition::new(evm, msg, gas_pool, config).transition(fee_recipient)
}
