//! Gas purchase and refund.
//!
//! The payer pre-pays the whole gas limit when gas is bought and gets the unused part back at
//! refund time, so its worst-case loss is bounded by the declared limit and the block gas pool
//! never undercounts reserved capacity.

use alloy_primitives::U256;
use tracing::trace;

use super::{StateTransition, StateTransitionError};
use crate::{constants::gas::REFUND_QUOTIENT, Evm, StateDb};

impl<E: Evm> StateTransition<'_, E> {
    /// Charges the payer for the full gas limit and reserves it in the block gas pool.
    ///
    /// Every check runs before the first mutation. Gas already consumed by paymaster
    /// validation is deducted from what is left to execute with.
    pub(super) fn buy_gas(&mut self) -> Result<(), StateTransitionError> {
        let payer = self.msg.paymaster;
        let gas_limit = self.msg.gas_limit;
        let have = match self.msg.fee_token_balance {
            Some(balance) => balance,
            None => self.evm.state().balance(payer)?,
        };
        // A cost above 256 bits is more than any balance can hold.
        let max_cost = self.gas_cost(gas_limit).ok_or(
            StateTransitionError::InsufficientBalance { payer, have, want: U256::MAX },
        )?;
        if have < max_cost {
            return Err(StateTransitionError::InsufficientBalance { payer, have, want: max_cost });
        }

        self.gas_pool.sub_gas(gas_limit)?;
        self.gas_remaining = gas_limit.saturating_sub(self.validation_gas);
        self.initial_gas = gas_limit;

        self.ensure_account(payer)?;
        if self.msg.fee_token_balance.is_none() {
            self.evm.state().sub_balance(payer, max_cost)?;
        }
        trace!(
            target: "state_transition",
            %payer,
            %max_cost,
            gas_remaining = self.gas_remaining,
            "Bought gas"
        );
        Ok(())
    }

    /// Applies the capped refund counter, pays unused gas back to the payer and returns it to
    /// the block gas pool.
    pub(super) fn refund_gas(&mut self) -> Result<(), StateTransitionError> {
        let refund = (self.gas_used() / REFUND_QUOTIENT).min(self.evm.state().refund());
        self.gas_remaining += refund;

        if self.msg.fee_token_balance.is_none() {
            let remaining =
                self.gas_cost(self.gas_remaining).ok_or(StateTransitionError::GasOverflow)?;
            self.evm.state().add_balance(self.msg.paymaster, remaining)?;
        }
        self.gas_pool.add_gas(self.gas_remaining)?;
        Ok(())
    }

    /// Returns `gas * gas_price`, or `None` if it does not fit in 256 bits.
    pub(super) fn gas_cost(&self, gas: u64) -> Option<U256> {
        U256::from(gas).checked_mul(self.msg.gas_price)
    }

    /// Returns the gas consumed so far.
    pub(super) const fn gas_used(&self) -> u64 {
        self.initial_gas.saturating_sub(self.gas_remaining)
    }
}
