//! Intrinsic gas and the block-scoped gas pool.

use serde::{Deserialize, Serialize};

use crate::constants::gas::{
    TX_DATA_NON_ZERO_GAS, TX_DATA_ZERO_GAS, TX_GAS, TX_GAS_CONTRACT_CREATION,
};

/// Errors from intrinsic gas computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GasError {
    /// The intrinsic gas of the payload does not fit in a `u64`.
    #[error("gas uint64 overflow")]
    Overflow,
}

/// Computes the gas a transaction is charged before any execution happens.
///
/// Contract creations pay the higher creation base cost only once Homestead is active. Every
/// data byte is then charged by class (zero or non-zero), failing with [`GasError::Overflow`]
/// instead of wrapping.
pub fn intrinsic_gas(data: &[u8], is_create: bool, is_homestead: bool) -> Result<u64, GasError> {
    let mut gas = if is_create && is_homestead { TX_GAS_CONTRACT_CREATION } else { TX_GAS };
    if data.is_empty() {
        return Ok(gas);
    }

    let non_zero = data.iter().filter(|byte| **byte != 0).count() as u64;
    let zero = data.len() as u64 - non_zero;
    gas = charge_bytes(gas, non_zero, TX_DATA_NON_ZERO_GAS)?;
    gas = charge_bytes(gas, zero, TX_DATA_ZERO_GAS)?;
    Ok(gas)
}

const fn charge_bytes(gas: u64, count: u64, cost: u64) -> Result<u64, GasError> {
    if (u64::MAX - gas) / cost < count {
        return Err(GasError::Overflow);
    }
    Ok(gas + count * cost)
}

/// Errors from gas pool arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GasPoolError {
    /// The pool cannot cover the requested amount.
    #[error("gas limit reached: requested {requested}, available {available}")]
    Exhausted {
        /// Gas left in the pool.
        available: u64,
        /// Gas the caller tried to reserve.
        requested: u64,
    },
    /// Returning gas pushed the pool above `u64::MAX`.
    #[error("gas pool pushed above uint64")]
    Overflow,
}

/// Gas still available to transactions of the block being built.
///
/// Owned by the block-processing loop and lent mutably to one state transition at a time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display,
)]
#[display("{_0}")]
pub struct GasPool(u64);

impl GasPool {
    /// Creates a pool holding `gas_limit` gas.
    pub const fn new(gas_limit: u64) -> Self {
        Self(gas_limit)
    }

    /// Returns the gas left in the pool.
    pub const fn gas(&self) -> u64 {
        self.0
    }

    /// Reserves `amount` gas, leaving the pool untouched on failure.
    pub fn sub_gas(&mut self, amount: u64) -> Result<(), GasPoolError> {
        self.0 = self
            .0
            .checked_sub(amount)
            .ok_or(GasPoolError::Exhausted { available: self.0, requested: amount })?;
        Ok(())
    }

    /// Returns `amount` gas to the pool.
    pub fn add_gas(&mut self, amount: u64) -> Result<(), GasPoolError> {
        self.0 = self.0.checked_add(amount).ok_or(GasPoolError::Overflow)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsic_gas_base_costs() {
        assert_eq!(intrinsic_gas(&[], false, true), Ok(TX_GAS));
        assert_eq!(intrinsic_gas(&[], true, true), Ok(TX_GAS_CONTRACT_CREATION));
        // creation only pays the higher base once homestead is active
        assert_eq!(intrinsic_gas(&[], true, false), Ok(TX_GAS));
    }

    #[test]
    fn test_intrinsic_gas_charges_per_byte_class() {
        let data = [0u8, 1, 0, 2, 3];
        let expected = TX_GAS + 3 * TX_DATA_NON_ZERO_GAS + 2 * TX_DATA_ZERO_GAS;
        assert_eq!(intrinsic_gas(&data, false, true), Ok(expected));
    }

    #[test]
    fn test_charge_bytes_overflow() {
        let count = u64::MAX / TX_DATA_NON_ZERO_GAS + 1;
        assert_eq!(charge_bytes(TX_GAS, count, TX_DATA_NON_ZERO_GAS), Err(GasError::Overflow));
        assert_eq!(charge_bytes(u64::MAX, 1, TX_DATA_ZERO_GAS), Err(GasError::Overflow));
        assert_eq!(charge_bytes(u64::MAX - 4, 1, TX_DATA_ZERO_GAS), Ok(u64::MAX));
    }

    #[test]
    fn test_gas_pool_sub_and_add() {
        let mut pool = GasPool::new(100);
        pool.sub_gas(60).unwrap();
        assert_eq!(pool.gas(), 40);
        assert_eq!(pool.sub_gas(41), Err(GasPoolError::Exhausted { available: 40, requested: 41 }));
        assert_eq!(pool.gas(), 40);
        pool.add_gas(10).unwrap();
        assert_eq!(pool.gas(), 50);
        assert_eq!(GasPool::new(u64::MAX).add_gas(1), Err(GasPoolError::Overflow));
    }
}
