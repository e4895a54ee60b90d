//! Chain configuration consumed by the state transition.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::constants::{chain, fee_token};

/// Fork heights and fee-token rates the state transition depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Chain id that signatures are bound to.
    pub chain_id: u64,
    /// Homestead activation height. `None` means never activated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homestead_block: Option<u64>,
    /// Height after which fee-token transactions pay [`Self::fee_token_gas_price`] and fees
    /// are credited to the block's fee recipient instead of the coinbase.
    pub fee_token_fork_block: u64,
    /// Fee-token gas price after the fork.
    pub fee_token_gas_price: U256,
    /// Fee-token gas price up to and including the fork height.
    pub fee_token_gas_price_before: U256,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: chain::CHAIN_ID,
            homestead_block: Some(chain::HOMESTEAD_BLOCK),
            fee_token_fork_block: fee_token::FORK_BLOCK,
            fee_token_gas_price: U256::from(fee_token::GAS_PRICE),
            fee_token_gas_price_before: U256::from(fee_token::GAS_PRICE_BEFORE_FORK),
        }
    }
}

impl ChainConfig {
    /// Parses a configuration from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns whether Homestead rules apply at `block`.
    pub fn is_homestead(&self, block: u64) -> bool {
        self.homestead_block.is_some_and(|activation| activation <= block)
    }

    /// Returns the gas price charged to fee-token transactions included at `block`.
    pub fn select_gas_price(&self, block: u64) -> U256 {
        if self.fee_token_fork_active(block) {
            self.fee_token_gas_price
        } else {
            self.fee_token_gas_price_before
        }
    }

    /// Returns whether transaction fees go to the block's fee recipient rather than the coinbase.
    pub fn fee_recipient_active(&self, block: u64) -> bool {
        self.fee_token_fork_active(block)
    }

    const fn fee_token_fork_active(&self, block: u64) -> bool {
        block > self.fee_token_fork_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_gas_price_switches_after_fork() {
        let config = ChainConfig::default();
        let fork = config.fee_token_fork_block;
        assert_eq!(config.select_gas_price(0), U256::from(fee_token::GAS_PRICE_BEFORE_FORK));
        assert_eq!(config.select_gas_price(fork), U256::from(fee_token::GAS_PRICE_BEFORE_FORK));
        assert_eq!(config.select_gas_price(fork + 1), U256::from(fee_token::GAS_PRICE));
    }

    #[test]
    fn test_homestead_activation() {
        let mut config = ChainConfig { homestead_block: Some(10), ..Default::default() };
        assert!(!config.is_homestead(9));
        assert!(config.is_homestead(10));
        config.homestead_block = None;
        assert!(!config.is_homestead(u64::MAX));
    }

    #[test]
    fn test_json_roundtrip_uses_camel_case() {
        let config = ChainConfig { chain_id: 1337, homestead_block: None, ..Default::default() };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"feeTokenForkBlock\""));
        assert!(!json.contains("homesteadBlock"));
        assert_eq!(ChainConfig::from_json(&json).unwrap(), config);
    }
}
