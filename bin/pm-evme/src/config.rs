//! The `config` subcommand.

use alloy_primitives::U256;
use clap::Parser;
use paymaster_evm::ChainConfig;
use serde::Serialize;

use crate::common::{ChainArgs, LogArgs, Result};

/// Print the effective chain configuration, optionally with the rules in force at a block
#[derive(Debug, Clone, Parser)]
pub struct Cmd {
    /// Also print which rules apply at this block height
    #[arg(long)]
    pub block: Option<u64>,

    /// Chain configuration
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Logging
    #[command(flatten)]
    pub log: LogArgs,
}

/// Rules in force at one block height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRules {
    /// Block height.
    pub block: u64,
    /// Whether Homestead intrinsic gas rules apply.
    pub homestead: bool,
    /// Gas price charged to fee-token transactions.
    pub fee_token_gas_price: U256,
    /// Whether fees go to the fee recipient instead of the coinbase.
    pub fee_recipient_active: bool,
}

impl BlockRules {
    /// Evaluates `config` at `block`.
    pub fn new(config: &ChainConfig, block: u64) -> Self {
        Self {
            block,
            homestead: config.is_homestead(block),
            fee_token_gas_price: config.select_gas_price(block),
            fee_recipient_active: config.fee_recipient_active(block),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Output {
    config: ChainConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    rules: Option<BlockRules>,
}

impl Cmd {
    /// Runs the command, returning its JSON output.
    pub fn run(&self) -> Result<String> {
        let config = self.chain.load()?;
        let rules = self.block.map(|block| BlockRules::new(&config, block));
        Ok(serde_json::to_string_pretty(&Output { config, rules })?)
    }
}
