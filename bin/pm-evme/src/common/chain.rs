use std::{fs, path::PathBuf};

use clap::Parser;
use paymaster_evm::ChainConfig;

use super::Result;

/// Chain configuration arguments.
#[derive(Debug, Clone, Default, Parser)]
pub struct ChainArgs {
    /// JSON chain configuration file. The production network values are used when omitted.
    #[arg(long = "chain.config", visible_aliases = ["config"])]
    pub config: Option<PathBuf>,

    /// Override the chain id of the configuration.
    #[arg(long = "chain.id", visible_aliases = ["chain-id"])]
    pub chain_id: Option<u64>,
}

impl ChainArgs {
    /// Loads the configuration and applies overrides.
    pub fn load(&self) -> Result<ChainConfig> {
        let mut config = match &self.config {
            Some(path) => ChainConfig::from_json(&fs::read_to_string(path)?)?,
            None => ChainConfig::default(),
        };
        if let Some(chain_id) = self.chain_id {
            config.chain_id = chain_id;
        }
        Ok(config)
    }
}
