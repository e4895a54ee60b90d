//! The `decode` subcommand.

use alloy_primitives::{Address, B256, U256};
use clap::Parser;
use paymaster_evm::{normalize, ChainSigner, Message, SignedPaymasterTransaction};
use serde::Serialize;
use tracing::debug;

use crate::common::{load_hex, ChainArgs, LogArgs, PmEvmeError, Result};

/// Decode a sponsored transaction envelope, recover its sender and print the normalized message
#[derive(Debug, Clone, Parser)]
pub struct Cmd {
    /// Hex-encoded transaction envelope
    #[arg(value_name = "TX")]
    pub tx: Option<String>,

    /// File holding the hex-encoded envelope, or `-` for stdin
    #[arg(long = "tx.file", visible_aliases = ["tx-file"], conflicts_with = "tx")]
    pub tx_file: Option<String>,

    /// Height of the block the transaction is included in
    #[arg(long, default_value_t = 0)]
    pub block: u64,

    /// Fee-token balance of the payer. Switches gas pricing to the fee-token rate.
    #[arg(long = "fee-token.balance", visible_aliases = ["fee-token-balance"])]
    pub fee_token_balance: Option<U256>,

    /// Chain configuration
    #[command(flatten)]
    pub chain: ChainArgs,

    /// Logging
    #[command(flatten)]
    pub log: LogArgs,
}

/// A decoded transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decoded {
    /// Transaction hash.
    pub hash: B256,
    /// Recovered sender.
    pub sender: Address,
    /// Paymaster named by the payload, if any.
    pub paymaster: Option<Address>,
    /// Hash handed to the paymaster, if a paymaster is named.
    pub paymaster_tx_hash: Option<B256>,
    /// The message the state transition consumes.
    pub message: Message,
}

impl Cmd {
    /// Decodes the transaction.
    pub fn decode(&self) -> Result<Decoded> {
        let envelope = load_hex(self.tx.as_deref(), self.tx_file.as_deref())?
            .ok_or_else(|| PmEvmeError::InvalidInput("no transaction given".to_owned()))?;
        let config = self.chain.load()?;

        let tx = SignedPaymasterTransaction::decode_2718(&envelope)?;
        debug!(target: "pm_evme", hash = %tx.hash(), len = envelope.len(), "Decoded envelope");
        let signer = ChainSigner::new(config.chain_id);
        let message = normalize(&tx, &signer, self.fee_token_balance, self.block, &config)?;

        let paymaster = message.payload_paymaster();
        Ok(Decoded {
            hash: tx.hash(),
            sender: message.from,
            paymaster,
            paymaster_tx_hash: paymaster.map(|_| message.paymaster_tx_hash()),
            message,
        })
    }

    /// Runs the command, returning its JSON output.
    pub fn run(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.decode()?)?)
    }
}
