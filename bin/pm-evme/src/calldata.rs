//! The `calldata` subcommand.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use clap::{Parser, ValueEnum};
use paymaster_evm::{paymaster::IPaymaster, Message};
use serde::Serialize;

use crate::common::{decode_hex, LogArgs, PmEvmeError, Result};

/// Paymaster entry point to encode a call for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Call {
    /// `validateAndPayForPaymasterTransaction`
    Validate,
    /// `postTransaction`
    Post,
}

/// Encode the calldata the state transition sends to a paymaster
#[derive(Debug, Clone, Parser)]
pub struct Cmd {
    /// Entry point to call
    #[arg(value_enum)]
    pub call: Call,

    /// Sender of the sponsored transaction
    #[arg(long)]
    pub from: Address,

    /// Hex-encoded paymaster payload: paymaster address followed by the transaction hash
    #[arg(long)]
    pub payload: String,

    /// Hex-encoded context returned by validation (post only)
    #[arg(long, default_value = "0x")]
    pub context: String,

    /// Report the transaction as failed (post only)
    #[arg(long)]
    pub failed: bool,

    /// Gas the paymaster may refund (post only)
    #[arg(long = "max-refunded-gas", default_value_t = 0)]
    pub max_refunded_gas: u64,

    /// Logging
    #[command(flatten)]
    pub log: LogArgs,
}

/// An encoded paymaster call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedCall {
    /// Contract the call goes to.
    pub paymaster: Address,
    /// Hash handed to the paymaster.
    pub tx_hash: B256,
    /// ABI-encoded calldata.
    pub calldata: Bytes,
}

impl Cmd {
    /// Encodes the call.
    pub fn encode(&self) -> Result<EncodedCall> {
        let message = Message { from: self.from, ..Default::default() }
            .with_paymaster_payload(decode_hex(&self.payload)?.into());
        let paymaster = message.payload_paymaster().ok_or_else(|| {
            PmEvmeError::InvalidInput(format!(
                "paymaster payload must start with a 20-byte address, got {} bytes",
                message.paymaster_payload.len()
            ))
        })?;
        let tx_hash = message.paymaster_tx_hash();
        let transaction = IPaymaster::Transaction { from: self.from };

        let calldata = match self.call {
            Call::Validate => IPaymaster::validateAndPayForPaymasterTransactionCall {
                txHash: tx_hash,
                transaction,
            }
            .abi_encode(),
            Call::Post => IPaymaster::postTransactionCall {
                context: decode_hex(&self.context)?.into(),
                transaction,
                txHash: tx_hash,
                txResult: IPaymaster::ExecutionResult { success: !self.failed },
                maxRefundedGas: U256::from(self.max_refunded_gas),
            }
            .abi_encode(),
        };
        Ok(EncodedCall { paymaster, tx_hash, calldata: calldata.into() })
    }

    /// Runs the command, returning its JSON output.
    pub fn run(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.encode()?)?)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, hex};
    use rstest::rstest;

    use super::*;

    const SENDER: Address = address!("f7e6258432cda2b44b013d6b67ced090ec4bf78f");

    fn cmd(call: Call, payload: &str) -> Cmd {
        Cmd {
            call,
            from: SENDER,
            payload: payload.to_owned(),
            context: "0x".to_owned(),
            failed: false,
            max_refunded_gas: 0,
            log: LogArgs::default(),
        }
    }

    #[test]
    fn test_validate_calldata() {
        let encoded = cmd(Call::Validate, "0x4000000000000000000000000000000000000004")
            .encode()
            .unwrap();
        assert_eq!(encoded.paymaster, address!("4000000000000000000000000000000000000004"));
        assert_eq!(encoded.tx_hash, B256::ZERO);
        assert_eq!(
            encoded.calldata[..],
            hex!(
                "d16a2f95"
                "0000000000000000000000000000000000000000000000000000000000000000"
                "000000000000000000000000f7e6258432cda2b44b013d6b67ced090ec4bf78f"
            )[..]
        );
    }

    #[rstest]
    #[case::validate(Call::Validate, hex!("d16a2f95"))]
    #[case::post(Call::Post, IPaymaster::postTransactionCall::SELECTOR)]
    fn test_selector(#[case] call: Call, #[case] selector: [u8; 4]) {
        let encoded = cmd(call, "0x4000000000000000000000000000000000000004ff").encode().unwrap();
        assert_eq!(encoded.calldata[..4], selector);
        assert_eq!(encoded.tx_hash, B256::with_last_byte(0xff));
    }

    #[test]
    fn test_short_payload_is_rejected() {
        let err = cmd(Call::Post, "0x40000000000000000000000000000000000000").encode().unwrap_err();
        assert!(matches!(err, PmEvmeError::InvalidInput(_)));
    }
}
