//! Normalized message consumed by the state transition.

use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    constants::tx::PAYMASTER_ADDRESS_LEN, ChainConfig, SignatureError, SignedPaymasterTransaction,
    TransactionSigner,
};

/// A transaction reduced to what the state transition needs, independent of wire encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Recovered sender.
    pub from: Address,
    /// Call target. `None` creates a contract.
    pub to: Option<Address>,
    /// Sender nonce.
    pub nonce: u64,
    /// Value transferred to the target.
    pub value: U256,
    /// Gas limit.
    pub gas_limit: u64,
    /// Price per unit of gas.
    pub gas_price: U256,
    /// Call data or init code.
    pub data: Bytes,
    /// Account paying for gas. The sender unless a sponsor is named by the payload.
    pub paymaster: Address,
    /// Sponsor address followed by the hash handed to the paymaster. Empty when unsponsored.
    pub paymaster_payload: Bytes,
    /// Fee-token balance charged instead of native currency when set.
    pub fee_token_balance: Option<U256>,
    /// Disables nonce and EOA checks for simulated calls.
    pub skip_account_checks: bool,
}

impl Message {
    /// Creates an unsponsored message paid in native currency.
    pub fn new(
        from: Address,
        to: Option<Address>,
        nonce: u64,
        value: U256,
        gas_limit: u64,
        gas_price: U256,
        data: Bytes,
    ) -> Self {
        Self {
            from,
            to,
            nonce,
            value,
            gas_limit,
            gas_price,
            data,
            paymaster: from,
            paymaster_payload: Bytes::new(),
            fee_token_balance: None,
            skip_account_checks: false,
        }
    }

    /// Attaches a paymaster payload, naming its sponsor as payer when the address prefix is
    /// complete.
    pub fn with_paymaster_payload(mut self, payload: Bytes) -> Self {
        self.paymaster = payload_paymaster(&payload).unwrap_or(self.from);
        self.paymaster_payload = payload;
        self
    }

    /// Charges gas against a fee-token balance instead of native currency.
    pub const fn with_fee_token_balance(mut self, balance: U256) -> Self {
        self.fee_token_balance = Some(balance);
        self
    }

    /// Toggles nonce and EOA checks.
    pub const fn with_skip_account_checks(mut self, skip: bool) -> Self {
        self.skip_account_checks = skip;
        self
    }

    /// Returns whether the message creates a contract.
    pub const fn is_create(&self) -> bool {
        self.to.is_none()
    }

    /// Returns whether a paymaster payload is attached, well-formed or not.
    pub fn has_paymaster_payload(&self) -> bool {
        !self.paymaster_payload.is_empty()
    }

    /// Returns the sponsor named by the payload, if the address prefix is complete.
    pub fn payload_paymaster(&self) -> Option<Address> {
        payload_paymaster(&self.paymaster_payload)
    }

    /// Returns the hash handed to the paymaster: the bytes after the address prefix, keeping
    /// the last 32 and left-padding shorter input with zeroes.
    pub fn paymaster_tx_hash(&self) -> B256 {
        let tail = self.paymaster_payload.get(PAYMASTER_ADDRESS_LEN..).unwrap_or_default();
        let tail = &tail[tail.len().saturating_sub(32)..];
        let mut hash = B256::ZERO;
        hash[32 - tail.len()..].copy_from_slice(tail);
        hash
    }
}

fn payload_paymaster(payload: &[u8]) -> Option<Address> {
    payload.get(..PAYMASTER_ADDRESS_LEN).map(Address::from_slice)
}

/// Converts a signed transaction into a [`Message`].
///
/// The sender is recovered through `signer`. When `fee_token_balance` is given, the gas price
/// is replaced by the fee-token rate in effect at `block_number`.
pub fn normalize<S: TransactionSigner>(
    tx: &SignedPaymasterTransaction,
    signer: &S,
    fee_token_balance: Option<U256>,
    block_number: u64,
    config: &ChainConfig,
) -> Result<Message, SignatureError> {
    let from = signer.sender(tx)?;
    let body = tx.tx();
    let to = match body.to {
        TxKind::Call(to) => Some(to),
        TxKind::Create => None,
    };

    let mut message =
        Message::new(from, to, body.nonce, body.value, body.gas, body.gas_price, body.data.clone())
            .with_paymaster_payload(body.paymaster_payload.clone());
    if let Some(balance) = fee_token_balance {
        message.fee_token_balance = Some(balance);
        message.gas_price = config.select_gas_price(block_number);
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, b256, hex};

    use super::*;

    const SENDER: Address = address!("f7e6258432cda2b44b013d6b67ced090ec4bf78f");
    const SPONSOR: Address = address!("4000000000000000000000000000000000000004");

    fn message() -> Message {
        Message::new(SENDER, Some(SPONSOR), 0, U256::ZERO, 50_000, U256::from(1), Bytes::new())
    }

    #[test]
    fn test_paymaster_defaults_to_sender() {
        assert_eq!(message().paymaster, SENDER);
        let short = message().with_paymaster_payload(Bytes::from_static(&[0x40; 19]));
        assert_eq!(short.paymaster, SENDER);
        assert!(short.has_paymaster_payload());
        assert_eq!(short.payload_paymaster(), None);
    }

    #[test]
    fn test_payload_prefix_names_paymaster() {
        let payload = [SPONSOR.as_slice(), &[0u8; 31], &[1]].concat();
        let message = message().with_paymaster_payload(payload.into());
        assert_eq!(message.paymaster, SPONSOR);
        assert_eq!(
            message.paymaster_tx_hash(),
            b256!("0000000000000000000000000000000000000000000000000000000000000001")
        );
    }

    #[test]
    fn test_paymaster_tx_hash_pads_and_truncates() {
        let short = message().with_paymaster_payload([SPONSOR.as_slice(), &[0xab]].concat().into());
        let mut expected = B256::ZERO;
        expected[31] = 0xab;
        assert_eq!(short.paymaster_tx_hash(), expected);

        let long = [SPONSOR.as_slice(), &[0xcd], &[0x11; 32]].concat();
        let long = message().with_paymaster_payload(long.into());
        assert_eq!(long.paymaster_tx_hash(), B256::repeat_byte(0x11));

        let bare = message().with_paymaster_payload(SPONSOR.to_vec().into());
        assert_eq!(bare.paymaster_tx_hash(), B256::ZERO);
        assert_eq!(hex::encode(bare.paymaster_payload), hex::encode(SPONSOR));
    }
}
