//! Wire form of sponsored transactions and sender recovery.
//!
//! A sponsored transaction travels as a typed envelope: the [`PAYMASTER_TX_TYPE`] byte followed
//! by the RLP list of the body fields and the signature. The body is signed over
//! `keccak256(type || rlp(body))`.

use alloy_primitives::{keccak256, Address, Bytes, Signature, TxKind, B256, U256};
use alloy_rlp::{BufMut, Decodable, Encodable, Header};
use auto_impl::auto_impl;

use crate::constants::tx::PAYMASTER_TX_TYPE;

/// Errors recovering the sender of a transaction.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// The transaction was signed for another chain.
    #[error("invalid chain id for signer: have {have}, want {want}")]
    InvalidChainId {
        /// Chain id carried by the transaction.
        have: u64,
        /// Chain id of the signer.
        want: u64,
    },
    /// The signature `s` value is in the upper half of the curve order.
    #[error("invalid transaction signature: s value above half the curve order")]
    HighS,
    /// ECDSA public key recovery failed.
    #[error("invalid transaction signature: {0}")]
    Recovery(#[from] alloy_primitives::SignatureError),
}

/// Errors decoding a transaction envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The envelope is empty.
    #[error("empty transaction envelope")]
    Empty,
    /// The type byte is not [`PAYMASTER_TX_TYPE`].
    #[error("unexpected transaction type {0:#04x}")]
    UnexpectedType(u8),
    /// The RLP payload is malformed.
    #[error("malformed transaction rlp: {0}")]
    Rlp(#[from] alloy_rlp::Error),
}

/// Unsigned body of a sponsored transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymasterTransaction {
    /// Chain the transaction is valid on.
    pub chain_id: u64,
    /// Sender nonce.
    pub nonce: u64,
    /// Native gas price.
    pub gas_price: U256,
    /// Gas limit.
    pub gas: u64,
    /// Call target, or create.
    pub to: TxKind,
    /// Value transferred to the target.
    pub value: U256,
    /// Call data or init code.
    pub data: Bytes,
    /// Paymaster address followed by the hash handed to the paymaster. Empty when unsponsored.
    pub paymaster_payload: Bytes,
}

impl PaymasterTransaction {
    fn fields_len(&self) -> usize {
        self.chain_id.length() +
            self.nonce.length() +
            self.gas_price.length() +
            self.gas.length() +
            self.to.length() +
            self.value.length() +
            self.data.length() +
            self.paymaster_payload.length()
    }

    fn encode_fields(&self, out: &mut dyn BufMut) {
        self.chain_id.encode(out);
        self.nonce.encode(out);
        self.gas_price.encode(out);
        self.gas.encode(out);
        self.to.encode(out);
        self.value.encode(out);
        self.data.encode(out);
        self.paymaster_payload.encode(out);
    }

    fn decode_fields(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        Ok(Self {
            chain_id: Decodable::decode(buf)?,
            nonce: Decodable::decode(buf)?,
            gas_price: Decodable::decode(buf)?,
            gas: Decodable::decode(buf)?,
            to: Decodable::decode(buf)?,
            value: Decodable::decode(buf)?,
            data: Decodable::decode(buf)?,
            paymaster_payload: Decodable::decode(buf)?,
        })
    }

    /// Returns the hash the sender signs.
    pub fn signature_hash(&self) -> B256 {
        let mut buf = Vec::with_capacity(1 + self.length());
        buf.put_u8(PAYMASTER_TX_TYPE);
        self.encode(&mut buf);
        keccak256(buf)
    }
}

impl Encodable for PaymasterTransaction {
    fn encode(&self, out: &mut dyn BufMut) {
        Header { list: true, payload_length: self.fields_len() }.encode(out);
        self.encode_fields(out);
    }

    fn length(&self) -> usize {
        let payload_length = self.fields_len();
        Header { list: true, payload_length }.length() + payload_length
    }
}

impl Decodable for PaymasterTransaction {
    fn decode(buf: &mut &[u8]) -> alloy_rlp::Result<Self> {
        let header = Header::decode(buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString);
        }
        let remaining = buf.len();
        let tx = Self::decode_fields(buf)?;
        if remaining - buf.len() != header.payload_length {
            return Err(alloy_rlp::Error::ListLengthMismatch {
                expected: header.payload_length,
                got: remaining - buf.len(),
            });
        }
        Ok(tx)
    }
}

/// A sponsored transaction together with its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPaymasterTransaction {
    tx: PaymasterTransaction,
    signature: Signature,
    hash: B256,
}

impl SignedPaymasterTransaction {
    /// Attaches `signature` to `tx`.
    pub fn new(tx: PaymasterTransaction, signature: Signature) -> Self {
        let mut signed = Self { tx, signature, hash: B256::ZERO };
        signed.hash = keccak256(signed.encoded_2718());
        signed
    }

    /// Returns the unsigned body.
    pub const fn tx(&self) -> &PaymasterTransaction {
        &self.tx
    }

    /// Returns the signature.
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Returns the transaction hash, the keccak of the envelope.
    pub const fn hash(&self) -> B256 {
        self.hash
    }

    fn payload_len(&self) -> usize {
        self.tx.fields_len() +
            self.signature.v().length() +
            self.signature.r().length() +
            self.signature.s().length()
    }

    /// Writes the typed envelope to `out`.
    pub fn encode_2718(&self, out: &mut dyn BufMut) {
        out.put_u8(PAYMASTER_TX_TYPE);
        Header { list: true, payload_length: self.payload_len() }.encode(out);
        self.tx.encode_fields(out);
        self.signature.v().encode(out);
        self.signature.r().encode(out);
        self.signature.s().encode(out);
    }

    /// Returns the typed envelope.
    pub fn encoded_2718(&self) -> Bytes {
        let mut out = Vec::new();
        self.encode_2718(&mut out);
        out.into()
    }

    /// Decodes a typed envelope.
    pub fn decode_2718(envelope: &[u8]) -> Result<Self, EnvelopeError> {
        let (&ty, mut buf) = envelope.split_first().ok_or(EnvelopeError::Empty)?;
        if ty != PAYMASTER_TX_TYPE {
            return Err(EnvelopeError::UnexpectedType(ty));
        }

        let header = Header::decode(&mut buf)?;
        if !header.list {
            return Err(alloy_rlp::Error::UnexpectedString.into());
        }
        if header.payload_length != buf.len() {
            return Err(alloy_rlp::Error::ListLengthMismatch {
                expected: header.payload_length,
                got: buf.len(),
            }
            .into());
        }
        let tx = PaymasterTransaction::decode_fields(&mut buf)?;
        let y_parity: bool = Decodable::decode(&mut buf)?;
        let r: U256 = Decodable::decode(&mut buf)?;
        let s: U256 = Decodable::decode(&mut buf)?;
        if !buf.is_empty() {
            return Err(alloy_rlp::Error::UnexpectedLength.into());
        }

        Ok(Self::new(tx, Signature::new(r, s, y_parity)))
    }
}

/// Recovers transaction senders under a fixed signing scheme.
#[auto_impl(&, Box, Arc)]
pub trait TransactionSigner {
    /// Returns the chain id signatures are bound to.
    fn chain_id(&self) -> u64;

    /// Returns the hash that must be signed for `tx`.
    fn signature_hash(&self, tx: &PaymasterTransaction) -> B256;

    /// Recovers the address that signed `tx`.
    fn sender(&self, tx: &SignedPaymasterTransaction) -> Result<Address, SignatureError>;
}

/// Signer bound to a single chain id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSigner {
    chain_id: u64,
}

impl ChainSigner {
    /// Creates a signer for `chain_id`.
    pub const fn new(chain_id: u64) -> Self {
        Self { chain_id }
    }
}

impl TransactionSigner for ChainSigner {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn signature_hash(&self, tx: &PaymasterTransaction) -> B256 {
        tx.signature_hash()
    }

    fn sender(&self, tx: &SignedPaymasterTransaction) -> Result<Address, SignatureError> {
        if tx.tx().chain_id != self.chain_id {
            return Err(SignatureError::InvalidChainId {
                have: tx.tx().chain_id,
                want: self.chain_id,
            });
        }
        // Recovery accepts both `s` and `n - s`; only the low form keeps the hash unique.
        if tx.signature().normalize_s().is_some() {
            return Err(SignatureError::HighS);
        }
        let hash = self.signature_hash(tx.tx());
        Ok(tx.signature().recover_address_from_prehash(&hash)?)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, b256, hex, uint};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;

    use super::*;

    const KEY: B256 = b256!("4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318");

    fn sample_tx() -> PaymasterTransaction {
        PaymasterTransaction {
            chain_id: 1337,
            nonce: 2,
            gas_price: U256::from(250_000_000u64),
            gas: 150_000,
            to: TxKind::Call(address!("3000000000000000000000000000000000000003")),
            value: U256::ZERO,
            data: Bytes::new(),
            paymaster_payload: hex!(
                "4000000000000000000000000000000000000004"
                "0000000000000000000000000000000000000000000000000000000000000001"
            )
            .into(),
        }
    }

    fn sign(tx: PaymasterTransaction) -> (SignedPaymasterTransaction, Address) {
        let key = PrivateKeySigner::from_bytes(&KEY).unwrap();
        let signature = key.sign_hash_sync(&tx.signature_hash()).unwrap();
        (SignedPaymasterTransaction::new(tx, signature), key.address())
    }

    #[test]
    fn test_sender_recovery() {
        let (signed, address) = sign(sample_tx());
        assert_eq!(ChainSigner::new(1337).sender(&signed).unwrap(), address);
    }

    #[test]
    fn test_sender_rejects_other_chain() {
        let (signed, _) = sign(sample_tx());
        let err = ChainSigner::new(88).sender(&signed).unwrap_err();
        assert!(matches!(err, SignatureError::InvalidChainId { have: 1337, want: 88 }));
    }

    #[test]
    fn test_sender_rejects_high_s() {
        const SECP256K1N: U256 =
            uint!(0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141_U256);

        let (signed, _) = sign(sample_tx());
        let low = *signed.signature();
        let high = Signature::new(low.r(), SECP256K1N - low.s(), !low.v());
        let malleated = SignedPaymasterTransaction::new(signed.tx().clone(), high);
        assert_ne!(malleated.hash(), signed.hash());

        let err = ChainSigner::new(1337).sender(&malleated).unwrap_err();
        assert!(matches!(err, SignatureError::HighS));
    }

    #[test]
    fn test_envelope_decodes_to_same_hash() {
        let (signed, address) = sign(sample_tx());
        let envelope = signed.encoded_2718();
        assert_eq!(envelope[0], PAYMASTER_TX_TYPE);

        let decoded = SignedPaymasterTransaction::decode_2718(&envelope).unwrap();
        assert_eq!(decoded, signed);
        assert_eq!(decoded.hash(), keccak256(&envelope));
        assert_eq!(ChainSigner::new(1337).sender(&decoded).unwrap(), address);
    }

    #[test]
    fn test_envelope_rejects_wrong_type_and_trailing_bytes() {
        let (signed, _) = sign(sample_tx());
        let mut envelope = signed.encoded_2718().to_vec();

        envelope[0] = 0x02;
        assert!(matches!(
            SignedPaymasterTransaction::decode_2718(&envelope),
            Err(EnvelopeError::UnexpectedType(0x02))
        ));

        envelope[0] = PAYMASTER_TX_TYPE;
        envelope.push(0x80);
        assert!(matches!(
            SignedPaymasterTransaction::decode_2718(&envelope),
            Err(EnvelopeError::Rlp(_))
        ));
        assert!(matches!(SignedPaymasterTransaction::decode_2718(&[]), Err(EnvelopeError::Empty)));
    }
}
