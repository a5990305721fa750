//! Local secp256k1 signing credential and legacy (EIP-155) transaction codec.
//!
//! The gateway signs every state-changing call itself and submits the raw
//! transaction. Decoding is the inverse path: the in-memory ledger uses it to
//! recover the sender of a submitted transaction the way a node would.

use std::fmt;

use primitive_types::U256;
use rlp::{DecoderError, Rlp, RlpStream};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::domain::{keccak256, Address, TxHash};

/// Upper half boundary of the secp256k1 order (EIP-2)
const HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    #[error("private key is not valid hex")]
    InvalidHex,
    #[error("private key must be 32 bytes, got {0}")]
    InvalidLength(usize),
    #[error("private key is not a valid secp256k1 scalar")]
    InvalidKey,
    #[error("malformed transaction: {0}")]
    Malformed(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("chain id {0} is too large for EIP-155")]
    ChainIdOverflow(u64),
}

/// Signing credential held by the connection.
///
/// Debug output never includes key material.
pub struct LocalSigner {
    secret: SecretKey,
    address: Address,
}

impl LocalSigner {
    /// Parse a hex private key, with or without `0x`.
    pub fn from_hex(input: &str) -> Result<Self, SignerError> {
        let trimmed = input.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if body.len() != 64 {
            return Err(SignerError::InvalidLength(body.len() / 2));
        }

        let mut bytes = Zeroizing::new([0u8; 32]);
        hex::decode_to_slice(body, &mut bytes[..]).map_err(|_| SignerError::InvalidHex)?;
        let secret = SecretKey::from_slice(&bytes[..]).map_err(|_| SignerError::InvalidKey)?;
        Ok(Self::from_secret(secret))
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let secp = Secp256k1::signing_only();
        let public = PublicKey::from_secret_key(&secp, &secret);
        Self {
            secret,
            address: public_key_address(&public),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a legacy transaction with EIP-155 replay protection.
    pub fn sign_legacy(&self, tx: &LegacyTransaction) -> Result<SignedTransaction, SignerError> {
        let digest = keccak256(&tx.signing_payload());
        let secp = Secp256k1::signing_only();
        let signature = secp.sign_ecdsa_recoverable(&Message::from_digest(digest), &self.secret);
        let (recovery_id, compact) = signature.serialize_compact();

        let v = tx
            .chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35 + recovery_id.to_i32() as u64))
            .ok_or(SignerError::ChainIdOverflow(tx.chain_id))?;
        let r = U256::from_big_endian(&compact[..32]);
        let s = U256::from_big_endian(&compact[32..]);

        let mut stream = RlpStream::new_list(9);
        tx.append_fields(&mut stream);
        stream.append(&v);
        stream.append(&r);
        stream.append(&s);
        let raw = stream.out().to_vec();
        let hash = TxHash::from(keccak256(&raw));

        debug!(hash = ?hash, nonce = %tx.nonce, chain_id = tx.chain_id, "signed transaction");
        Ok(SignedTransaction { raw, hash })
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Unsigned legacy transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl LegacyTransaction {
    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        stream.append(&self.gas_price);
        stream.append(&self.gas_limit);
        match &self.to {
            Some(to) => stream.append(to),
            None => stream.append_empty_data(),
        };
        stream.append(&self.value);
        stream.append(&self.data);
    }

    /// RLP of `[nonce, gasPrice, gas, to, value, data, chainId, 0, 0]`
    fn signing_payload(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&self.chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
        stream.out().to_vec()
    }
}

/// Raw signed transaction ready for `eth_sendRawTransaction`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: TxHash,
}

/// Legacy transaction decoded from raw bytes with its recovered sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTransaction {
    pub hash: TxHash,
    pub sender: Address,
    pub chain_id: Option<u64>,
    pub tx: LegacyTransaction,
}

/// Decode a signed legacy transaction and recover its sender.
pub fn decode_signed_transaction(raw: &[u8]) -> Result<DecodedTransaction, SignerError> {
    let rlp = Rlp::new(raw);
    if !rlp.is_list() {
        return Err(SignerError::Malformed("transaction must be an RLP list".into()));
    }
    let count = rlp.item_count().map_err(|e| rlp_error("item count", e))?;
    if count != 9 {
        return Err(SignerError::Malformed(format!(
            "legacy transaction must have 9 fields, got {count}"
        )));
    }

    let v: u64 = rlp.val_at(6).map_err(|e| rlp_error("v", e))?;
    let r = decode_word(&rlp, 7)?;
    let s = decode_word(&rlp, 8)?;

    let (chain_id, recovery) = match v {
        27 | 28 => (None, (v - 27) as i32),
        v if v >= 35 => (Some((v - 35) / 2), ((v - 35) % 2) as i32),
        other => {
            return Err(SignerError::InvalidSignature(format!("unexpected v value {other}")))
        }
    };

    let tx = LegacyTransaction {
        nonce: rlp.val_at(0).map_err(|e| rlp_error("nonce", e))?,
        gas_price: rlp.val_at(1).map_err(|e| rlp_error("gasPrice", e))?,
        gas_limit: rlp.val_at(2).map_err(|e| rlp_error("gas", e))?,
        to: decode_optional_address(&rlp, 3)?,
        value: rlp.val_at(4).map_err(|e| rlp_error("value", e))?,
        data: rlp.val_at(5).map_err(|e| rlp_error("data", e))?,
        chain_id: chain_id.unwrap_or_default(),
    };

    let digest = match chain_id {
        Some(_) => keccak256(&tx.signing_payload()),
        None => {
            let mut stream = RlpStream::new_list(6);
            tx.append_fields(&mut stream);
            keccak256(&stream.out())
        }
    };

    let sender = recover_signer(digest, &r, &s, recovery)?;
    Ok(DecodedTransaction {
        hash: TxHash::from(keccak256(raw)),
        sender,
        chain_id,
        tx,
    })
}

fn recover_signer(
    digest: [u8; 32],
    r: &[u8; 32],
    s: &[u8; 32],
    recovery: i32,
) -> Result<Address, SignerError> {
    if *r == [0u8; 32] || *s == [0u8; 32] {
        return Err(SignerError::InvalidSignature("r or s is zero".into()));
    }
    if *s > HALF_ORDER {
        return Err(SignerError::InvalidSignature("s value too high".into()));
    }

    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(r);
    compact[32..].copy_from_slice(s);

    let recovery_id = RecoveryId::from_i32(recovery)
        .map_err(|_| SignerError::InvalidSignature("bad recovery id".into()))?;
    let signature = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;

    let secp = Secp256k1::verification_only();
    let public = secp
        .recover_ecdsa(&Message::from_digest(digest), &signature)
        .map_err(|e| SignerError::InvalidSignature(e.to_string()))?;
    Ok(public_key_address(&public))
}

/// Last 20 bytes of keccak256 over the uncompressed key without its prefix.
fn public_key_address(public: &PublicKey) -> Address {
    let uncompressed = public.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash[12..])
}

fn decode_word(rlp: &Rlp, index: usize) -> Result<[u8; 32], SignerError> {
    let bytes: Vec<u8> = rlp
        .val_at(index)
        .map_err(|e| rlp_error(&format!("field {index}"), e))?;
    if bytes.len() > 32 {
        return Err(SignerError::Malformed(format!(
            "field {index} too large: {} bytes",
            bytes.len()
        )));
    }
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(word)
}

fn decode_optional_address(rlp: &Rlp, index: usize) -> Result<Option<Address>, SignerError> {
    let bytes: Vec<u8> = rlp
        .val_at(index)
        .map_err(|e| rlp_error(&format!("field {index}"), e))?;
    match bytes.len() {
        0 => Ok(None),
        20 => Ok(Some(Address::from_slice(&bytes))),
        n => Err(SignerError::Malformed(format!(
            "invalid address length at field {index}: {n} bytes"
        ))),
    }
}

fn rlp_error(field: &str, e: DecoderError) -> SignerError {
    SignerError::Malformed(format!("RLP decode error for {field}: {e:?}"))
}
