//! Address and transaction hash primitives.
//!
//! Addresses leave the gateway in EIP-55 mixed-case form. Incoming addresses
//! are accepted in all-lowercase, all-uppercase or correctly checksummed form.

use super::types::{Address, TxHash};
use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Rejection reasons for address and hash strings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("missing 0x prefix")]
    MissingPrefix,
    #[error("expected {expected} hex characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("invalid hex character")]
    InvalidHex,
    #[error("checksum mismatch")]
    BadChecksum,
}

/// Keccak-256 of arbitrary bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// EIP-55 checksummed representation of an address.
pub fn to_checksum(address: &Address) -> String {
    let lower = hex::encode(address.as_bytes());
    let hash = keccak256(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0f
        };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse a `0x`-prefixed 20-byte address.
///
/// Mixed-case input must carry a valid EIP-55 checksum.
pub fn parse_address(input: &str) -> Result<Address, AddressError> {
    let body = strip_prefix(input.trim())?;
    let bytes = decode_fixed::<20>(body)?;
    let address = Address::from(bytes);

    let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper && to_checksum(&address)[2..] != *body {
        return Err(AddressError::BadChecksum);
    }
    Ok(address)
}

/// Parse a `0x`-prefixed 32-byte transaction hash.
pub fn parse_tx_hash(input: &str) -> Result<TxHash, AddressError> {
    let body = strip_prefix(input.trim())?;
    decode_fixed::<32>(body).map(TxHash::from)
}

/// Lowercase `0x` hex of a transaction hash.
pub fn format_hash(hash: &TxHash) -> String {
    format!("0x{}", hex::encode(hash.as_bytes()))
}

fn strip_prefix(input: &str) -> Result<&str, AddressError> {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .ok_or(AddressError::MissingPrefix)
}

fn decode_fixed<const N: usize>(body: &str) -> Result<[u8; N], AddressError> {
    if body.len() != N * 2 {
        return Err(AddressError::WrongLength {
            expected: N * 2,
            actual: body.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(body, &mut out).map_err(|_| AddressError::InvalidHex)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VECTORS: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn test_checksum_vectors() {
        for expected in VECTORS {
            let address = parse_address(&expected.to_lowercase()).unwrap();
            assert_eq!(to_checksum(&address), expected);
        }
    }

    #[test]
    fn test_parse_accepts_uniform_case() {
        let lower = parse_address(&VECTORS[0].to_lowercase()).unwrap();
        let upper = parse_address(&format!("0x{}", VECTORS[0][2..].to_uppercase())).unwrap();
        let mixed = parse_address(VECTORS[0]).unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower, mixed);
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        // Flip the case of one letter
        let broken = VECTORS[0].replacen('a', "A", 1);
        assert_eq!(parse_address(&broken), Err(AddressError::BadChecksum));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!(
            parse_address("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"),
            Err(AddressError::MissingPrefix)
        );
        assert_eq!(
            parse_address("0x1234"),
            Err(AddressError::WrongLength { expected: 40, actual: 4 })
        );
        assert_eq!(
            parse_address("0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed"),
            Err(AddressError::InvalidHex)
        );
    }

    #[test]
    fn test_parse_tx_hash() {
        let text = format!("0x{}", "ab".repeat(32));
        let hash = parse_tx_hash(&text).unwrap();
        assert_eq!(format_hash(&hash), text);
        assert!(parse_tx_hash("0xabc").is_err());
        assert!(parse_tx_hash(&"ab".repeat(32)).is_err());
    }

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
