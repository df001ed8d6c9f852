//! Basic ledger types

use crate::error::CoreResult;
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Gas amount type
pub type Gas = u64;

/// Nonce type for accounts and token instances
pub type Nonce = u64;

/// Length of the transaction hash handed to the VM
pub const TX_HASH_LENGTH: usize = 32;

/// Account address.
///
/// Addresses are opaque byte strings of any length. Ordering is
/// lexicographic over the raw bytes, which is what dumps sort by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address(Vec<u8>);

impl Address {
    /// Create a new address from raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get the underlying bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the address, returning its bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Whether the address has no bytes at all
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Create from hex string
    pub fn from_hex(hex: &str) -> CoreResult<Self> {
        Ok(Self(hex::decode(hex.trim_start_matches("0x"))?))
    }

    /// Build a 32-byte address from a readable name, right-padded with `_`.
    ///
    /// Mirrors the `address:name` shorthand that scenario files use, which
    /// keeps test fixtures legible.
    pub fn from_name(name: &str) -> Self {
        let mut bytes = name.as_bytes().to_vec();
        bytes.resize(TX_HASH_LENGTH, b'_');
        bytes.truncate(TX_HASH_LENGTH);
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<Vec<u8>> for Address {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Address {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// 32-byte transaction hash handed to the VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash([u8; TX_HASH_LENGTH]);

impl TxHash {
    /// Derive the hash from a transaction identifier.
    ///
    /// The identifier bytes are truncated to 32 bytes, or right-padded with
    /// `.` when shorter. No hashing happens, so ids stay readable in traces.
    pub fn from_tx_id(tx_id: &str) -> Self {
        let mut bytes = [b'.'; TX_HASH_LENGTH];
        let id = tx_id.as_bytes();
        let len = id.len().min(TX_HASH_LENGTH);
        bytes[..len].copy_from_slice(&id[..len]);
        Self(bytes)
    }

    /// Get the underlying byte array
    pub fn as_bytes(&self) -> &[u8; TX_HASH_LENGTH] {
        &self.0
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl AsRef<[u8]> for TxHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A field that distinguishes "not given", "given as the default" and
/// "given with a value".
///
/// Serialization boundaries care about the difference (a nonce written as
/// `0` is not the same as a missing nonce), so it is kept explicit instead
/// of being inferred from an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Specified<T> {
    /// The field was not present at all
    Unspecified,
    /// The field was present but left at its default
    Default,
    /// The field was present with an explicit value
    Explicit(T),
}

impl<T> Specified<T> {
    /// Whether the field was present in any form
    pub fn is_specified(&self) -> bool {
        !matches!(self, Specified::Unspecified)
    }

    /// The explicit value, if any
    pub fn explicit(&self) -> Option<&T> {
        match self {
            Specified::Explicit(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: Clone + Default> Specified<T> {
    /// Resolve to a concrete value, falling back to `T::default()`
    pub fn value(&self) -> T {
        self.explicit().cloned().unwrap_or_default()
    }
}

impl<T> Default for Specified<T> {
    fn default() -> Self {
        Specified::Unspecified
    }
}

impl<T> From<T> for Specified<T> {
    fn from(value: T) -> Self {
        Specified::Explicit(value)
    }
}

/// Minimal big-endian encoding of an unsigned integer; zero encodes as an
/// empty byte string.
pub fn biguint_to_bytes(value: &BigUint) -> Vec<u8> {
    if value.is_zero() {
        Vec::new()
    } else {
        value.to_bytes_be()
    }
}

/// Decode a big-endian unsigned integer; the empty string decodes as zero.
pub fn biguint_from_bytes(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Minimal big-endian encoding of a `u64`; zero encodes as an empty string.
pub fn u64_to_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first..].to_vec()
}

/// Decode a big-endian `u64`, keeping the low 64 bits of longer inputs.
pub fn u64_from_bytes(bytes: &[u8]) -> u64 {
    let start = bytes.len().saturating_sub(8);
    bytes[start..]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Convert an unsigned balance to a signed delta
pub fn to_signed(value: &BigUint) -> BigInt {
    BigInt::from_biguint(Sign::Plus, value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_hex() {
        let addr = Address::from_hex("0x1234abcd").unwrap();
        assert_eq!(addr.as_bytes(), &[0x12, 0x34, 0xab, 0xcd]);
        assert_eq!(addr.to_string(), "0x1234abcd");

        let err = Address::from_hex("0xzz").unwrap_err();
        assert!(matches!(err, crate::CoreError::HexDecode(_)));
        assert_eq!(err.clone(), err);
    }

    #[test]
    fn test_address_from_name() {
        let addr = Address::from_name("alice");
        assert_eq!(addr.as_bytes().len(), 32);
        assert!(addr.as_bytes().starts_with(b"alice___"));
    }

    #[test]
    fn test_address_ordering() {
        let a = Address::new(vec![1, 2]);
        let b = Address::new(vec![1, 2, 0]);
        let c = Address::new(vec![2]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_tx_hash_padding() {
        let hash = TxHash::from_tx_id("tx-1");
        assert_eq!(&hash.as_bytes()[..4], b"tx-1");
        assert!(hash.as_bytes()[4..].iter().all(|b| *b == b'.'));
    }

    #[test]
    fn test_tx_hash_truncation() {
        let id = "a".repeat(40);
        let hash = TxHash::from_tx_id(&id);
        assert_eq!(hash.as_bytes(), &[b'a'; 32]);
    }

    #[test]
    fn test_minimal_big_endian() {
        assert!(u64_to_bytes(0).is_empty());
        assert_eq!(u64_to_bytes(1), vec![1]);
        assert_eq!(u64_to_bytes(0x0100), vec![1, 0]);
        assert_eq!(u64_from_bytes(&[1, 0]), 0x0100);
        assert_eq!(u64_from_bytes(&[]), 0);

        assert!(biguint_to_bytes(&BigUint::from(0u32)).is_empty());
        assert_eq!(biguint_to_bytes(&BigUint::from(256u32)), vec![1, 0]);
        assert_eq!(biguint_from_bytes(&[]), BigUint::from(0u32));
    }

    #[test]
    fn test_specified() {
        let unspecified: Specified<u64> = Specified::Unspecified;
        assert!(!unspecified.is_specified());
        assert_eq!(unspecified.value(), 0);

        let default: Specified<u64> = Specified::Default;
        assert!(default.is_specified());
        assert_eq!(default.value(), 0);

        let explicit = Specified::Explicit(7u64);
        assert_eq!(explicit.explicit(), Some(&7));
        assert_eq!(explicit.value(), 7);
    }
}
