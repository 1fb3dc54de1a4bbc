//! # Addresses and Hashes
//!
//! Ethereum-style identifiers as they enter the engine: `0x` plus a fixed
//! number of hex characters. Validation is purely syntactic. Whether an
//! address is a contract, or whether a signature recovers to the claimed
//! signer, is somebody else's problem.
//!
//! ## Normalization
//!
//! [`Address`] and [`TxHash`] wrap the `alloy-primitives` byte types, so two
//! inputs that differ only in casing compare equal, hash equal and serialize
//! equal. They render as lowercase hex. Mixed-case EIP-55 output is produced
//! on demand by [`Address::to_checksum`] for presentation; it is never
//! stored.

use std::fmt;

use alloy_primitives::{self as primitives, B256};
use serde::{Deserialize, Serialize};

use crate::config::{ADDRESS_HEX_LENGTH, SIGNATURE_HEX_LENGTH, TX_HASH_HEX_LENGTH};
use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Format checks
// ---------------------------------------------------------------------------

fn is_prefixed_hex(value: &str, hex_len: usize) -> bool {
    match value.strip_prefix("0x") {
        Some(body) => body.len() == hex_len && body.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// `true` iff `value` is `0x` followed by exactly 40 hex characters.
/// Any casing is accepted.
pub fn is_valid_address(value: &str) -> bool {
    is_prefixed_hex(value, ADDRESS_HEX_LENGTH)
}

/// `true` iff `value` is `0x` followed by exactly 64 hex characters.
pub fn is_valid_tx_hash(value: &str) -> bool {
    is_prefixed_hex(value, TX_HASH_HEX_LENGTH)
}

/// `true` iff `value` is `0x` followed by exactly 130 hex characters,
/// i.e. a 65-byte `r || s || v` signature.
pub fn is_valid_signature(value: &str) -> bool {
    is_prefixed_hex(value, SIGNATURE_HEX_LENGTH)
}

/// Lowercases an identifier for storage and comparison.
pub fn normalize(value: &str) -> String {
    value.to_ascii_lowercase()
}

/// Validates and normalizes a signature, naming `signer` on failure.
pub fn parse_signature(signer: &Address, value: &str) -> EngineResult<String> {
    if !is_valid_signature(value) {
        return Err(EngineError::InvalidSignatureFormat {
            signer: signer.to_string(),
        });
    }
    Ok(normalize(value))
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A validated 20-byte address. Displays and serializes as lowercase
/// `0x…` hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(primitives::Address);

impl Address {
    /// Validates `value` and returns its normalized form. `field` names the
    /// input in the error so the caller can point at it.
    pub fn parse(field: &str, value: &str) -> EngineResult<Self> {
        let invalid = || EngineError::InvalidAddressFormat {
            field: field.to_string(),
            value: value.to_string(),
        };
        if !is_valid_address(value) {
            return Err(invalid());
        }
        value.parse::<primitives::Address>().map(Self).map_err(|_| invalid())
    }

    /// Builds an address from its raw 20 bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(primitives::Address::from(bytes))
    }

    /// The linked-list sentinel `0x…01`.
    pub fn sentinel() -> Self {
        Self(primitives::Address::with_last_byte(1))
    }

    /// The zero address.
    pub fn zero() -> Self {
        Self(primitives::Address::ZERO)
    }

    /// `true` for the linked-list sentinel.
    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }

    /// `true` for the zero address.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Addresses the Safe contract refuses as owners or modules.
    pub fn is_reserved(&self) -> bool {
        self.is_zero() || self.is_sentinel()
    }

    /// The underlying primitive, for ABI and EIP-712 encoding.
    pub fn to_primitive(&self) -> primitives::Address {
        self.0
    }

    /// The raw 20 bytes.
    pub fn to_bytes(&self) -> [u8; 20] {
        self.0 .0 .0
    }

    /// EIP-55 mixed-case checksum encoding.
    pub fn to_checksum(&self) -> String {
        self.0.to_checksum(None)
    }
}

impl From<primitives::Address> for Address {
    fn from(address: primitives::Address) -> Self {
        Self(address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_slice()))
    }
}

impl TryFrom<String> for Address {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse("address", &value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

// ---------------------------------------------------------------------------
// TxHash
// ---------------------------------------------------------------------------

/// A validated 32-byte transaction hash. Displays and serializes as
/// lowercase `0x…` hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(B256);

impl TxHash {
    /// Validates `value` and returns its normalized form.
    pub fn parse(field: &str, value: &str) -> EngineResult<Self> {
        let invalid = || EngineError::InvalidHashFormat {
            field: field.to_string(),
            value: value.to_string(),
        };
        if !is_valid_tx_hash(value) {
            return Err(invalid());
        }
        value.parse::<B256>().map(Self).map_err(|_| invalid())
    }
}

impl From<B256> for TxHash {
    fn from(hash: B256) -> Self {
        Self(hash)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0.as_slice()))
    }
}

impl TryFrom<String> for TxHash {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse("hash", &value)
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.to_string()
    }
}
