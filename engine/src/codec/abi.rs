//! # Wei Amounts and Call Data
//!
//! Wei amounts are arbitrary-precision up to `uint256`. They are held as an
//! `alloy-primitives` [`U256`] and rendered as canonical decimal strings, so
//! floating point never gets near a balance.
//!
//! Call data stays a `0x`-prefixed lowercase hex string at rest. ABI
//! encoding and decoding of the calls we understand lives with the `sol!`
//! declarations in `safe::decoder` and `transaction::hash`.

use std::fmt;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Hex payloads
// ---------------------------------------------------------------------------

/// Validates a `0x`-prefixed hex payload and returns its canonical form.
///
/// Empty input (`""` or `"0x"`) becomes `"0x"`. Odd-length or non-hex
/// payloads are rejected. The result is lowercase.
pub fn parse_call_data(field: &str, value: &str) -> EngineResult<String> {
    if value.is_empty() || value == "0x" {
        return Ok("0x".to_string());
    }
    let body = value.strip_prefix("0x").ok_or_else(|| {
        EngineError::invalid_value(field, value, "must be 0x-prefixed hex")
    })?;
    if body.len() % 2 != 0 {
        return Err(EngineError::invalid_value(
            field,
            value,
            "has an odd number of hex characters",
        ));
    }
    if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(EngineError::invalid_value(
            field,
            value,
            "contains non-hex characters",
        ));
    }
    Ok(format!("0x{}", body.to_ascii_lowercase()))
}

/// Decodes canonical call data (as produced by [`parse_call_data`]) into bytes.
pub fn call_data_bytes(data: &str) -> EngineResult<Vec<u8>> {
    let body = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(body).map_err(|e| EngineError::malformed(e.to_string()))
}

// ---------------------------------------------------------------------------
// WeiAmount
// ---------------------------------------------------------------------------

/// A non-negative `uint256` amount in wei. Serializes as a canonical
/// decimal string (no sign, no leading zeros except for zero itself).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WeiAmount(U256);

impl WeiAmount {
    /// Parses a base-10 integer string. Signs, whitespace, decimal points,
    /// exponents and values above `2^256 - 1` are rejected.
    pub fn parse(field: &str, value: &str) -> EngineResult<Self> {
        if value.is_empty() {
            return Err(EngineError::invalid_value(field, value, "must not be empty"));
        }
        if !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EngineError::invalid_value(
                field,
                value,
                "must be a non-negative base-10 integer",
            ));
        }
        U256::from_str_radix(value, 10)
            .map(Self)
            .map_err(|_| EngineError::invalid_value(field, value, "exceeds the uint256 range"))
    }

    /// Zero wei.
    pub fn zero() -> Self {
        Self(U256::ZERO)
    }

    /// `true` when the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The amount as a `uint256`.
    pub fn to_u256(&self) -> U256 {
        self.0
    }
}

impl From<U256> for WeiAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl fmt::Display for WeiAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WeiAmount {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse("value", &value)
    }
}

impl From<WeiAmount> for String {
    fn from(amount: WeiAmount) -> Self {
        amount.to_string()
    }
}
