//! # Engine Configuration & Constants
//!
//! Every magic number the engine relies on lives here: the sentinel owner,
//! encoding lengths, the EIP-712 type strings the Safe contract hashes, and
//! the chain ids we know by name. Anything tunable per deployment lives in
//! [`EngineConfig`], which is plain serde so it can be loaded from a JSON file.
//!
//! The on-chain values are not ours to choose. If the Safe contract changes
//! one of them, the engine stops agreeing with the chain, so they are pinned
//! by tests below.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::safe::configuration::ThresholdPolicy;

// ---------------------------------------------------------------------------
// Owner List
// ---------------------------------------------------------------------------

/// Head marker of the Safe owner and module linked lists. `prevOwner` for the
/// first owner in the list is always this value.
pub const SENTINEL_ADDRESS: &str = "0x0000000000000000000000000000000000000001";

/// The zero address. Never a valid owner; as a fallback handler it means
/// "no handler".
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

// ---------------------------------------------------------------------------
// Encoding Lengths
// ---------------------------------------------------------------------------

/// Hex characters in an address after the `0x` prefix (20 bytes).
pub const ADDRESS_HEX_LENGTH: usize = 40;

/// Hex characters in a transaction hash after the `0x` prefix (32 bytes).
pub const TX_HASH_HEX_LENGTH: usize = 64;

/// Hex characters in an `r || s || v` signature after the `0x` prefix.
pub const SIGNATURE_HEX_LENGTH: usize = 130;

/// Raw signature length: 32 bytes r, 32 bytes s, 1 byte v.
pub const SIGNATURE_LENGTH: usize = 65;

/// ABI function selector length.
pub const SELECTOR_LENGTH: usize = 4;

/// ABI word length. Every argument of the Safe management calls is static
/// and occupies exactly one word.
pub const ABI_WORD_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// EIP-712
// ---------------------------------------------------------------------------

/// Domain type hashed into the Safe's domain separator (contracts >= 1.3.0).
pub const DOMAIN_SEPARATOR_TYPE: &str = "EIP712Domain(uint256 chainId,address verifyingContract)";

/// Struct type of a Safe transaction as hashed by `getTransactionHash`.
pub const SAFE_TX_TYPE: &str = "SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)";

// ---------------------------------------------------------------------------
// Networks
// ---------------------------------------------------------------------------

/// Ethereum mainnet.
pub const CHAIN_ID_MAINNET: u64 = 1;

/// Sepolia testnet.
pub const CHAIN_ID_SEPOLIA: u64 = 11_155_111;

/// Gnosis chain.
pub const CHAIN_ID_GNOSIS: u64 = 100;

/// Base mainnet.
pub const CHAIN_ID_BASE: u64 = 8453;

/// Returns a friendly name for a chain id, mainly for logging.
pub fn network_name(chain_id: u64) -> String {
    match chain_id {
        CHAIN_ID_MAINNET => "mainnet".to_string(),
        CHAIN_ID_SEPOLIA => "sepolia".to_string(),
        CHAIN_ID_GNOSIS => "gnosis".to_string(),
        CHAIN_ID_BASE => "base".to_string(),
        other => format!("chain-{}", other),
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Safe contract version recorded for new treasuries when none is given.
pub const DEFAULT_SAFE_VERSION: &str = "1.4.1";

/// How long an accessibility check waits on the chain-state provider.
pub const DEFAULT_ACCESSIBILITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum free-text description length on a proposed transaction, in bytes.
pub const DEFAULT_MAX_DESCRIPTION_LENGTH: usize = 1024;

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Deployment-level tunables.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Milliseconds to wait for the chain-state provider before reporting a
    /// treasury as inaccessible.
    pub accessibility_timeout_ms: u64,

    /// Policy applied to treasuries created without an explicit one.
    pub default_threshold_policy: ThresholdPolicy,

    /// Maximum description length accepted by proposals.
    pub max_description_length: usize,

    /// Contract version recorded on new treasuries.
    pub default_safe_version: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            accessibility_timeout_ms: DEFAULT_ACCESSIBILITY_TIMEOUT.as_millis() as u64,
            default_threshold_policy: ThresholdPolicy::Strict,
            max_description_length: DEFAULT_MAX_DESCRIPTION_LENGTH,
            default_safe_version: DEFAULT_SAFE_VERSION.to_string(),
        }
    }
}

impl EngineConfig {
    /// Parses a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The provider timeout as a [`Duration`].
    pub fn accessibility_timeout(&self) -> Duration {
        Duration::from_millis(self.accessibility_timeout_ms)
    }
}
