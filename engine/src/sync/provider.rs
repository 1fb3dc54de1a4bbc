//! Read-only view of on-chain Safe state.
//!
//! The engine never talks to a node itself. Whoever embeds it supplies a
//! [`ChainStateProvider`], typically an RPC client; tests supply fixtures.
//! Retries, if any, belong to the provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::codec::abi::WeiAmount;
use crate::codec::address::Address;

/// What the chain reports about a Safe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeInfo {
    /// Safe address.
    pub address: Address,
    /// Native balance in wei.
    pub balance: WeiAmount,
    /// On-chain threshold.
    pub threshold: u32,
    /// Owners in the contract's list order.
    pub owners: Vec<Address>,
    /// On-chain nonce: the next nonce the contract will execute.
    pub nonce: u64,
    /// Contract version, when the provider knows it.
    pub version: Option<String>,
}

/// Provider failures. Every variant is treated as "inaccessible" by the
/// coordinator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The RPC endpoint could not be reached.
    #[error("provider unreachable: {0}")]
    Unreachable(String),

    /// No Safe contract lives at the address.
    #[error("no Safe contract at {0}")]
    NotASafe(Address),

    /// The provider does not serve the requested chain.
    #[error("chain {0} is not supported by this provider")]
    UnsupportedNetwork(u64),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Source of on-chain Safe state.
#[async_trait]
pub trait ChainStateProvider: Send + Sync {
    /// Reads balance, owners, threshold and nonce of the Safe at `address`
    /// on chain `network`.
    async fn get_safe_info(&self, network: u64, address: &Address) -> Result<SafeInfo, ProviderError>;
}
