//! Core type definitions for treasury transactions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::abi::WeiAmount;
use crate::codec::address::{Address, TxHash};
use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// How the Safe invokes the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Regular `CALL`.
    #[default]
    Call,
    /// `DELEGATECALL`: the target's code runs in the Safe's context.
    DelegateCall,
}

impl Operation {
    /// The `uint8` value used in the `SafeTx` struct.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Call => 0,
            Self::DelegateCall => 1,
        }
    }

    /// Parses the `uint8` encoding.
    pub fn from_u8(value: u8) -> EngineResult<Self> {
        match value {
            0 => Ok(Self::Call),
            1 => Ok(Self::DelegateCall),
            other => Err(EngineError::invalid_value(
                "operation",
                &other.to_string(),
                "must be 0 (call) or 1 (delegatecall)",
            )),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::DelegateCall => write!(f, "delegatecall"),
        }
    }
}

// ---------------------------------------------------------------------------
// TransactionStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a transaction.
///
/// ```text
///   draft ──submit──▶ pending ──mark_executed──▶ executed
///                       ├──────mark_failed────▶ failed
///                       └──────cancel─────────▶ cancelled
/// ```
///
/// Only pending transactions can be cancelled. Nothing leaves `executed`,
/// `failed` or `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created, nonce reserved, not yet open for signatures.
    Draft,
    /// Collecting signatures.
    Pending,
    /// Confirmed on-chain.
    Executed,
    /// Execution was reported as failed.
    Failed,
    /// Withdrawn before execution.
    Cancelled,
}

impl TransactionStatus {
    /// `true` for the terminal states.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Executed | Self::Failed | Self::Cancelled)
    }

    /// Whether a transaction in this state still holds up later nonces.
    /// Executed ones consumed their nonce and cancelled ones are skipped.
    /// A failed execution leaves its nonce unused on-chain, so it keeps
    /// blocking until it is replaced.
    pub fn blocks_later_nonces(self) -> bool {
        matches!(self, Self::Draft | Self::Pending | Self::Failed)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Pending => write!(f, "pending"),
            Self::Executed => write!(f, "executed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ---------------------------------------------------------------------------
// SignatureRecord
// ---------------------------------------------------------------------------

/// One signer's approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    /// Signer address.
    pub signer: Address,
    /// `0x`-prefixed 65-byte `r || s || v`, lowercase.
    pub signature: String,
    /// When it was recorded.
    pub signed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A Safe transaction tracked by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique id.
    pub id: Uuid,
    /// Owning treasury.
    pub treasury_id: Uuid,
    /// Safe nonce, assigned once at creation.
    pub nonce: u64,
    /// Destination.
    pub to: Address,
    /// Amount in wei.
    pub value: WeiAmount,
    /// Call data, `0x` when empty.
    pub data: String,
    /// Call or delegatecall.
    pub operation: Operation,
    /// Lifecycle state.
    pub status: TransactionStatus,
    /// Approvals in the order they arrived.
    pub signatures: Vec<SignatureRecord>,
    /// Account that proposed it.
    pub created_by: String,
    /// Free text.
    pub description: String,
    /// EIP-712 hash the signers sign.
    pub safe_tx_hash: TxHash,
    /// On-chain execution hash, set only when executed.
    pub execution_hash: Option<TxHash>,
    /// Set only when executed.
    pub executed_at: Option<DateTime<Utc>>,
    /// Reason given by `mark_failed`.
    pub failure_reason: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Whether `signer` already approved.
    pub fn has_signed(&self, signer: &Address) -> bool {
        self.signatures.iter().any(|s| &s.signer == signer)
    }

    /// Number of approvals recorded.
    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// `true` when the call data is empty.
    pub fn is_plain_transfer(&self) -> bool {
        self.data == "0x"
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_encoding() {
        assert_eq!(Operation::Call.as_u8(), 0);
        assert_eq!(Operation::DelegateCall.as_u8(), 1);
        assert_eq!(Operation::from_u8(1).unwrap(), Operation::DelegateCall);
        assert!(Operation::from_u8(2).is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!TransactionStatus::Draft.is_final());
        assert!(!TransactionStatus::Pending.is_final());
        assert!(TransactionStatus::Executed.is_final());
        assert!(TransactionStatus::Failed.is_final());
        assert!(TransactionStatus::Cancelled.is_final());
    }

    #[test]
    fn only_executed_and_cancelled_release_ordering() {
        assert!(TransactionStatus::Draft.blocks_later_nonces());
        assert!(TransactionStatus::Pending.blocks_later_nonces());
        assert!(TransactionStatus::Failed.blocks_later_nonces());
        assert!(!TransactionStatus::Executed.blocks_later_nonces());
        assert!(!TransactionStatus::Cancelled.blocks_later_nonces());
    }

    #[test]
    fn status_display_is_lowercase() {
        assert_eq!(TransactionStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(Operation::DelegateCall.to_string(), "delegatecall");
    }
}
