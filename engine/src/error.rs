//! Error types for the Safe treasury engine.
//!
//! Every fallible engine operation returns an [`EngineError`]. Variants carry
//! the field name and offending value wherever one exists, so the caller can
//! render a precise message instead of a generic "something went wrong".
//! [`EngineError::kind`] folds the variants into the coarse taxonomy callers
//! branch on (reject as caller error, report as conflict, degrade on provider
//! failure, ...).

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::safe::configuration::ConfigViolation;
use crate::safe::treasury::TreasuryStatus;
use crate::transaction::types::TransactionStatus;

/// Convenience alias used across the crate.
pub type EngineResult<T> = Result<T, EngineError>;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Malformed address, hash, signature, value or call data. Always the
    /// caller's fault, never worth retrying.
    Validation,
    /// The operation would break a threshold, signer-count or nonce
    /// invariant. Rejected without partial application.
    InvariantViolation,
    /// The target is in the wrong lifecycle state for the operation.
    StateConflict,
    /// The acting address is not allowed to perform the operation.
    NotAuthorizedSigner,
    /// The chain-state provider failed or timed out.
    ExternalProviderFailure,
    /// Unknown treasury or transaction id.
    NotFound,
    /// The backing store failed.
    Storage,
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// An address is not `0x` followed by exactly 40 hex characters.
    #[error("invalid address in `{field}`: {value:?} is not 0x followed by 40 hex characters")]
    InvalidAddressFormat {
        /// Name of the offending field.
        field: String,
        /// The rejected input.
        value: String,
    },

    /// A transaction hash is not `0x` followed by exactly 64 hex characters.
    #[error("invalid transaction hash in `{field}`: {value:?} is not 0x followed by 64 hex characters")]
    InvalidHashFormat {
        /// Name of the offending field.
        field: String,
        /// The rejected input.
        value: String,
    },

    /// A signature is not a 65-byte `r || s || v` encoding.
    #[error("invalid signature from {signer}: expected 0x followed by 130 hex characters (r || s || v)")]
    InvalidSignatureFormat {
        /// The signer the signature was submitted for.
        signer: String,
    },

    /// A scalar input (wei value, hex payload, description, salt) is malformed.
    #[error("invalid value in `{field}`: {value:?} {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: String,
        /// The rejected input.
        value: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The address is not part of the signer set.
    #[error("{address} is not a signer of this treasury")]
    SignerNotFound {
        /// The address that was looked up.
        address: String,
    },

    /// The address is already part of the signer set.
    #[error("{address} is already a signer of this treasury")]
    DuplicateOwner {
        /// The duplicated address.
        address: String,
    },

    /// The zero address and the sentinel can never be owners.
    #[error("{address} is reserved and cannot be a signer")]
    ReservedAddress {
        /// The reserved address.
        address: String,
    },

    /// The operation would leave the treasury without signers.
    #[error("a treasury needs at least one signer; refusing to remove the last one")]
    SignersEmpty,

    /// Threshold outside `[1, signers]`.
    #[error("{}", threshold_message(*threshold, *signers))]
    ThresholdOutOfRange {
        /// The requested threshold.
        threshold: u64,
        /// Signer count the threshold was checked against.
        signers: usize,
    },

    /// Bulk configuration validation found one or more violations.
    #[error("configuration is invalid: {}", join_violations(violations))]
    InvalidConfiguration {
        /// Every violation found.
        violations: Vec<ConfigViolation>,
    },

    /// The transaction is not in a state that allows the requested change:
    /// executed, cancelled or failed ones are immutable, and drafts cannot
    /// be cancelled.
    #[error("transaction is {status} and cannot be changed this way")]
    TransactionFinalized {
        /// Its final status.
        status: TransactionStatus,
    },

    /// The transaction is not collecting signatures.
    #[error("transaction is {status}; signatures are only accepted while pending")]
    NotPending {
        /// Its current status.
        status: TransactionStatus,
    },

    /// The requested status change is not part of the transaction lifecycle.
    #[error("invalid transaction transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: TransactionStatus,
        /// Requested status.
        to: TransactionStatus,
    },

    /// Signature submitted by an address outside the signer set.
    #[error("{signer} is not a signer of this treasury and cannot sign")]
    NotASigner {
        /// The rejected signer.
        signer: String,
    },

    /// The signer already has a signature on this transaction.
    #[error("{signer} has already signed this transaction")]
    DuplicateSignature {
        /// The repeated signer.
        signer: String,
    },

    /// Only the creator or the treasury owner may cancel a transaction.
    #[error("{actor} may not cancel this transaction; only its creator or the treasury owner can")]
    NotAuthorizedToCancel {
        /// The account that attempted the cancellation.
        actor: String,
    },

    /// The transaction has already been executed.
    #[error("transaction with nonce {nonce} has already been executed")]
    AlreadyExecuted {
        /// Its nonce.
        nonce: u64,
    },

    /// The transaction was cancelled.
    #[error("transaction with nonce {nonce} was cancelled")]
    Cancelled {
        /// Its nonce.
        nonce: u64,
    },

    /// The treasury lifecycle does not allow the requested transition.
    #[error("invalid treasury transition: {from} -> {to}")]
    InvalidTreasuryTransition {
        /// Current status.
        from: TreasuryStatus,
        /// Requested status.
        to: TreasuryStatus,
    },

    /// The treasury is not in the state the operation requires.
    #[error("treasury is {status}: {reason}")]
    TreasuryState {
        /// Its current status.
        status: TreasuryStatus,
        /// Why the operation is refused.
        reason: String,
    },

    /// Call data carries a known selector but cannot be decoded.
    #[error("malformed call data: {reason}")]
    MalformedCallData {
        /// What is wrong with the payload.
        reason: String,
    },

    /// The chain-state provider reported an error.
    #[error("chain-state provider failed: {reason}")]
    ProviderFailure {
        /// The provider's error message.
        reason: String,
    },

    /// The chain-state provider did not answer in time.
    #[error("chain-state provider timed out after {timeout_ms}ms")]
    ProviderTimeout {
        /// The configured timeout.
        timeout_ms: u64,
    },

    /// Unknown treasury id.
    #[error("treasury {0} not found")]
    TreasuryNotFound(Uuid),

    /// Unknown transaction id.
    #[error("transaction {0} not found")]
    TransactionNotFound(Uuid),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Classifies the error into the engine's failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAddressFormat { .. }
            | Self::InvalidHashFormat { .. }
            | Self::InvalidSignatureFormat { .. }
            | Self::InvalidValue { .. }
            | Self::MalformedCallData { .. } => ErrorKind::Validation,

            Self::SignerNotFound { .. }
            | Self::DuplicateOwner { .. }
            | Self::ReservedAddress { .. }
            | Self::SignersEmpty
            | Self::ThresholdOutOfRange { .. }
            | Self::InvalidConfiguration { .. } => ErrorKind::InvariantViolation,

            Self::TransactionFinalized { .. }
            | Self::NotPending { .. }
            | Self::InvalidTransition { .. }
            | Self::DuplicateSignature { .. }
            | Self::AlreadyExecuted { .. }
            | Self::Cancelled { .. }
            | Self::InvalidTreasuryTransition { .. }
            | Self::TreasuryState { .. } => ErrorKind::StateConflict,

            Self::NotASigner { .. } | Self::NotAuthorizedToCancel { .. } => {
                ErrorKind::NotAuthorizedSigner
            }

            Self::ProviderFailure { .. } | Self::ProviderTimeout { .. } => {
                ErrorKind::ExternalProviderFailure
            }

            Self::TreasuryNotFound(_) | Self::TransactionNotFound(_) => ErrorKind::NotFound,

            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    pub(crate) fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCallData {
            reason: reason.into(),
        }
    }

    pub(crate) fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }
}

fn threshold_message(threshold: u64, signers: usize) -> String {
    if threshold == 0 {
        "threshold must be at least 1".to_string()
    } else {
        format!(
            "threshold {} cannot exceed number of signers ({})",
            threshold, signers
        )
    }
}

fn join_violations(violations: &[ConfigViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_messages_name_the_limit() {
        let over = EngineError::ThresholdOutOfRange {
            threshold: 4,
            signers: 3,
        };
        assert_eq!(
            over.to_string(),
            "threshold 4 cannot exceed number of signers (3)"
        );

        let zero = EngineError::ThresholdOutOfRange {
            threshold: 0,
            signers: 3,
        };
        assert_eq!(zero.to_string(), "threshold must be at least 1");
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            EngineError::InvalidSignatureFormat {
                signer: "0xabc".into()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(EngineError::SignersEmpty.kind(), ErrorKind::InvariantViolation);
        assert_eq!(
            EngineError::AlreadyExecuted { nonce: 0 }.kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(
            EngineError::NotASigner {
                signer: "0xabc".into()
            }
            .kind(),
            ErrorKind::NotAuthorizedSigner
        );
        assert_eq!(
            EngineError::ProviderTimeout { timeout_ms: 10 }.kind(),
            ErrorKind::ExternalProviderFailure
        );
        assert_eq!(
            EngineError::TreasuryNotFound(Uuid::nil()).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn invalid_value_message_includes_field_and_value() {
        let err = EngineError::invalid_value("value", "-1", "must be a non-negative base-10 integer");
        let msg = err.to_string();
        assert!(msg.contains("`value`"));
        assert!(msg.contains("\"-1\""));
    }
}
