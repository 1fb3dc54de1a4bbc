//! # Treasury Aggregate
//!
//! Identity, owner, network and deployment status of one Safe. The
//! configuration (signers, threshold, modules) lives next to it in the
//! storage record; this type only tracks where the Safe is in its lifecycle.
//!
//! ```text
//!   pending ──begin_deployment──▶ deploying ──confirm_deployment──▶ active
//!      │                             │
//!      └──────mark_error─────────────┴──────▶ error ──begin_deployment──▶ deploying
//!
//!   import_existing ───────────────────────────────────────────────▶ active
//! ```
//!
//! The on-chain address and the deployment hash are written together in a
//! single [`Deployment`] value, and only on the transition to `active`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::codec::address::{Address, TxHash};
use crate::error::{EngineError, EngineResult};
use crate::safe::configuration::TreasuryConfiguration;

/// Lifecycle status of a treasury.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreasuryStatus {
    /// Requested, not yet deployed.
    Pending,
    /// Deployment transaction submitted.
    Deploying,
    /// Deployed and usable.
    Active,
    /// Deployment failed.
    Error,
}

impl fmt::Display for TreasuryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Deploying => "deploying",
            Self::Active => "active",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Where the Safe lives on-chain and how it got there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Safe contract address.
    pub address: Address,
    /// Deployment transaction. `None` for imported Safes.
    pub tx_hash: Option<TxHash>,
}

/// A multi-signature treasury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    /// Unique id.
    pub id: Uuid,
    /// Account that created or imported the treasury.
    pub owner: String,
    /// Chain id.
    pub network: u64,
    status: TreasuryStatus,
    deployment: Option<Deployment>,
    last_error: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl Treasury {
    /// A new, undeployed treasury.
    pub fn new(owner: impl Into<String>, network: u64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            network,
            status: TreasuryStatus::Pending,
            deployment: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Registers a Safe that was deployed outside the engine. The caller is
    /// expected to have verified the address against the chain first.
    pub fn import_existing(owner: impl Into<String>, network: u64, address: Address) -> Self {
        let mut treasury = Self::new(owner, network);
        treasury.status = TreasuryStatus::Active;
        treasury.deployment = Some(Deployment {
            address,
            tx_hash: None,
        });
        treasury
    }

    /// Current status.
    pub fn status(&self) -> TreasuryStatus {
        self.status
    }

    /// `true` once deployed or imported.
    pub fn is_active(&self) -> bool {
        self.status == TreasuryStatus::Active
    }

    /// Deployment details, set only while active.
    pub fn deployment(&self) -> Option<&Deployment> {
        self.deployment.as_ref()
    }

    /// Safe address, if deployed.
    pub fn address(&self) -> Option<&Address> {
        self.deployment.as_ref().map(|d| &d.address)
    }

    /// Reason recorded by the last [`mark_error`](Self::mark_error).
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the Safe address, or a `TreasuryState` error explaining why
    /// `action` needs a deployed treasury.
    pub fn require_active(&self, action: &str) -> EngineResult<&Address> {
        match (&self.status, &self.deployment) {
            (TreasuryStatus::Active, Some(deployment)) => Ok(&deployment.address),
            _ => Err(EngineError::TreasuryState {
                status: self.status,
                reason: format!("{} requires a deployed Safe address", action),
            }),
        }
    }

    /// `pending | error → deploying`.
    pub fn begin_deployment(&mut self) -> EngineResult<()> {
        match self.status {
            TreasuryStatus::Pending | TreasuryStatus::Error => {
                self.transition(TreasuryStatus::Deploying);
                self.last_error = None;
                Ok(())
            }
            from => Err(EngineError::InvalidTreasuryTransition {
                from,
                to: TreasuryStatus::Deploying,
            }),
        }
    }

    /// `deploying → active`. Both identifiers are validated, and the
    /// configuration must be free of violations, before anything is written.
    pub fn confirm_deployment(
        &mut self,
        configuration: &TreasuryConfiguration,
        address: &str,
        tx_hash: &str,
    ) -> EngineResult<()> {
        if self.status != TreasuryStatus::Deploying {
            return Err(EngineError::InvalidTreasuryTransition {
                from: self.status,
                to: TreasuryStatus::Active,
            });
        }
        let address = Address::parse("address", address)?;
        let tx_hash = TxHash::parse("tx_hash", tx_hash)?;
        let violations = configuration.validate();
        if !violations.is_empty() {
            return Err(EngineError::InvalidConfiguration { violations });
        }

        info!(treasury = %self.id, address = %address, tx_hash = %tx_hash, "treasury deployed");
        self.deployment = Some(Deployment {
            address,
            tx_hash: Some(tx_hash),
        });
        self.transition(TreasuryStatus::Active);
        Ok(())
    }

    /// `pending | deploying → error`.
    pub fn mark_error(&mut self, reason: impl Into<String>) -> EngineResult<()> {
        match self.status {
            TreasuryStatus::Pending | TreasuryStatus::Deploying => {
                self.last_error = Some(reason.into());
                self.transition(TreasuryStatus::Error);
                Ok(())
            }
            from => Err(EngineError::InvalidTreasuryTransition {
                from,
                to: TreasuryStatus::Error,
            }),
        }
    }

    fn transition(&mut self, to: TreasuryStatus) {
        info!(treasury = %self.id, from = %self.status, to = %to, "treasury status changed");
        self.status = to;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::safe::configuration::ConfigurationDraft;

    const SAFE: &str = "0x1111111111111111111111111111111111111111";

    fn configuration() -> TreasuryConfiguration {
        ConfigurationDraft::new(["0x00000000000000000000000000000000000000a1"], 1)
            .build(&EngineConfig::default())
            .unwrap()
    }

    fn tx_hash() -> String {
        format!("0x{}", "ab".repeat(32))
    }

    #[test]
    fn new_treasury_is_pending_without_address() {
        let treasury = Treasury::new("alice", 1);
        assert_eq!(treasury.status(), TreasuryStatus::Pending);
        assert!(treasury.address().is_none());
        assert!(treasury.require_active("proposing").is_err());
    }

    #[test]
    fn deployment_sets_address_and_hash_together() {
        let mut treasury = Treasury::new("alice", 1);
        treasury.begin_deployment().unwrap();

        let err = treasury
            .confirm_deployment(&configuration(), SAFE, "0x1234")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidHashFormat { .. }));
        assert!(treasury.deployment().is_none());
        assert_eq!(treasury.status(), TreasuryStatus::Deploying);

        treasury
            .confirm_deployment(&configuration(), SAFE, &tx_hash())
            .unwrap();
        let deployment = treasury.deployment().unwrap();
        assert_eq!(deployment.address.to_string(), SAFE);
        assert_eq!(deployment.tx_hash.as_ref().unwrap().to_string(), tx_hash());
        assert!(treasury.is_active());
    }

    #[test]
    fn confirm_requires_deploying() {
        let mut treasury = Treasury::new("alice", 1);
        let err = treasury
            .confirm_deployment(&configuration(), SAFE, &tx_hash())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidTreasuryTransition {
                from: TreasuryStatus::Pending,
                to: TreasuryStatus::Active,
            }
        );
    }

    #[test]
    fn error_then_retry() {
        let mut treasury = Treasury::new("alice", 1);
        treasury.begin_deployment().unwrap();
        treasury.mark_error("out of gas").unwrap();
        assert_eq!(treasury.status(), TreasuryStatus::Error);
        assert_eq!(treasury.last_error(), Some("out of gas"));

        treasury.begin_deployment().unwrap();
        assert_eq!(treasury.last_error(), None);
        treasury
            .confirm_deployment(&configuration(), SAFE, &tx_hash())
            .unwrap();
        assert!(treasury.mark_error("late").is_err());
        assert!(treasury.begin_deployment().is_err());
    }

    #[test]
    fn imported_treasury_is_active() {
        let address = Address::parse("address", SAFE).unwrap();
        let treasury = Treasury::import_existing("bob", 100, address.clone());
        assert!(treasury.is_active());
        assert_eq!(treasury.require_active("proposing").unwrap(), &address);
        assert!(treasury.deployment().unwrap().tx_hash.is_none());
    }
}
