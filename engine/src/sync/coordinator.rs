//! # Sync Coordinator
//!
//! Keeps the off-chain ledger honest about the chain and tells caches what
//! went stale.
//!
//! ```text
//!   confirm_execution ──▶ ledger.mark_executed ──commit──▶ sink.invalidate
//!                          (status + config change,        (owner ∪ signers
//!                           one atomic update)              before ∪ after)
//!
//!   check_accessibility ─▶ provider.get_safe_info ──timeout──▶ report
//!   reconcile ───────────▶ provider.get_safe_info ──▶ adopt owners/threshold
//! ```
//!
//! Provider calls never happen under a treasury lock. Provider failures in
//! `check_accessibility` degrade to `accessible: false` instead of failing
//! the call.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::invalidation::{invalidation_keys, CacheSink};
use super::provider::{ChainStateProvider, SafeInfo};
use crate::codec::abi::WeiAmount;
use crate::codec::address::Address;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::safe::signers::SignerSet;
use crate::storage::{TreasuryStore, TreasuryStoreExt};
use crate::transaction::ledger::{ExecutionReport, TransactionLedger};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What the UI can offer when a treasury is not reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOption {
    /// Retry against the chain.
    Reconnect,
    /// Start over with a fresh treasury.
    CreateNew,
}

/// Result of [`SyncCoordinator::check_accessibility`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessibilityReport {
    /// Treasury checked.
    pub treasury_id: Uuid,
    /// Whether the Safe answered.
    pub accessible: bool,
    /// What it answered.
    pub info: Option<SafeInfo>,
    /// Why it is not accessible.
    pub error: Option<String>,
    /// What the caller can do about it.
    pub recovery_options: Vec<RecoveryOption>,
}

/// Result of [`SyncCoordinator::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Treasury reconciled.
    pub treasury_id: Uuid,
    /// Whether owners or threshold were replaced by the chain's.
    pub changed: bool,
    /// Signers before reconciliation.
    pub signers_before: SignerSet,
    /// Signers after.
    pub signers_after: SignerSet,
    /// Threshold before.
    pub threshold_before: u32,
    /// Threshold after.
    pub threshold_after: u32,
    /// On-chain nonce.
    pub onchain_nonce: u64,
    /// On-chain balance.
    pub balance: WeiAmount,
    /// Nonces of open transactions the chain has already moved past. They
    /// can never execute; the caller decides whether to cancel them.
    pub stale_nonces: Vec<u64>,
}

// ---------------------------------------------------------------------------
// SyncCoordinator
// ---------------------------------------------------------------------------

/// Post-execution reconciliation and cache invalidation.
#[derive(Clone)]
pub struct SyncCoordinator {
    store: Arc<dyn TreasuryStore>,
    ledger: TransactionLedger,
    provider: Arc<dyn ChainStateProvider>,
    sink: Arc<dyn CacheSink>,
    config: EngineConfig,
}

impl SyncCoordinator {
    /// Coordinator over `store`, reading chain state from `provider` and
    /// reporting stale views to `sink`.
    pub fn new(
        store: Arc<dyn TreasuryStore>,
        provider: Arc<dyn ChainStateProvider>,
        sink: Arc<dyn CacheSink>,
        config: EngineConfig,
    ) -> Self {
        let ledger = TransactionLedger::new(Arc::clone(&store), config.clone());
        Self {
            store,
            ledger,
            provider,
            sink,
            config,
        }
    }

    /// The ledger this coordinator records executions through.
    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    /// Records an on-chain execution, applies any configuration change it
    /// carried, and invalidates the treasury, its owner, and every signer
    /// before and after the change.
    ///
    /// A change that cannot be applied is reported in the returned
    /// [`ExecutionReport`], not as an error: the execution is a fact.
    pub fn confirm_execution(
        &self,
        treasury_id: Uuid,
        tx_id: Uuid,
        hash: &str,
    ) -> EngineResult<ExecutionReport> {
        let report = self.ledger.mark_executed(treasury_id, tx_id, hash)?;
        let keys = invalidation_keys(
            treasury_id,
            &report.owner,
            &report.signers_before,
            &report.signers_after,
        );
        self.sink.invalidate(&keys);
        if let Some(outcome) = &report.outcome {
            if outcome.mutated {
                info!(
                    treasury = %treasury_id,
                    signers = report.signers_after.len(),
                    invalidated = keys.len(),
                    "configuration synchronized from executed transaction"
                );
            }
        }
        Ok(report)
    }

    /// Asks the chain whether the treasury's Safe is reachable.
    ///
    /// Only an unknown treasury id is an error. Undeployed treasuries,
    /// provider errors and timeouts all come back as `accessible: false`.
    pub async fn check_accessibility(&self, treasury_id: Uuid) -> EngineResult<AccessibilityReport> {
        let record = self.store.load(treasury_id)?;
        let Some(address) = record.treasury.address().cloned() else {
            return Ok(AccessibilityReport {
                treasury_id,
                accessible: false,
                info: None,
                error: Some(format!("treasury is {}, not deployed", record.treasury.status())),
                recovery_options: vec![RecoveryOption::CreateNew],
            });
        };

        match self.fetch(record.treasury.network, &address).await {
            Ok(info) => Ok(AccessibilityReport {
                treasury_id,
                accessible: true,
                info: Some(info),
                error: None,
                recovery_options: Vec::new(),
            }),
            Err(e) => {
                warn!(treasury = %treasury_id, address = %address, error = %e, "treasury is not accessible");
                Ok(AccessibilityReport {
                    treasury_id,
                    accessible: false,
                    info: None,
                    error: Some(e.to_string()),
                    recovery_options: vec![RecoveryOption::Reconnect, RecoveryOption::CreateNew],
                })
            }
        }
    }

    /// Confirms that `address` on `network` is a Safe with a sane owner
    /// configuration, returning what the chain reports.
    pub async fn verify_safe_address(&self, network: u64, address: &str) -> EngineResult<SafeInfo> {
        let address = Address::parse("address", address)?;
        let info = self.fetch(network, &address).await?;
        if info.address != address {
            return Err(EngineError::ProviderFailure {
                reason: format!("asked for {} but provider answered for {}", address, info.address),
            });
        }
        if info.owners.is_empty()
            || info.threshold < 1
            || info.threshold as usize > info.owners.len()
        {
            return Err(EngineError::ProviderFailure {
                reason: format!(
                    "{} reports threshold {} with {} owners",
                    address,
                    info.threshold,
                    info.owners.len()
                ),
            });
        }
        Ok(info)
    }

    /// Replaces off-chain owners and threshold with the chain's when they
    /// differ and lists open transactions whose nonce the chain has passed.
    pub async fn reconcile(&self, treasury_id: Uuid) -> EngineResult<ReconcileReport> {
        let record = self.store.load(treasury_id)?;
        let address = record.treasury.require_active("reconciling")?.clone();
        let info = self.fetch(record.treasury.network, &address).await?;

        let (report, owner) = self.store.update(treasury_id, |record| {
            let signers_before = record.configuration.signers().clone();
            let threshold_before = record.configuration.threshold();
            let changed = record.configuration.adopt_onchain_state(
                info.owners.clone(),
                info.threshold,
                "chain",
            )?;
            let mut stale_nonces: Vec<u64> = record
                .transactions
                .iter()
                .filter(|tx| tx.status.blocks_later_nonces() && tx.nonce < info.nonce)
                .map(|tx| tx.nonce)
                .collect();
            stale_nonces.sort_unstable();

            let report = ReconcileReport {
                treasury_id,
                changed,
                signers_before,
                signers_after: record.configuration.signers().clone(),
                threshold_before,
                threshold_after: record.configuration.threshold(),
                onchain_nonce: info.nonce,
                balance: info.balance.clone(),
                stale_nonces,
            };
            Ok((report, record.owner_key()))
        })?;

        if report.changed {
            warn!(
                treasury = %treasury_id,
                threshold_before = report.threshold_before,
                threshold_after = report.threshold_after,
                signers_after = report.signers_after.len(),
                "off-chain configuration drifted; adopted on-chain state"
            );
            self.sink.invalidate(&invalidation_keys(
                treasury_id,
                &owner,
                &report.signers_before,
                &report.signers_after,
            ));
        }
        if !report.stale_nonces.is_empty() {
            warn!(treasury = %treasury_id, stale = ?report.stale_nonces, onchain_nonce = report.onchain_nonce, "open transactions behind on-chain nonce");
        }
        Ok(report)
    }

    async fn fetch(&self, network: u64, address: &Address) -> EngineResult<SafeInfo> {
        let timeout = self.config.accessibility_timeout();
        match tokio::time::timeout(timeout, self.provider.get_safe_info(network, address)).await {
            Ok(Ok(info)) => Ok(info),
            Ok(Err(e)) => Err(EngineError::ProviderFailure {
                reason: e.to_string(),
            }),
            Err(_) => Err(EngineError::ProviderTimeout {
                timeout_ms: self.config.accessibility_timeout_ms,
            }),
        }
    }
}
