//! # Transaction Ledger
//!
//! Nonce assignment, signature bookkeeping and execution eligibility for
//! every treasury in a [`TreasuryStore`].
//!
//! ## Nonces
//!
//! A nonce is assigned exactly once, when the transaction is created, as
//! `1 + max(existing nonces)` (0 for the first one). Input is validated
//! before the store is touched, so a rejected proposal never consumes a
//! nonce. Cancelled and failed transactions keep their nonce; the gap they
//! leave is skipped by [`is_next_executable`].
//!
//! ## Ordering
//!
//! The Safe contract only executes the transaction whose nonce equals its
//! own counter. Off-chain that means a transaction is next when no
//! lower-nonce transaction is still open (draft or pending):
//!
//! ```text
//!   nonce:   0          1           2          3
//!   status:  executed   cancelled   pending    pending
//!                                   ▲ next     ✗ blocked by 2
//! ```
//!
//! ## Atomicity
//!
//! Every mutation runs inside [`TreasuryStoreExt::update`], under the
//! treasury's lock. Two concurrent proposals can't compute the same nonce,
//! and two concurrent signers can't both pass the "not yet signed" check.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::hash::{safe_tx_hash, SafeTx};
use super::types::{Operation, SignatureRecord, Transaction, TransactionStatus};
use crate::codec::abi::{call_data_bytes, parse_call_data, WeiAmount};
use crate::codec::address::{parse_signature, Address, TxHash};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::safe::configuration::{ApplyOutcome, ThresholdPolicy};
use crate::safe::decoder::{decode_config_change_hex, ConfigChange};
use crate::safe::signers::SignerSet;
use crate::storage::{TreasuryRecord, TreasuryStore, TreasuryStoreExt};

// ---------------------------------------------------------------------------
// Inputs and reports
// ---------------------------------------------------------------------------

/// Raw proposal input, validated by the ledger.
#[derive(Debug, Clone, Default)]
pub struct Proposal {
    /// Destination address.
    pub to: String,
    /// Amount in wei as a base-10 string.
    pub value: String,
    /// `0x`-prefixed call data; empty means `0x`.
    pub data: String,
    /// Call or delegatecall.
    pub operation: Operation,
    /// Free text.
    pub description: String,
    /// Proposing account.
    pub created_by: String,
}

impl Proposal {
    /// A plain value transfer.
    pub fn transfer(
        to: impl Into<String>,
        value: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            value: value.into(),
            created_by: created_by.into(),
            ..Default::default()
        }
    }
}

/// What happened when an execution was recorded.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// The transaction after the transition.
    pub transaction: Transaction,
    /// Treasury owner account, normalized when it is an address.
    pub owner: String,
    /// Signer set before any configuration change.
    pub signers_before: SignerSet,
    /// Signer set after it.
    pub signers_after: SignerSet,
    /// Configuration change carried by the call data, if any.
    pub config_change: Option<ConfigChange>,
    /// Result of applying it.
    pub outcome: Option<ApplyOutcome>,
    /// Why the change could not be applied. The execution itself is still
    /// recorded: the chain has already moved on.
    pub apply_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Record-level rules
// ---------------------------------------------------------------------------

/// Next nonce for a treasury: one past the highest assigned, or 0.
pub fn next_nonce(record: &TreasuryRecord) -> u64 {
    record
        .transactions
        .iter()
        .map(|tx| tx.nonce + 1)
        .max()
        .unwrap_or(0)
}

/// `true` iff no other open transaction of the treasury has a lower nonce.
pub fn is_next_executable(record: &TreasuryRecord, tx: &Transaction) -> bool {
    !record
        .transactions
        .iter()
        .any(|other| other.id != tx.id && other.nonce < tx.nonce && other.status.blocks_later_nonces())
}

/// Signatures on `tx` that come from current signers. Approvals from
/// owners removed since they signed no longer count.
pub fn valid_signature_count(record: &TreasuryRecord, tx: &Transaction) -> usize {
    let signers = record.configuration.signers();
    tx.signatures
        .iter()
        .filter(|s| signers.contains(&s.signer))
        .count()
}

/// `true` iff `tx` is pending, has enough valid signatures and is next in
/// nonce order.
pub fn can_execute(record: &TreasuryRecord, tx: &Transaction) -> bool {
    tx.status == TransactionStatus::Pending
        && valid_signature_count(record, tx) >= record.configuration.threshold() as usize
        && is_next_executable(record, tx)
}

/// Signatures still missing before the threshold is met.
pub fn signatures_remaining(record: &TreasuryRecord, tx: &Transaction) -> u32 {
    let have = u32::try_from(valid_signature_count(record, tx)).unwrap_or(u32::MAX);
    record.configuration.threshold().saturating_sub(have)
}

/// Records `hash` as the on-chain execution of `tx_id` and replays any
/// configuration change its call data carries.
pub(crate) fn record_execution(
    record: &mut TreasuryRecord,
    tx_id: Uuid,
    hash: &str,
) -> EngineResult<ExecutionReport> {
    let signers_before = record.configuration.signers().clone();
    let eligible = {
        let tx = record.transaction(tx_id)?;
        match tx.status {
            TransactionStatus::Pending => {}
            TransactionStatus::Executed => return Err(EngineError::AlreadyExecuted { nonce: tx.nonce }),
            TransactionStatus::Cancelled => return Err(EngineError::Cancelled { nonce: tx.nonce }),
            TransactionStatus::Failed => {
                return Err(EngineError::TransactionFinalized { status: tx.status })
            }
            TransactionStatus::Draft => {
                return Err(EngineError::InvalidTransition {
                    from: tx.status,
                    to: TransactionStatus::Executed,
                })
            }
        }
        can_execute(record, tx)
    };
    let hash = TxHash::parse("execution_hash", hash)?;

    let treasury_id = record.id();
    let safe = record.treasury.address().cloned();
    let actor = format!("tx:{}", hash);
    let tx = record.transaction_mut(tx_id)?;
    if !eligible {
        warn!(treasury = %treasury_id, nonce = tx.nonce, "recording execution of a transaction that was not executable off-chain");
    }
    info!(treasury = %treasury_id, nonce = tx.nonce, hash = %hash, "transaction executed");
    tx.status = TransactionStatus::Executed;
    tx.execution_hash = Some(hash);
    tx.executed_at = Some(Utc::now());
    tx.touch();
    let transaction = tx.clone();

    let mut config_change = None;
    let mut outcome = None;
    let mut apply_error = None;

    // Only calls from the Safe to itself can change its configuration.
    if safe.as_ref() == Some(&transaction.to) {
        match decode_config_change_hex(&transaction.data) {
            Ok(change) => config_change = change,
            Err(e) => {
                warn!(treasury = %treasury_id, nonce = transaction.nonce, error = %e, "could not decode call data of executed transaction");
                apply_error = Some(e.to_string());
            }
        }
    }

    if let Some(change) = &config_change {
        match record.configuration.apply_configuration_change(change, &actor) {
            Ok(applied) => outcome = Some(applied),
            Err(e) => {
                warn!(treasury = %treasury_id, change = %change, error = %e, "executed configuration change could not be applied");
                apply_error = Some(e.to_string());
            }
        }
    }

    Ok(ExecutionReport {
        transaction,
        owner: record.owner_key(),
        signers_before,
        signers_after: record.configuration.signers().clone(),
        config_change,
        outcome,
        apply_error,
    })
}

// ---------------------------------------------------------------------------
// TransactionLedger
// ---------------------------------------------------------------------------

/// Transaction operations over a [`TreasuryStore`].
#[derive(Clone)]
pub struct TransactionLedger {
    store: Arc<dyn TreasuryStore>,
    config: EngineConfig,
}

impl TransactionLedger {
    /// Ledger over `store`.
    pub fn new(store: Arc<dyn TreasuryStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    // -- Proposals ----------------------------------------------------------

    /// Validates `proposal`, assigns the next nonce and stores it as
    /// `pending`. The treasury must be active: the `safeTxHash` binds the
    /// Safe address as verifying contract.
    pub fn propose_transaction(&self, treasury_id: Uuid, proposal: Proposal) -> EngineResult<Transaction> {
        self.create(treasury_id, proposal, TransactionStatus::Pending)
    }

    /// Like [`propose_transaction`](Self::propose_transaction) but stored as
    /// `draft`: the nonce is reserved, signatures are not yet accepted.
    pub fn propose_draft(&self, treasury_id: Uuid, proposal: Proposal) -> EngineResult<Transaction> {
        self.create(treasury_id, proposal, TransactionStatus::Draft)
    }

    /// Proposes a configuration change as a call from the Safe to itself.
    ///
    /// The change is dry-run against the current configuration first, so a
    /// call the contract would revert (unknown owner, wrong `prevOwner`,
    /// threshold out of range) is rejected here.
    pub fn propose_config_change(
        &self,
        treasury_id: Uuid,
        change: ConfigChange,
        created_by: &str,
        description: &str,
    ) -> EngineResult<Transaction> {
        let record = self.store.load(treasury_id)?;
        let safe = record
            .treasury
            .require_active("binding the safeTxHash of a configuration change")?;

        let mut dry_run = record.configuration.clone();
        dry_run.set_threshold_policy(ThresholdPolicy::Strict, created_by);
        let outcome = dry_run.apply_configuration_change(&change, created_by)?;
        if let Some(mismatch) = outcome.mismatches.first() {
            return Err(EngineError::invalid_value(
                "change",
                change.to_string(),
                format!("would revert on-chain: {}", mismatch),
            ));
        }

        let proposal = Proposal {
            to: safe.to_string(),
            value: "0".to_string(),
            data: change.encode_hex(),
            operation: Operation::Call,
            description: description.to_string(),
            created_by: created_by.to_string(),
        };
        self.create(treasury_id, proposal, TransactionStatus::Pending)
    }

    /// Proposes `removeOwner` for `owner` with the correct `prevOwner`.
    pub fn propose_remove_signer(
        &self,
        treasury_id: Uuid,
        owner: &str,
        threshold: u32,
        created_by: &str,
    ) -> EngineResult<Transaction> {
        let owner = Address::parse("owner", owner)?;
        let record = self.store.load(treasury_id)?;
        let change = record.configuration.signers().remove_owner_change(&owner, threshold)?;
        let description = format!("Remove signer {}", owner);
        self.propose_config_change(treasury_id, change, created_by, &description)
    }

    /// Proposes `swapOwner` replacing `old` with `new`.
    pub fn propose_swap_signer(
        &self,
        treasury_id: Uuid,
        old: &str,
        new: &str,
        created_by: &str,
    ) -> EngineResult<Transaction> {
        let old = Address::parse("old_owner", old)?;
        let new = Address::parse("new_owner", new)?;
        let record = self.store.load(treasury_id)?;
        let change = record.configuration.signers().swap_owner_change(&old, &new)?;
        let description = format!("Replace signer {} with {}", old, new);
        self.propose_config_change(treasury_id, change, created_by, &description)
    }

    fn create(
        &self,
        treasury_id: Uuid,
        proposal: Proposal,
        status: TransactionStatus,
    ) -> EngineResult<Transaction> {
        // Validation happens before the store is touched so a rejected
        // proposal cannot consume a nonce.
        let to = Address::parse("to", &proposal.to)?;
        let value = WeiAmount::parse("value", &proposal.value)?;
        let data = parse_call_data("data", &proposal.data)?;
        let data_bytes = call_data_bytes(&data)?;
        if proposal.description.chars().count() > self.config.max_description_length {
            return Err(EngineError::invalid_value(
                "description",
                format!("{} characters", proposal.description.chars().count()),
                format!("must be at most {} characters", self.config.max_description_length),
            ));
        }

        self.store.update(treasury_id, |record| {
            let safe = record
                .treasury
                .require_active("binding the safeTxHash of a new transaction")?
                .clone();
            let nonce = next_nonce(record);
            let safe_tx_hash = safe_tx_hash(
                record.treasury.network,
                &safe,
                &SafeTx {
                    to: &to,
                    value: &value,
                    data: &data_bytes,
                    operation: proposal.operation,
                    nonce,
                },
            );
            let now = Utc::now();
            let tx = Transaction {
                id: Uuid::new_v4(),
                treasury_id,
                nonce,
                to: to.clone(),
                value: value.clone(),
                data: data.clone(),
                operation: proposal.operation,
                status,
                signatures: Vec::new(),
                created_by: proposal.created_by.clone(),
                description: proposal.description.clone(),
                safe_tx_hash,
                execution_hash: None,
                executed_at: None,
                failure_reason: None,
                created_at: now,
                updated_at: now,
            };
            info!(
                treasury = %treasury_id,
                nonce,
                to = %tx.to,
                value = %tx.value,
                status = %status,
                "transaction proposed"
            );
            record.transactions.push(tx.clone());
            Ok(tx)
        })
    }

    /// `draft → pending`.
    pub fn submit(&self, treasury_id: Uuid, tx_id: Uuid) -> EngineResult<Transaction> {
        self.store.update(treasury_id, |record| {
            let tx = record.transaction_mut(tx_id)?;
            match tx.status {
                TransactionStatus::Draft => {
                    tx.status = TransactionStatus::Pending;
                    tx.touch();
                    info!(treasury = %treasury_id, nonce = tx.nonce, "draft submitted for signing");
                    Ok(tx.clone())
                }
                status if status.is_final() => Err(EngineError::TransactionFinalized { status }),
                status => Err(EngineError::InvalidTransition {
                    from: status,
                    to: TransactionStatus::Pending,
                }),
            }
        })
    }

    // -- Signatures ---------------------------------------------------------

    /// Records `signer`'s approval of a pending transaction.
    pub fn add_signature(
        &self,
        treasury_id: Uuid,
        tx_id: Uuid,
        signer: &str,
        signature: &str,
    ) -> EngineResult<bool> {
        self.store.update(treasury_id, |record| {
            let status = record.transaction(tx_id)?.status;
            if status.is_final() {
                return Err(EngineError::TransactionFinalized { status });
            }
            if status != TransactionStatus::Pending {
                return Err(EngineError::NotPending { status });
            }

            let signer = Address::parse("signer", signer)?;
            if !record.configuration.signers().contains(&signer) {
                return Err(EngineError::NotASigner {
                    signer: signer.to_string(),
                });
            }
            let tx = record.transaction_mut(tx_id)?;
            if tx.has_signed(&signer) {
                return Err(EngineError::DuplicateSignature {
                    signer: signer.to_string(),
                });
            }
            let signature = parse_signature(&signer, signature)?;

            tx.signatures.push(SignatureRecord {
                signer: signer.clone(),
                signature,
                signed_at: Utc::now(),
            });
            tx.touch();
            debug!(treasury = %treasury_id, nonce = tx.nonce, signer = %signer, count = tx.signatures.len(), "signature recorded");
            Ok(true)
        })
    }

    // -- Execution ----------------------------------------------------------

    /// Whether the transaction can be executed now.
    pub fn can_execute(&self, treasury_id: Uuid, tx_id: Uuid) -> EngineResult<bool> {
        let record = self.store.load(treasury_id)?;
        Ok(can_execute(&record, record.transaction(tx_id)?))
    }

    /// Whether every lower nonce is settled.
    pub fn is_next_executable(&self, treasury_id: Uuid, tx_id: Uuid) -> EngineResult<bool> {
        let record = self.store.load(treasury_id)?;
        Ok(is_next_executable(&record, record.transaction(tx_id)?))
    }

    /// Records the on-chain execution and applies any configuration change
    /// in the same atomic update.
    ///
    /// Cache invalidation is not done here; go through
    /// [`SyncCoordinator::confirm_execution`](crate::sync::SyncCoordinator::confirm_execution)
    /// unless you handle it yourself.
    pub fn mark_executed(&self, treasury_id: Uuid, tx_id: Uuid, hash: &str) -> EngineResult<ExecutionReport> {
        self.store
            .update(treasury_id, |record| record_execution(record, tx_id, hash))
    }

    /// `pending → failed`. The nonce keeps blocking later transactions.
    pub fn mark_failed(&self, treasury_id: Uuid, tx_id: Uuid, reason: &str) -> EngineResult<Transaction> {
        self.store.update(treasury_id, |record| {
            let tx = record.transaction_mut(tx_id)?;
            match tx.status {
                TransactionStatus::Pending => {}
                status if status.is_final() => return Err(EngineError::TransactionFinalized { status }),
                status => {
                    return Err(EngineError::InvalidTransition {
                        from: status,
                        to: TransactionStatus::Failed,
                    })
                }
            }
            tx.status = TransactionStatus::Failed;
            tx.failure_reason = Some(reason.to_string());
            tx.touch();
            warn!(treasury = %treasury_id, nonce = tx.nonce, reason, "transaction failed");
            Ok(tx.clone())
        })
    }

    /// Cancels a pending transaction. Only its creator or the treasury
    /// owner may do so. Later nonces are not renumbered.
    pub fn cancel(&self, treasury_id: Uuid, tx_id: Uuid, actor: &str) -> EngineResult<Transaction> {
        self.store.update(treasury_id, |record| {
            let owner = record.treasury.owner.clone();
            let tx = record.transaction_mut(tx_id)?;
            if tx.status != TransactionStatus::Pending {
                return Err(EngineError::TransactionFinalized { status: tx.status });
            }
            if actor != tx.created_by && actor != owner {
                return Err(EngineError::NotAuthorizedToCancel {
                    actor: actor.to_string(),
                });
            }
            tx.status = TransactionStatus::Cancelled;
            tx.touch();
            info!(treasury = %treasury_id, nonce = tx.nonce, actor, "transaction cancelled");
            Ok(tx.clone())
        })
    }

    // -- Queries ------------------------------------------------------------

    /// One transaction.
    pub fn transaction(&self, treasury_id: Uuid, tx_id: Uuid) -> EngineResult<Transaction> {
        self.store.load(treasury_id)?.transaction(tx_id).cloned()
    }

    /// The nonce the next proposal will get.
    pub fn next_nonce(&self, treasury_id: Uuid) -> EngineResult<u64> {
        Ok(next_nonce(&self.store.load(treasury_id)?))
    }

    /// All transactions in nonce order.
    pub fn list_transactions(&self, treasury_id: Uuid) -> EngineResult<Vec<Transaction>> {
        let mut txs = self.store.load(treasury_id)?.transactions;
        txs.sort_by_key(|tx| tx.nonce);
        Ok(txs)
    }

    /// Pending transactions in nonce order.
    pub fn pending_transactions(&self, treasury_id: Uuid) -> EngineResult<Vec<Transaction>> {
        let mut txs = self.list_transactions(treasury_id)?;
        txs.retain(|tx| tx.status == TransactionStatus::Pending);
        Ok(txs)
    }

    /// Valid signatures still needed.
    pub fn signatures_remaining(&self, treasury_id: Uuid, tx_id: Uuid) -> EngineResult<u32> {
        let record = self.store.load(treasury_id)?;
        Ok(signatures_remaining(&record, record.transaction(tx_id)?))
    }
}
