//! # Treasury Registry
//!
//! Creation, deployment tracking and administrative configuration edits.
//!
//! Administrative edits (threshold, signers, policy) write the configuration
//! directly and are only allowed before the Safe is live. Once a treasury is
//! active the chain owns its configuration: changes go through
//! [`TransactionLedger::propose_config_change`](crate::transaction::TransactionLedger::propose_config_change)
//! and land when the transaction executes.
//!
//! Every successful edit invalidates the treasury, its owner, and the union
//! of signers before and after.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::codec::address::Address;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::safe::configuration::{ConfigurationDraft, ThresholdPolicy, TreasuryConfiguration};
use crate::safe::signers::SignerSet;
use crate::safe::treasury::Treasury;
use crate::storage::{TreasuryRecord, TreasuryStore, TreasuryStoreExt};
use crate::sync::invalidation::{invalidation_keys, CacheSink};
use crate::sync::provider::SafeInfo;

/// Treasury lifecycle and administration over a [`TreasuryStore`].
#[derive(Clone)]
pub struct TreasuryRegistry {
    store: Arc<dyn TreasuryStore>,
    sink: Arc<dyn CacheSink>,
    config: EngineConfig,
}

impl TreasuryRegistry {
    /// Registry over `store`, reporting stale views to `sink`.
    pub fn new(store: Arc<dyn TreasuryStore>, sink: Arc<dyn CacheSink>, config: EngineConfig) -> Self {
        Self { store, sink, config }
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Validates `draft` and stores a new `pending` treasury.
    pub fn create_treasury(
        &self,
        owner: &str,
        network: u64,
        draft: ConfigurationDraft,
    ) -> EngineResult<TreasuryRecord> {
        let configuration = draft.build(&self.config)?;
        let record = TreasuryRecord::new(Treasury::new(owner, network), configuration);
        self.store.insert(record.clone())?;
        info!(treasury = %record.id(), owner, network, signers = record.configuration.signers().len(), "treasury created");
        self.invalidate(&record, record.configuration.signers());
        Ok(record)
    }

    /// Registers an already-deployed Safe using the owners and threshold the
    /// chain reported. `info` should come from
    /// [`SyncCoordinator::verify_safe_address`](crate::sync::SyncCoordinator::verify_safe_address).
    pub fn import_treasury(&self, owner: &str, network: u64, info: &SafeInfo) -> EngineResult<TreasuryRecord> {
        let signers = SignerSet::from_owners(info.owners.iter().cloned())?;
        let mut configuration = TreasuryConfiguration::new(signers, info.threshold, &self.config)?;
        if let Some(version) = &info.version {
            let mut draft = configuration.to_draft();
            draft.version = Some(version.clone());
            configuration = draft.build(&self.config)?;
        }
        let record = TreasuryRecord::new(
            Treasury::import_existing(owner, network, info.address.clone()),
            configuration,
        );
        self.store.insert(record.clone())?;
        info!(treasury = %record.id(), owner, network, address = %info.address, "treasury imported");
        self.invalidate(&record, record.configuration.signers());
        Ok(record)
    }

    /// `pending | error → deploying`.
    pub fn begin_deployment(&self, id: Uuid) -> EngineResult<TreasuryRecord> {
        self.store.update(id, |record| {
            record.treasury.begin_deployment()?;
            Ok(record.clone())
        })
    }

    /// `deploying → active`, recording address and hash together.
    pub fn confirm_deployment(&self, id: Uuid, address: &str, tx_hash: &str) -> EngineResult<TreasuryRecord> {
        let record = self.store.update(id, |record| {
            record
                .treasury
                .confirm_deployment(&record.configuration, address, tx_hash)?;
            Ok(record.clone())
        })?;
        self.invalidate(&record, record.configuration.signers());
        Ok(record)
    }

    /// `pending | deploying → error`.
    pub fn mark_error(&self, id: Uuid, reason: &str) -> EngineResult<TreasuryRecord> {
        let record = self.store.update(id, |record| {
            record.treasury.mark_error(reason)?;
            Ok(record.clone())
        })?;
        self.invalidate(&record, record.configuration.signers());
        Ok(record)
    }

    // -- Queries ------------------------------------------------------------

    /// One treasury.
    pub fn get(&self, id: Uuid) -> EngineResult<TreasuryRecord> {
        self.store.load(id)
    }

    /// Treasuries `account` owns or signs for.
    pub fn visible_to(&self, account: &str) -> EngineResult<Vec<TreasuryRecord>> {
        let mut records: Vec<_> = self
            .store
            .list()?
            .into_iter()
            .filter(|record| record.is_visible_to(account))
            .collect();
        records.sort_by_key(|record| record.treasury.created_at);
        Ok(records)
    }

    // -- Administrative edits -----------------------------------------------

    /// Sets the threshold; rejects values outside `[1, signers]`.
    pub fn set_threshold(&self, id: Uuid, threshold: u32, actor: &str) -> EngineResult<TreasuryRecord> {
        self.edit(id, "changing the threshold", |cfg| cfg.set_threshold(threshold, actor))
    }

    /// Adds a signer, optionally with a new threshold.
    pub fn add_signer(
        &self,
        id: Uuid,
        signer: &str,
        threshold: Option<u32>,
        actor: &str,
    ) -> EngineResult<TreasuryRecord> {
        let signer = Address::parse("signer", signer)?;
        self.edit(id, "adding a signer", |cfg| {
            cfg.add_signer(signer, threshold, actor).map(|_| ())
        })
    }

    /// Removes a signer; the treasury's threshold policy decides what
    /// happens to a threshold that no longer fits.
    pub fn remove_signer(
        &self,
        id: Uuid,
        signer: &str,
        threshold: Option<u32>,
        actor: &str,
    ) -> EngineResult<TreasuryRecord> {
        let signer = Address::parse("signer", signer)?;
        self.edit(id, "removing a signer", |cfg| {
            cfg.remove_signer(&signer, threshold, actor).map(|_| ())
        })
    }

    /// Replaces `old` with `new` in place.
    pub fn swap_signer(&self, id: Uuid, old: &str, new: &str, actor: &str) -> EngineResult<TreasuryRecord> {
        let old = Address::parse("old_signer", old)?;
        let new = Address::parse("new_signer", new)?;
        self.edit(id, "replacing a signer", |cfg| cfg.swap_signer(&old, new, actor))
    }

    /// Changes the signer-removal threshold policy. Allowed in any status:
    /// the policy is off-chain bookkeeping.
    pub fn set_threshold_policy(
        &self,
        id: Uuid,
        policy: ThresholdPolicy,
        actor: &str,
    ) -> EngineResult<TreasuryRecord> {
        self.store.update(id, |record| {
            record.configuration.set_threshold_policy(policy, actor);
            info!(treasury = %record.id(), policy = %policy, actor, "threshold policy changed");
            Ok(record.clone())
        })
    }

    fn edit(
        &self,
        id: Uuid,
        action: &str,
        f: impl FnOnce(&mut TreasuryConfiguration) -> EngineResult<()>,
    ) -> EngineResult<TreasuryRecord> {
        let (record, before) = self.store.update(id, |record| {
            if record.treasury.is_active() {
                return Err(EngineError::TreasuryState {
                    status: record.treasury.status(),
                    reason: format!("{} on a live Safe must go through a transaction", action),
                });
            }
            let before = record.configuration.signers().clone();
            f(&mut record.configuration)?;
            info!(
                treasury = %record.id(),
                action,
                signers = record.configuration.signers().len(),
                threshold = record.configuration.threshold(),
                "configuration edited"
            );
            Ok((record.clone(), before))
        })?;
        self.invalidate(&record, &before);
        Ok(record)
    }

    fn invalidate(&self, record: &TreasuryRecord, before: &SignerSet) {
        self.sink.invalidate(&invalidation_keys(
            record.id(),
            &record.owner_key(),
            before,
            record.configuration.signers(),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::abi::WeiAmount;
    use crate::storage::MemoryStore;
    use crate::sync::invalidation::{InvalidationKey, RecordingSink};

    const S1: &str = "0x00000000000000000000000000000000000000a1";
    const S2: &str = "0x00000000000000000000000000000000000000a2";
    const S3: &str = "0x00000000000000000000000000000000000000a3";
    const SAFE: &str = "0x1111111111111111111111111111111111111111";

    fn registry() -> (TreasuryRegistry, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let registry = TreasuryRegistry::new(
            Arc::new(MemoryStore::new()),
            sink.clone(),
            EngineConfig::default(),
        );
        (registry, sink)
    }

    #[test]
    fn create_rejects_invalid_configuration() {
        let (registry, _) = registry();
        let err = registry
            .create_treasury("alice", 1, ConfigurationDraft::new([S1, S2], 3))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration { .. }));
        assert!(err.to_string().contains("threshold 3 cannot exceed number of signers (2)"));
    }

    #[test]
    fn create_makes_treasury_visible_to_owner_and_signers() {
        let (registry, sink) = registry();
        let record = registry
            .create_treasury("alice", 1, ConfigurationDraft::new([S1, S2], 1))
            .unwrap();
        assert_eq!(registry.visible_to("alice").unwrap().len(), 1);
        assert_eq!(registry.visible_to(&S2.to_uppercase().replace("0X", "0x")).unwrap().len(), 1);
        assert!(registry.visible_to(S3).unwrap().is_empty());

        let keys = sink.last().unwrap();
        assert!(keys.contains(&InvalidationKey::Treasury(record.id())));
        assert!(keys.contains(&InvalidationKey::AccountList(S1.into())));
    }

    #[test]
    fn edits_invalidate_removed_signers() {
        let (registry, sink) = registry();
        let id = registry
            .create_treasury("alice", 1, ConfigurationDraft::new([S1, S2, S3], 2))
            .unwrap()
            .id();

        let record = registry.remove_signer(id, S3, None, "alice").unwrap();
        assert_eq!(record.configuration.signers().len(), 2);
        assert!(sink
            .last()
            .unwrap()
            .contains(&InvalidationKey::AccountList(S3.into())));
        assert!(registry.visible_to(S3).unwrap().is_empty());

        let err = registry.set_threshold(id, 3, "alice").unwrap_err();
        assert_eq!(err.to_string(), "threshold 3 cannot exceed number of signers (2)");
    }

    #[test]
    fn live_safe_rejects_direct_edits() {
        let (registry, _) = registry();
        let id = registry
            .create_treasury("alice", 1, ConfigurationDraft::new([S1, S2], 1))
            .unwrap()
            .id();
        registry.begin_deployment(id).unwrap();
        let record = registry
            .confirm_deployment(id, SAFE, &format!("0x{}", "ab".repeat(32)))
            .unwrap();
        assert!(record.treasury.is_active());

        assert!(matches!(
            registry.add_signer(id, S3, None, "alice"),
            Err(EngineError::TreasuryState { .. })
        ));
        let record = registry
            .set_threshold_policy(id, ThresholdPolicy::AutoAdjust, "alice")
            .unwrap();
        assert_eq!(record.configuration.threshold_policy(), ThresholdPolicy::AutoAdjust);
    }

    #[test]
    fn import_uses_chain_configuration() {
        let (registry, _) = registry();
        let info = SafeInfo {
            address: Address::parse("safe", SAFE).unwrap(),
            balance: WeiAmount::zero(),
            threshold: 2,
            owners: vec![
                Address::parse("o", S2).unwrap(),
                Address::parse("o", S1).unwrap(),
            ],
            nonce: 7,
            version: Some("1.3.0".into()),
        };
        let record = registry.import_treasury("bob", 100, &info).unwrap();
        assert!(record.treasury.is_active());
        assert_eq!(record.configuration.threshold(), 2);
        assert_eq!(record.configuration.version(), "1.3.0");
        assert_eq!(record.configuration.signers().as_slice()[0].to_string(), S2);
    }

    #[test]
    fn swap_and_add_before_deployment() {
        let (registry, _) = registry();
        let id = registry
            .create_treasury("alice", 1, ConfigurationDraft::new([S1, S2], 1))
            .unwrap()
            .id();
        registry.swap_signer(id, S2, S3, "alice").unwrap();
        let record = registry.add_signer(id, S2, Some(3), "alice").unwrap();
        let owners: Vec<String> = record
            .configuration
            .signers()
            .iter()
            .map(Address::to_string)
            .collect();
        assert_eq!(owners, vec![S2, S1, S3]);
        assert_eq!(record.configuration.threshold(), 3);
    }
}
