//! # Treasury Configuration
//!
//! Signers, threshold, modules, fallback handler, contract version and the
//! salt used for deterministic address derivation. This is the single
//! source of truth for who may sign and how many signatures a transaction
//! needs, and every mutation path runs through it.
//!
//! ## Threshold policy
//!
//! `set_threshold` never clamps: an out-of-range request is rejected with a
//! message naming the limit. Signer *removal* is different: the removal may
//! be an on-chain fact we are catching up with, and the treasury decides
//! what happens when the old threshold no longer fits:
//!
//! - [`ThresholdPolicy::Strict`] rejects the change; nothing is applied.
//! - [`ThresholdPolicy::AutoAdjust`] lowers the threshold to the new signer
//!   count and reports the adjustment.
//!
//! The policy only ever lowers a removal threshold that no longer fits.
//! Zero, and out-of-range values carried by `changeThreshold` or
//! `addOwnerWithThreshold`, are rejected under both policies.
//!
//! ## Applying on-chain changes
//!
//! [`TreasuryConfiguration::apply_configuration_change`] replays a decoded
//! [`ConfigChange`]. A change that contradicts our state (removing an owner
//! we don't know, adding one we already have) is a drift signal, not a
//! reason to abort: it is skipped and reported as a [`ConfigChangeMismatch`].
//! Changes are applied to a copy and committed only if every step succeeds.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::codec::abi::WeiAmount;
use crate::codec::address::{is_valid_address, normalize, Address};
use crate::config::{EngineConfig, SENTINEL_ADDRESS, ZERO_ADDRESS};
use crate::error::{EngineError, EngineResult};
use crate::safe::decoder::ConfigChange;
use crate::safe::signers::SignerSet;

// ---------------------------------------------------------------------------
// ThresholdPolicy
// ---------------------------------------------------------------------------

/// What to do when a signer removal leaves the threshold above the signer count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Reject the removal.
    #[default]
    Strict,
    /// Lower the threshold to the remaining signer count.
    AutoAdjust,
}

impl fmt::Display for ThresholdPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::AutoAdjust => write!(f, "auto_adjust"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigViolation
// ---------------------------------------------------------------------------

/// One broken configuration invariant, as reported by bulk validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum ConfigViolation {
    /// The signer list is empty.
    NoSigners,
    /// Threshold outside `[1, signers]`.
    ThresholdOutOfRange {
        /// Configured threshold.
        threshold: u64,
        /// Number of signers listed.
        signers: usize,
    },
    /// An address field is malformed.
    InvalidAddress {
        /// Field path, e.g. `signers[2]`.
        field: String,
        /// The rejected input.
        value: String,
    },
    /// The same signer is listed twice.
    DuplicateSigner {
        /// The repeated address.
        address: String,
    },
    /// The zero address or the sentinel is listed as a signer.
    ReservedSigner {
        /// The reserved address.
        address: String,
    },
    /// The same module is listed twice.
    DuplicateModule {
        /// The repeated address.
        address: String,
    },
    /// The zero address or the sentinel is listed as a module.
    ReservedModule {
        /// The reserved address.
        address: String,
    },
    /// The salt nonce is not a uint256 decimal.
    InvalidSaltNonce {
        /// The rejected input.
        value: String,
    },
    /// The contract version string is blank.
    EmptyVersion,
}

impl fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSigners => write!(f, "at least one signer is required"),
            Self::ThresholdOutOfRange { threshold: 0, .. } => {
                write!(f, "threshold must be at least 1")
            }
            Self::ThresholdOutOfRange { threshold, signers } => write!(
                f,
                "threshold {} cannot exceed number of signers ({})",
                threshold, signers
            ),
            Self::InvalidAddress { field, value } => {
                write!(f, "`{}` is not a valid address: {:?}", field, value)
            }
            Self::DuplicateSigner { address } => write!(f, "signer {} is listed twice", address),
            Self::ReservedSigner { address } => {
                write!(f, "{} is reserved and cannot be a signer", address)
            }
            Self::DuplicateModule { address } => write!(f, "module {} is listed twice", address),
            Self::ReservedModule { address } => {
                write!(f, "{} is reserved and cannot be a module", address)
            }
            Self::InvalidSaltNonce { value } => {
                write!(f, "salt nonce {:?} is not a uint256 decimal", value)
            }
            Self::EmptyVersion => write!(f, "contract version must not be empty"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigurationDraft
// ---------------------------------------------------------------------------

/// Unvalidated configuration input, as it arrives from a form or a file.
///
/// Fields left as `None` take their defaults from [`EngineConfig`] when the
/// draft is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigurationDraft {
    /// Signer addresses in `setup()` order.
    pub signers: Vec<String>,
    /// Required signatures.
    pub threshold: u64,
    /// Enabled module addresses.
    pub modules: Vec<String>,
    /// Fallback handler address.
    pub fallback_handler: Option<String>,
    /// Safe contract version.
    pub version: Option<String>,
    /// Salt nonce for deterministic deployment, as a uint256 decimal.
    pub salt_nonce: Option<String>,
    /// Threshold policy for signer removals.
    pub threshold_policy: Option<ThresholdPolicy>,
}

impl ConfigurationDraft {
    /// Draft with the given signers and threshold and everything else defaulted.
    pub fn new<S: Into<String>>(signers: impl IntoIterator<Item = S>, threshold: u64) -> Self {
        Self {
            signers: signers.into_iter().map(Into::into).collect(),
            threshold,
            ..Default::default()
        }
    }

    /// Reports every violated invariant. An empty result means
    /// [`build`](Self::build) will succeed.
    pub fn validate(&self) -> Vec<ConfigViolation> {
        let mut violations = Vec::new();

        if self.signers.is_empty() {
            violations.push(ConfigViolation::NoSigners);
        }

        let mut seen = HashSet::new();
        for (i, raw) in self.signers.iter().enumerate() {
            if !is_valid_address(raw) {
                violations.push(ConfigViolation::InvalidAddress {
                    field: format!("signers[{}]", i),
                    value: raw.clone(),
                });
                continue;
            }
            let address = normalize(raw);
            if is_reserved(&address) {
                violations.push(ConfigViolation::ReservedSigner { address });
            } else if !seen.insert(address.clone()) {
                violations.push(ConfigViolation::DuplicateSigner { address });
            }
        }

        if self.threshold < 1 || self.threshold > self.signers.len() as u64 {
            violations.push(ConfigViolation::ThresholdOutOfRange {
                threshold: self.threshold,
                signers: self.signers.len(),
            });
        }

        let mut seen = HashSet::new();
        for (i, raw) in self.modules.iter().enumerate() {
            if !is_valid_address(raw) {
                violations.push(ConfigViolation::InvalidAddress {
                    field: format!("modules[{}]", i),
                    value: raw.clone(),
                });
                continue;
            }
            let address = normalize(raw);
            if is_reserved(&address) {
                violations.push(ConfigViolation::ReservedModule { address });
            } else if !seen.insert(address.clone()) {
                violations.push(ConfigViolation::DuplicateModule { address });
            }
        }

        if let Some(handler) = &self.fallback_handler {
            if !is_valid_address(handler) {
                violations.push(ConfigViolation::InvalidAddress {
                    field: "fallback_handler".to_string(),
                    value: handler.clone(),
                });
            }
        }

        if let Some(version) = &self.version {
            if version.trim().is_empty() {
                violations.push(ConfigViolation::EmptyVersion);
            }
        }

        if let Some(salt) = &self.salt_nonce {
            if WeiAmount::parse("salt_nonce", salt).is_err() {
                violations.push(ConfigViolation::InvalidSaltNonce {
                    value: salt.clone(),
                });
            }
        }

        violations
    }

    /// Validates and builds the typed configuration.
    pub fn build(self, config: &EngineConfig) -> EngineResult<TreasuryConfiguration> {
        let violations = self.validate();
        if !violations.is_empty() {
            return Err(EngineError::InvalidConfiguration { violations });
        }

        let owners = self
            .signers
            .iter()
            .enumerate()
            .map(|(i, raw)| Address::parse(&format!("signers[{}]", i), raw))
            .collect::<EngineResult<Vec<_>>>()?;
        let modules = self
            .modules
            .iter()
            .enumerate()
            .map(|(i, raw)| Address::parse(&format!("modules[{}]", i), raw))
            .collect::<EngineResult<Vec<_>>>()?;
        let fallback_handler = match &self.fallback_handler {
            Some(raw) => Some(Address::parse("fallback_handler", raw)?).filter(|a| !a.is_zero()),
            None => None,
        };
        let salt_nonce = match &self.salt_nonce {
            Some(raw) => WeiAmount::parse("salt_nonce", raw)?,
            None => WeiAmount::parse("salt_nonce", &rand::random::<u64>().to_string())?,
        };
        let threshold = u32::try_from(self.threshold).map_err(|_| {
            EngineError::ThresholdOutOfRange {
                threshold: self.threshold,
                signers: owners.len(),
            }
        })?;

        Ok(TreasuryConfiguration {
            signers: SignerSet::from_owners(owners)?,
            threshold,
            modules,
            fallback_handler,
            version: self
                .version
                .unwrap_or_else(|| config.default_safe_version.clone()),
            salt_nonce,
            threshold_policy: self
                .threshold_policy
                .unwrap_or(config.default_threshold_policy),
            updated_at: Utc::now(),
            updated_by: None,
        })
    }
}

fn is_reserved(normalized: &str) -> bool {
    normalized == ZERO_ADDRESS || normalized == SENTINEL_ADDRESS
}

fn check_threshold(threshold: u32, signers: usize) -> EngineResult<()> {
    if threshold < 1 || threshold as usize > signers {
        return Err(EngineError::ThresholdOutOfRange {
            threshold: u64::from(threshold),
            signers,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Apply outcome
// ---------------------------------------------------------------------------

/// A decoded change that contradicts current off-chain state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mismatch", rename_all = "snake_case")]
pub enum ConfigChangeMismatch {
    /// Adding an owner we already have.
    OwnerAlreadyPresent {
        /// The owner.
        owner: Address,
    },
    /// Removing or replacing an owner we don't have.
    OwnerNotFound {
        /// The owner.
        owner: Address,
    },
    /// Swapping in an owner we already have.
    NewOwnerAlreadyPresent {
        /// The owner.
        owner: Address,
    },
    /// The call's `prevOwner` disagrees with our list order.
    PrevOwnerMismatch {
        /// The owner being removed or replaced.
        owner: Address,
        /// Predecessor according to our list.
        expected: Address,
        /// Predecessor named in the call data.
        reported: Address,
    },
    /// Enabling a module that is already enabled.
    ModuleAlreadyEnabled {
        /// The module.
        module: Address,
    },
    /// Disabling a module we don't have.
    ModuleNotEnabled {
        /// The module.
        module: Address,
    },
}

impl fmt::Display for ConfigChangeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OwnerAlreadyPresent { owner } => write!(f, "{} is already a signer", owner),
            Self::OwnerNotFound { owner } => write!(f, "{} is not a known signer", owner),
            Self::NewOwnerAlreadyPresent { owner } => {
                write!(f, "replacement {} is already a signer", owner)
            }
            Self::PrevOwnerMismatch {
                owner,
                expected,
                reported,
            } => write!(
                f,
                "prevOwner for {} is {} off-chain but {} on-chain",
                owner, expected, reported
            ),
            Self::ModuleAlreadyEnabled { module } => {
                write!(f, "module {} is already enabled", module)
            }
            Self::ModuleNotEnabled { module } => write!(f, "module {} is not enabled", module),
        }
    }
}

/// A threshold that the policy moved away from what was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThresholdAdjustment {
    /// Threshold carried by the change.
    pub requested: u32,
    /// Threshold actually stored.
    pub applied: u32,
}

/// Result of replaying a [`ConfigChange`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    /// Whether any stored field changed.
    pub mutated: bool,
    /// Contradictions found along the way.
    pub mismatches: Vec<ConfigChangeMismatch>,
    /// Set when the threshold policy adjusted the requested threshold.
    pub threshold_adjusted: Option<ThresholdAdjustment>,
}

// ---------------------------------------------------------------------------
// TreasuryConfiguration
// ---------------------------------------------------------------------------

/// Validated configuration of one treasury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryConfiguration {
    signers: SignerSet,
    threshold: u32,
    modules: Vec<Address>,
    fallback_handler: Option<Address>,
    version: String,
    salt_nonce: WeiAmount,
    threshold_policy: ThresholdPolicy,
    updated_at: DateTime<Utc>,
    updated_by: Option<String>,
}

impl TreasuryConfiguration {
    /// Configuration with the given signers and threshold and every other
    /// field defaulted from `config`.
    pub fn new(signers: SignerSet, threshold: u32, config: &EngineConfig) -> EngineResult<Self> {
        if signers.is_empty() {
            return Err(EngineError::SignersEmpty);
        }
        check_threshold(threshold, signers.len())?;
        Ok(Self {
            signers,
            threshold,
            modules: Vec::new(),
            fallback_handler: None,
            version: config.default_safe_version.clone(),
            salt_nonce: WeiAmount::zero(),
            threshold_policy: config.default_threshold_policy,
            updated_at: Utc::now(),
            updated_by: None,
        })
    }

    // -- Accessors ----------------------------------------------------------

    /// Signers in on-chain list order.
    pub fn signers(&self) -> &SignerSet {
        &self.signers
    }

    /// Required signatures.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Enabled modules in on-chain list order.
    pub fn modules(&self) -> &[Address] {
        &self.modules
    }

    /// Fallback handler, if one is set.
    pub fn fallback_handler(&self) -> Option<&Address> {
        self.fallback_handler.as_ref()
    }

    /// Safe contract version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Deployment salt.
    pub fn salt_nonce(&self) -> &WeiAmount {
        &self.salt_nonce
    }

    /// Signer-removal threshold policy.
    pub fn threshold_policy(&self) -> ThresholdPolicy {
        self.threshold_policy
    }

    /// Time of the last mutation.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Actor responsible for the last mutation.
    pub fn updated_by(&self) -> Option<&str> {
        self.updated_by.as_deref()
    }

    // -- Validation ---------------------------------------------------------

    /// Non-throwing bulk validation. Returns every violated invariant; empty
    /// for a valid configuration.
    pub fn validate(&self) -> Vec<ConfigViolation> {
        self.to_draft().validate()
    }

    /// The configuration as an unvalidated draft.
    pub fn to_draft(&self) -> ConfigurationDraft {
        ConfigurationDraft {
            signers: self.signers.iter().map(ToString::to_string).collect(),
            threshold: u64::from(self.threshold),
            modules: self.modules.iter().map(ToString::to_string).collect(),
            fallback_handler: self.fallback_handler.as_ref().map(ToString::to_string),
            version: Some(self.version.clone()),
            salt_nonce: Some(self.salt_nonce.to_string()),
            threshold_policy: Some(self.threshold_policy),
        }
    }

    // -- Administrative edits -----------------------------------------------

    /// Sets the threshold. Values outside `[1, signers]` are rejected, never
    /// clamped.
    pub fn set_threshold(&mut self, threshold: u32, actor: &str) -> EngineResult<()> {
        check_threshold(threshold, self.signers.len())?;
        self.threshold = threshold;
        self.touch(actor);
        Ok(())
    }

    /// Changes the signer-removal policy.
    pub fn set_threshold_policy(&mut self, policy: ThresholdPolicy, actor: &str) {
        self.threshold_policy = policy;
        self.touch(actor);
    }

    /// Adds a signer at the head of the list, optionally changing the
    /// threshold in the same step. Returns `false` if already present.
    pub fn add_signer(
        &mut self,
        owner: Address,
        threshold: Option<u32>,
        actor: &str,
    ) -> EngineResult<bool> {
        let mut next = self.clone();
        let added = next.signers.add(owner)?;
        let requested = threshold.unwrap_or(next.threshold);
        check_threshold(requested, next.signers.len())?;
        next.threshold = requested;
        if added || next.threshold != self.threshold {
            next.touch(actor);
            *self = next;
        }
        Ok(added)
    }

    /// Removes a signer, optionally setting a new threshold. If the resulting
    /// threshold exceeds the remaining signers, the threshold policy decides.
    /// A zero threshold is rejected under either policy.
    pub fn remove_signer(
        &mut self,
        owner: &Address,
        threshold: Option<u32>,
        actor: &str,
    ) -> EngineResult<Address> {
        let mut next = self.clone();
        let removed = next.signers.remove(owner)?;
        let requested = threshold.unwrap_or(next.threshold);
        next.threshold = next.resolve_removal_threshold(requested)?;
        next.touch(actor);
        *self = next;
        Ok(removed)
    }

    /// Replaces `old` with `new` in place.
    pub fn swap_signer(&mut self, old: &Address, new: Address, actor: &str) -> EngineResult<()> {
        self.signers.swap(old, new)?;
        self.touch(actor);
        Ok(())
    }

    /// Replaces owners and threshold with what the chain reports. Returns
    /// whether anything changed. The chain's values are validated like any
    /// other input, so a provider returning garbage cannot corrupt state.
    pub fn adopt_onchain_state(
        &mut self,
        owners: Vec<Address>,
        threshold: u32,
        actor: &str,
    ) -> EngineResult<bool> {
        let signers = SignerSet::from_owners(owners)?;
        if signers.is_empty() {
            return Err(EngineError::SignersEmpty);
        }
        check_threshold(threshold, signers.len())?;
        if signers == self.signers && threshold == self.threshold {
            return Ok(false);
        }
        self.signers = signers;
        self.threshold = threshold;
        self.touch(actor);
        Ok(true)
    }

    // -- On-chain changes ---------------------------------------------------

    /// Replays a decoded on-chain change.
    ///
    /// Contradictions are skipped and reported in the outcome. The only
    /// errors are invariant violations (last signer removed, threshold out of
    /// range under [`ThresholdPolicy::Strict`], reserved address), in which
    /// case nothing is applied.
    pub fn apply_configuration_change(
        &mut self,
        change: &ConfigChange,
        actor: &str,
    ) -> EngineResult<ApplyOutcome> {
        let mut next = self.clone();
        let mut outcome = ApplyOutcome::default();

        match change {
            ConfigChange::AddOwner { owner, threshold } => {
                if next.signers.contains(owner) {
                    outcome.mismatches.push(ConfigChangeMismatch::OwnerAlreadyPresent {
                        owner: owner.clone(),
                    });
                } else {
                    next.signers.add(owner.clone())?;
                    check_threshold(*threshold, next.signers.len())?;
                    next.threshold = *threshold;
                }
            }

            ConfigChange::RemoveOwner {
                prev_owner,
                owner,
                threshold,
            } => {
                if !next.signers.contains(owner) {
                    outcome.mismatches.push(ConfigChangeMismatch::OwnerNotFound {
                        owner: owner.clone(),
                    });
                } else {
                    next.check_prev_owner(prev_owner, owner, &mut outcome)?;
                    next.signers.remove(owner)?;
                    next.apply_removal_threshold(*threshold, &mut outcome)?;
                }
            }

            ConfigChange::SwapOwner {
                prev_owner,
                old_owner,
                new_owner,
            } => {
                if !next.signers.contains(old_owner) {
                    outcome.mismatches.push(ConfigChangeMismatch::OwnerNotFound {
                        owner: old_owner.clone(),
                    });
                } else if next.signers.contains(new_owner) {
                    outcome
                        .mismatches
                        .push(ConfigChangeMismatch::NewOwnerAlreadyPresent {
                            owner: new_owner.clone(),
                        });
                } else {
                    next.check_prev_owner(prev_owner, old_owner, &mut outcome)?;
                    next.signers.swap(old_owner, new_owner.clone())?;
                }
            }

            ConfigChange::ChangeThreshold { threshold } => {
                check_threshold(*threshold, next.signers.len())?;
                next.threshold = *threshold;
            }

            ConfigChange::EnableModule { module } => {
                if module.is_reserved() {
                    return Err(EngineError::ReservedAddress {
                        address: module.to_string(),
                    });
                }
                if next.modules.contains(module) {
                    outcome.mismatches.push(ConfigChangeMismatch::ModuleAlreadyEnabled {
                        module: module.clone(),
                    });
                } else {
                    next.modules.insert(0, module.clone());
                }
            }

            ConfigChange::DisableModule {
                prev_module,
                module,
            } => match next.modules.iter().position(|m| m == module) {
                None => outcome.mismatches.push(ConfigChangeMismatch::ModuleNotEnabled {
                    module: module.clone(),
                }),
                Some(index) => {
                    let expected = match index {
                        0 => Address::sentinel(),
                        i => next.modules[i - 1].clone(),
                    };
                    if &expected != prev_module {
                        warn!(module = %module, expected = %expected, reported = %prev_module, "prevModule mismatch");
                    }
                    next.modules.remove(index);
                }
            },

            ConfigChange::SetFallbackHandler { handler } => {
                next.fallback_handler = Some(handler.clone()).filter(|h| !h.is_zero());
            }
        }

        outcome.mutated = next.signers != self.signers
            || next.threshold != self.threshold
            || next.modules != self.modules
            || next.fallback_handler != self.fallback_handler;

        for mismatch in &outcome.mismatches {
            warn!(change = %change, mismatch = %mismatch, "configuration change does not match off-chain state");
        }

        if outcome.mutated {
            next.touch(actor);
            *self = next;
            info!(
                change = %change,
                signers = self.signers.len(),
                threshold = self.threshold,
                "applied configuration change"
            );
        }

        Ok(outcome)
    }

    fn check_prev_owner(
        &self,
        reported: &Address,
        owner: &Address,
        outcome: &mut ApplyOutcome,
    ) -> EngineResult<()> {
        let expected = self.signers.previous_owner(owner)?;
        if &expected != reported {
            outcome
                .mismatches
                .push(ConfigChangeMismatch::PrevOwnerMismatch {
                    owner: owner.clone(),
                    expected,
                    reported: reported.clone(),
                });
        }
        Ok(())
    }

    fn apply_removal_threshold(
        &mut self,
        requested: u32,
        outcome: &mut ApplyOutcome,
    ) -> EngineResult<()> {
        let applied = self.resolve_removal_threshold(requested)?;
        if applied != requested {
            outcome.threshold_adjusted = Some(ThresholdAdjustment { requested, applied });
        }
        self.threshold = applied;
        Ok(())
    }

    /// Threshold to keep after a signer was removed. Only a value above the
    /// remaining signer count is lowered, and only under
    /// [`ThresholdPolicy::AutoAdjust`]. Zero is never valid.
    fn resolve_removal_threshold(&self, requested: u32) -> EngineResult<u32> {
        let signers = self.signers.len();
        let remaining = u32::try_from(signers).unwrap_or(u32::MAX);
        match self.threshold_policy {
            ThresholdPolicy::AutoAdjust if requested > remaining && remaining > 0 => Ok(remaining),
            _ => {
                check_threshold(requested, signers)?;
                Ok(requested)
            }
        }
    }

    fn touch(&mut self, actor: &str) {
        self.updated_at = Utc::now();
        self.updated_by = Some(actor.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        let mut raw = [0u8; 20];
        raw[0] = 0xc0;
        raw[19] = n;
        Address::from_bytes(raw)
    }

    fn config(signers: &[u8], threshold: u32, policy: ThresholdPolicy) -> TreasuryConfiguration {
        let set = SignerSet::from_owners(signers.iter().map(|n| addr(*n))).unwrap();
        let mut cfg = TreasuryConfiguration::new(set, threshold, &EngineConfig::default()).unwrap();
        cfg.set_threshold_policy(policy, "test");
        cfg
    }

    #[test]
    fn set_threshold_rejects_out_of_range() {
        let mut cfg = config(&[1, 2, 3], 2, ThresholdPolicy::Strict);
        let err = cfg.set_threshold(4, "admin").unwrap_err();
        assert_eq!(err.to_string(), "threshold 4 cannot exceed number of signers (3)");
        assert!(cfg.set_threshold(0, "admin").is_err());
        assert_eq!(cfg.threshold(), 2);

        cfg.set_threshold(3, "admin").unwrap();
        assert_eq!(cfg.threshold(), 3);
        assert_eq!(cfg.updated_by(), Some("admin"));
    }

    #[test]
    fn valid_configuration_has_no_violations() {
        let cfg = config(&[1, 2, 3], 2, ThresholdPolicy::Strict);
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn draft_reports_every_violation() {
        let mut draft = ConfigurationDraft::new(
            vec![
                "0x00000000000000000000000000000000000000aa".to_string(),
                "0x00000000000000000000000000000000000000AA".to_string(),
                "nope".to_string(),
                "0x0000000000000000000000000000000000000001".to_string(),
            ],
            5,
        );
        draft.modules = vec!["0x12".to_string()];
        draft.fallback_handler = Some("handler".to_string());
        draft.version = Some("  ".to_string());
        draft.salt_nonce = Some("-3".to_string());

        let violations = draft.validate();
        assert_eq!(
            violations,
            vec![
                ConfigViolation::DuplicateSigner {
                    address: "0x00000000000000000000000000000000000000aa".into()
                },
                ConfigViolation::InvalidAddress {
                    field: "signers[2]".into(),
                    value: "nope".into()
                },
                ConfigViolation::ReservedSigner {
                    address: "0x0000000000000000000000000000000000000001".into()
                },
                ConfigViolation::ThresholdOutOfRange {
                    threshold: 5,
                    signers: 4
                },
                ConfigViolation::InvalidAddress {
                    field: "modules[0]".into(),
                    value: "0x12".into()
                },
                ConfigViolation::InvalidAddress {
                    field: "fallback_handler".into(),
                    value: "handler".into()
                },
                ConfigViolation::EmptyVersion,
                ConfigViolation::InvalidSaltNonce { value: "-3".into() },
            ]
        );
    }

    #[test]
    fn empty_draft_reports_no_signers_and_threshold() {
        let violations = ConfigurationDraft::default().validate();
        assert_eq!(
            violations,
            vec![
                ConfigViolation::NoSigners,
                ConfigViolation::ThresholdOutOfRange {
                    threshold: 0,
                    signers: 0
                },
            ]
        );
    }

    #[test]
    fn draft_builds_with_defaults() {
        let draft = ConfigurationDraft::new(
            ["0x00000000000000000000000000000000000000A1", "0x00000000000000000000000000000000000000a2"],
            2,
        );
        let cfg = draft.build(&EngineConfig::default()).unwrap();
        assert_eq!(cfg.signers().len(), 2);
        assert_eq!(cfg.threshold(), 2);
        assert_eq!(cfg.version(), crate::config::DEFAULT_SAFE_VERSION);
        assert_eq!(cfg.threshold_policy(), ThresholdPolicy::Strict);
        assert_eq!(
            cfg.signers().as_slice()[0].to_string(),
            "0x00000000000000000000000000000000000000a1"
        );
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn remove_signer_respects_policy() {
        let mut strict = config(&[1, 2, 3], 3, ThresholdPolicy::Strict);
        let err = strict.remove_signer(&addr(3), None, "admin").unwrap_err();
        assert!(matches!(err, EngineError::ThresholdOutOfRange { threshold: 3, signers: 2 }));
        assert_eq!(strict.signers().len(), 3);

        strict.remove_signer(&addr(3), Some(2), "admin").unwrap();
        assert_eq!(strict.signers().len(), 2);
        assert_eq!(strict.threshold(), 2);

        let mut auto = config(&[1, 2, 3], 3, ThresholdPolicy::AutoAdjust);
        auto.remove_signer(&addr(3), None, "admin").unwrap();
        assert_eq!(auto.threshold(), 2);
    }

    #[test]
    fn remove_signer_never_accepts_zero_threshold() {
        for policy in [ThresholdPolicy::Strict, ThresholdPolicy::AutoAdjust] {
            let mut cfg = config(&[1, 2, 3], 2, policy);
            let before = cfg.clone();
            let err = cfg.remove_signer(&addr(3), Some(0), "admin").unwrap_err();
            assert!(matches!(err, EngineError::ThresholdOutOfRange { threshold: 0, signers: 2 }));
            assert_eq!(cfg, before);
        }
    }

    #[test]
    fn auto_adjust_only_lowers_removal_thresholds() {
        let mut cfg = config(&[1, 2, 3], 2, ThresholdPolicy::AutoAdjust);
        let before = cfg.clone();

        for change in [
            ConfigChange::ChangeThreshold { threshold: 9 },
            ConfigChange::ChangeThreshold { threshold: 0 },
            ConfigChange::AddOwner { owner: addr(4), threshold: 5 },
            ConfigChange::AddOwner { owner: addr(4), threshold: 0 },
            ConfigChange::RemoveOwner {
                prev_owner: addr(2),
                owner: addr(3),
                threshold: 0,
            },
        ] {
            let err = cfg.apply_configuration_change(&change, "chain").unwrap_err();
            assert!(
                matches!(err, EngineError::ThresholdOutOfRange { .. }),
                "{}: {:?}",
                change,
                err
            );
            assert_eq!(cfg, before);
        }
    }

    #[test]
    fn apply_remove_owner_with_valid_threshold() {
        let mut cfg = config(&[3, 1, 2], 3, ThresholdPolicy::Strict);
        let change = ConfigChange::RemoveOwner {
            prev_owner: Address::sentinel(),
            owner: addr(3),
            threshold: 1,
        };
        let outcome = cfg.apply_configuration_change(&change, "chain").unwrap();
        assert!(outcome.mutated);
        assert!(outcome.mismatches.is_empty());
        assert_eq!(cfg.signers().as_slice(), &[addr(1), addr(2)]);
        assert_eq!(cfg.threshold(), 1);
    }

    #[test]
    fn apply_remove_owner_leaving_threshold_too_high() {
        let change = ConfigChange::RemoveOwner {
            prev_owner: Address::sentinel(),
            owner: addr(3),
            threshold: 3,
        };

        let mut strict = config(&[3, 1, 2], 3, ThresholdPolicy::Strict);
        let before = strict.clone();
        let err = strict.apply_configuration_change(&change, "chain").unwrap_err();
        assert!(matches!(err, EngineError::ThresholdOutOfRange { threshold: 3, signers: 2 }));
        assert_eq!(strict, before);

        let mut auto = config(&[3, 1, 2], 3, ThresholdPolicy::AutoAdjust);
        let outcome = auto.apply_configuration_change(&change, "chain").unwrap();
        assert_eq!(auto.threshold(), 2);
        assert_eq!(
            outcome.threshold_adjusted,
            Some(ThresholdAdjustment {
                requested: 3,
                applied: 2
            })
        );
    }

    #[test]
    fn apply_contradicting_change_is_a_reported_no_op() {
        let mut cfg = config(&[1, 2], 1, ThresholdPolicy::Strict);
        let before = cfg.clone();

        let outcome = cfg
            .apply_configuration_change(
                &ConfigChange::RemoveOwner {
                    prev_owner: Address::sentinel(),
                    owner: addr(9),
                    threshold: 1,
                },
                "chain",
            )
            .unwrap();
        assert!(!outcome.mutated);
        assert_eq!(
            outcome.mismatches,
            vec![ConfigChangeMismatch::OwnerNotFound { owner: addr(9) }]
        );
        assert_eq!(cfg, before);

        let outcome = cfg
            .apply_configuration_change(
                &ConfigChange::AddOwner {
                    owner: addr(1),
                    threshold: 2,
                },
                "chain",
            )
            .unwrap();
        assert!(!outcome.mutated);
        assert_eq!(cfg, before);
    }

    #[test]
    fn apply_prev_owner_drift_still_removes() {
        let mut cfg = config(&[1, 2, 3], 1, ThresholdPolicy::Strict);
        let outcome = cfg
            .apply_configuration_change(
                &ConfigChange::RemoveOwner {
                    prev_owner: Address::sentinel(),
                    owner: addr(3),
                    threshold: 1,
                },
                "chain",
            )
            .unwrap();
        assert!(outcome.mutated);
        assert_eq!(
            outcome.mismatches,
            vec![ConfigChangeMismatch::PrevOwnerMismatch {
                owner: addr(3),
                expected: addr(2),
                reported: Address::sentinel(),
            }]
        );
        assert!(!cfg.signers().contains(&addr(3)));
    }

    #[test]
    fn apply_add_swap_and_threshold() {
        let mut cfg = config(&[1, 2], 1, ThresholdPolicy::Strict);

        cfg.apply_configuration_change(&ConfigChange::AddOwner { owner: addr(3), threshold: 2 }, "chain")
            .unwrap();
        assert_eq!(cfg.signers().as_slice(), &[addr(3), addr(1), addr(2)]);
        assert_eq!(cfg.threshold(), 2);

        cfg.apply_configuration_change(
            &ConfigChange::SwapOwner {
                prev_owner: addr(3),
                old_owner: addr(1),
                new_owner: addr(4),
            },
            "chain",
        )
        .unwrap();
        assert_eq!(cfg.signers().as_slice(), &[addr(3), addr(4), addr(2)]);

        let outcome = cfg
            .apply_configuration_change(&ConfigChange::ChangeThreshold { threshold: 2 }, "chain")
            .unwrap();
        assert!(!outcome.mutated);

        assert!(cfg
            .apply_configuration_change(&ConfigChange::ChangeThreshold { threshold: 4 }, "chain")
            .is_err());
    }

    #[test]
    fn apply_module_and_fallback_changes() {
        let mut cfg = config(&[1], 1, ThresholdPolicy::Strict);
        cfg.apply_configuration_change(&ConfigChange::EnableModule { module: addr(10) }, "chain")
            .unwrap();
        cfg.apply_configuration_change(&ConfigChange::EnableModule { module: addr(11) }, "chain")
            .unwrap();
        assert_eq!(cfg.modules(), &[addr(11), addr(10)]);

        cfg.apply_configuration_change(
            &ConfigChange::DisableModule {
                prev_module: addr(11),
                module: addr(10),
            },
            "chain",
        )
        .unwrap();
        assert_eq!(cfg.modules(), &[addr(11)]);

        cfg.apply_configuration_change(&ConfigChange::SetFallbackHandler { handler: addr(12) }, "chain")
            .unwrap();
        assert_eq!(cfg.fallback_handler(), Some(&addr(12)));
        cfg.apply_configuration_change(
            &ConfigChange::SetFallbackHandler {
                handler: Address::zero(),
            },
            "chain",
        )
        .unwrap();
        assert_eq!(cfg.fallback_handler(), None);
    }

    #[test]
    fn adopt_onchain_state_replaces_owners() {
        let mut cfg = config(&[1, 2], 1, ThresholdPolicy::Strict);
        assert!(!cfg.adopt_onchain_state(vec![addr(1), addr(2)], 1, "chain").unwrap());
        assert!(cfg.adopt_onchain_state(vec![addr(2), addr(5)], 2, "chain").unwrap());
        assert_eq!(cfg.signers().as_slice(), &[addr(2), addr(5)]);
        assert_eq!(cfg.threshold(), 2);
        assert!(cfg.adopt_onchain_state(vec![addr(2)], 2, "chain").is_err());
    }
}
