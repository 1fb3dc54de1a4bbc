//! # Cache Invalidation
//!
//! The engine doesn't cache anything itself. It tells a [`CacheSink`] which
//! views went stale, as opaque keys:
//!
//! | Key                     | View                                   |
//! |-------------------------|----------------------------------------|
//! | `treasury:<id>`         | the treasury's own page                |
//! | `account-list:<account>`| the list of treasuries an account sees |
//!
//! After a signer change the key set covers the owner plus the union of
//! the signer sets before and after. A removed signer must stop seeing the
//! treasury, an added one must start seeing it.

use std::collections::BTreeSet;
use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::safe::signers::SignerSet;

/// One stale view.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub enum InvalidationKey {
    /// A treasury's own view.
    Treasury(Uuid),
    /// An account's treasury list.
    AccountList(String),
}

impl fmt::Display for InvalidationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Treasury(id) => write!(f, "treasury:{}", id),
            Self::AccountList(account) => write!(f, "account-list:{}", account),
        }
    }
}

impl From<InvalidationKey> for String {
    fn from(key: InvalidationKey) -> Self {
        key.to_string()
    }
}

/// The key set for a change to treasury `treasury_id` owned by `owner`
/// whose signers went from `before` to `after`. Pass the same set twice
/// when signers did not change.
pub fn invalidation_keys(
    treasury_id: Uuid,
    owner: &str,
    before: &SignerSet,
    after: &SignerSet,
) -> BTreeSet<InvalidationKey> {
    let mut keys = BTreeSet::new();
    keys.insert(InvalidationKey::Treasury(treasury_id));
    keys.insert(InvalidationKey::AccountList(owner.to_string()));
    for signer in before.iter().chain(after.iter()) {
        keys.insert(InvalidationKey::AccountList(signer.to_string()));
    }
    keys
}

/// Receiver of invalidation keys.
pub trait CacheSink: Send + Sync {
    /// Marks every view in `keys` stale.
    fn invalidate(&self, keys: &BTreeSet<InvalidationKey>);
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl CacheSink for NoopSink {
    fn invalidate(&self, _keys: &BTreeSet<InvalidationKey>) {}
}

/// Sink that remembers every batch it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<BTreeSet<InvalidationKey>>>,
}

impl RecordingSink {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches in arrival order.
    pub fn batches(&self) -> Vec<BTreeSet<InvalidationKey>> {
        self.batches.lock().clone()
    }

    /// The most recent batch.
    pub fn last(&self) -> Option<BTreeSet<InvalidationKey>> {
        self.batches.lock().last().cloned()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.batches.lock().clear();
    }
}

impl CacheSink for RecordingSink {
    fn invalidate(&self, keys: &BTreeSet<InvalidationKey>) {
        self.batches.lock().push(keys.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::address::Address;

    fn addr(n: u8) -> Address {
        Address::from_bytes([n; 20])
    }

    #[test]
    fn keys_cover_union_of_signers_and_owner() {
        let id = Uuid::new_v4();
        let before = SignerSet::from_owners([addr(1), addr(2), addr(3)]).unwrap();
        let after = SignerSet::from_owners([addr(1), addr(2), addr(4)]).unwrap();

        let keys = invalidation_keys(id, "alice", &before, &after);
        assert_eq!(keys.len(), 1 + 1 + 4);
        assert!(keys.contains(&InvalidationKey::Treasury(id)));
        assert!(keys.contains(&InvalidationKey::AccountList("alice".into())));
        assert!(keys.contains(&InvalidationKey::AccountList(addr(3).to_string())));
        assert!(keys.contains(&InvalidationKey::AccountList(addr(4).to_string())));
    }

    #[test]
    fn key_rendering() {
        let id = Uuid::nil();
        assert_eq!(
            InvalidationKey::Treasury(id).to_string(),
            "treasury:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(
            InvalidationKey::AccountList("bob".into()).to_string(),
            "account-list:bob"
        );
    }

    #[test]
    fn recording_sink_keeps_batches() {
        let sink = RecordingSink::new();
        let set = SignerSet::from_owners([addr(1)]).unwrap();
        sink.invalidate(&invalidation_keys(Uuid::nil(), "alice", &set, &set));
        sink.invalidate(&BTreeSet::new());
        assert_eq!(sink.batches().len(), 2);
        assert!(sink.last().unwrap().is_empty());
        sink.clear();
        assert!(sink.batches().is_empty());
    }
}
