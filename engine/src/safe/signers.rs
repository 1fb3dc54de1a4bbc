//! # Signer Set
//!
//! The Safe contract keeps its owners in a singly linked list threaded
//! through a mapping, with a sentinel (`0x…01`) as the head:
//!
//! ```text
//! SENTINEL -> owner[0] -> owner[1] -> ... -> owner[n-1] -> SENTINEL
//! ```
//!
//! `getOwners()` walks that list, and `removeOwner`/`swapOwner` need the
//! caller to pass the node *before* the target (`prevOwner`) because a
//! singly linked list cannot find it on its own. Get that argument wrong and
//! the transaction reverts on-chain after everyone has already signed it.
//!
//! [`SignerSet`] mirrors the list as a plain `Vec` in list order:
//!
//! - `setup(owners)` links them in the given order → [`SignerSet::from_owners`]
//! - `addOwnerWithThreshold` links the new owner right after the sentinel →
//!   [`SignerSet::add`] inserts at index 0
//! - `removeOwner` unlinks in place → [`SignerSet::remove`]
//! - `swapOwner` replaces the node in place → [`SignerSet::swap`]
//!
//! The vector is never sorted or deduplicated by anything other than these
//! operations. Its order *is* the on-chain order.

use serde::{Deserialize, Serialize};

use crate::codec::address::Address;
use crate::error::{EngineError, EngineResult};
use crate::safe::decoder::ConfigChange;

/// Owner addresses in on-chain linked-list order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSet {
    owners: Vec<Address>,
}

impl SignerSet {
    /// An empty set. Not a valid configuration on its own.
    pub fn new() -> Self {
        Self { owners: Vec::new() }
    }

    /// Builds a set in `setup()` order. Duplicates and reserved addresses
    /// are rejected, exactly as the contract would revert on them.
    pub fn from_owners(owners: impl IntoIterator<Item = Address>) -> EngineResult<Self> {
        let mut set = Self::new();
        for owner in owners {
            ensure_not_reserved(&owner)?;
            if set.contains(&owner) {
                return Err(EngineError::DuplicateOwner {
                    address: owner.to_string(),
                });
            }
            set.owners.push(owner);
        }
        Ok(set)
    }

    /// Links `owner` right after the sentinel. Adding an existing owner is a
    /// no-op and returns `Ok(false)`.
    pub fn add(&mut self, owner: Address) -> EngineResult<bool> {
        ensure_not_reserved(&owner)?;
        if self.contains(&owner) {
            return Ok(false);
        }
        self.owners.insert(0, owner);
        Ok(true)
    }

    /// Unlinks `owner` and returns it.
    ///
    /// # Errors
    ///
    /// [`EngineError::SignerNotFound`] if absent, [`EngineError::SignersEmpty`]
    /// if it is the last owner. The caller still has to re-check the
    /// threshold against the smaller set.
    pub fn remove(&mut self, owner: &Address) -> EngineResult<Address> {
        let index = self.position(owner)?;
        if self.owners.len() == 1 {
            return Err(EngineError::SignersEmpty);
        }
        Ok(self.owners.remove(index))
    }

    /// Replaces `old` with `new` at the same list position.
    pub fn swap(&mut self, old: &Address, new: Address) -> EngineResult<()> {
        ensure_not_reserved(&new)?;
        let index = self.position(old)?;
        if self.contains(&new) {
            return Err(EngineError::DuplicateOwner {
                address: new.to_string(),
            });
        }
        self.owners[index] = new;
        Ok(())
    }

    /// The node linking to `owner`: its predecessor, or the sentinel when
    /// `owner` is first.
    pub fn previous_owner(&self, owner: &Address) -> EngineResult<Address> {
        let index = self.position(owner)?;
        Ok(match index {
            0 => Address::sentinel(),
            i => self.owners[i - 1].clone(),
        })
    }

    /// Membership test.
    pub fn contains(&self, owner: &Address) -> bool {
        self.owners.iter().any(|o| o == owner)
    }

    /// Case-insensitive membership test on a raw string. Malformed input is
    /// simply not a member.
    pub fn contains_str(&self, raw: &str) -> bool {
        Address::parse("signer", raw)
            .map(|needle| self.contains(&needle))
            .unwrap_or(false)
    }

    /// Number of owners.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// `true` when there are no owners.
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Owners in list order.
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.owners.iter()
    }

    /// Owners in list order, as a slice.
    pub fn as_slice(&self) -> &[Address] {
        &self.owners
    }

    /// The `removeOwner` call for `owner`, with `prevOwner` filled in.
    pub fn remove_owner_change(&self, owner: &Address, threshold: u32) -> EngineResult<ConfigChange> {
        Ok(ConfigChange::RemoveOwner {
            prev_owner: self.previous_owner(owner)?,
            owner: owner.clone(),
            threshold,
        })
    }

    /// The `swapOwner` call replacing `old` with `new`, with `prevOwner`
    /// filled in.
    pub fn swap_owner_change(&self, old: &Address, new: &Address) -> EngineResult<ConfigChange> {
        if self.contains(new) {
            return Err(EngineError::DuplicateOwner {
                address: new.to_string(),
            });
        }
        Ok(ConfigChange::SwapOwner {
            prev_owner: self.previous_owner(old)?,
            old_owner: old.clone(),
            new_owner: new.clone(),
        })
    }

    fn position(&self, owner: &Address) -> EngineResult<usize> {
        self.owners
            .iter()
            .position(|o| o == owner)
            .ok_or_else(|| EngineError::SignerNotFound {
                address: owner.to_string(),
            })
    }
}

fn ensure_not_reserved(owner: &Address) -> EngineResult<()> {
    if owner.is_reserved() {
        return Err(EngineError::ReservedAddress {
            address: owner.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn addr(n: u8) -> Address {
        let mut raw = [0u8; 20];
        raw[0] = 0xa0;
        raw[19] = n;
        Address::from_bytes(raw)
    }

    /// Straight port of the contract's OwnerManager storage: a mapping from
    /// each node to the next, with the sentinel as head and tail.
    struct OnChainOwners {
        next: HashMap<Address, Address>,
    }

    impl OnChainOwners {
        fn setup(owners: &[Address]) -> Self {
            let mut next = HashMap::new();
            let mut current = Address::sentinel();
            for owner in owners {
                next.insert(current, owner.clone());
                current = owner.clone();
            }
            next.insert(current, Address::sentinel());
            Self { next }
        }

        fn add(&mut self, owner: &Address) {
            let head = self.next[&Address::sentinel()].clone();
            self.next.insert(owner.clone(), head);
            self.next.insert(Address::sentinel(), owner.clone());
        }

        fn remove(&mut self, prev: &Address, owner: &Address) {
            assert_eq!(&self.next[prev], owner, "contract would revert: bad prevOwner");
            let after = self.next.remove(owner).unwrap();
            self.next.insert(prev.clone(), after);
        }

        fn swap(&mut self, prev: &Address, old: &Address, new: &Address) {
            assert_eq!(&self.next[prev], old, "contract would revert: bad prevOwner");
            let after = self.next.remove(old).unwrap();
            self.next.insert(new.clone(), after);
            self.next.insert(prev.clone(), new.clone());
        }

        fn owners(&self) -> Vec<Address> {
            let mut out = Vec::new();
            let mut current = self.next[&Address::sentinel()].clone();
            while !current.is_sentinel() {
                out.push(current.clone());
                current = self.next[&current].clone();
            }
            out
        }
    }

    #[test]
    fn setup_preserves_order() {
        let set = SignerSet::from_owners([addr(1), addr(2), addr(3)]).unwrap();
        assert_eq!(set.as_slice(), &[addr(1), addr(2), addr(3)]);
    }

    #[test]
    fn setup_rejects_duplicates_and_reserved() {
        assert!(matches!(
            SignerSet::from_owners([addr(1), addr(1)]),
            Err(EngineError::DuplicateOwner { .. })
        ));
        assert!(matches!(
            SignerSet::from_owners([Address::sentinel()]),
            Err(EngineError::ReservedAddress { .. })
        ));
        assert!(matches!(
            SignerSet::from_owners([Address::zero()]),
            Err(EngineError::ReservedAddress { .. })
        ));
    }

    #[test]
    fn add_inserts_at_head_and_is_idempotent() {
        let mut set = SignerSet::from_owners([addr(1), addr(2)]).unwrap();
        assert!(set.add(addr(3)).unwrap());
        let once = set.clone();
        assert!(!set.add(addr(3)).unwrap());
        assert_eq!(set, once);
        assert_eq!(set.as_slice(), &[addr(3), addr(1), addr(2)]);
    }

    #[test]
    fn previous_owner_uses_sentinel_for_head() {
        let set = SignerSet::from_owners([addr(1), addr(2), addr(3)]).unwrap();
        assert_eq!(set.previous_owner(&addr(1)).unwrap(), Address::sentinel());
        assert_eq!(set.previous_owner(&addr(2)).unwrap(), addr(1));
        assert_eq!(set.previous_owner(&addr(3)).unwrap(), addr(2));
        assert!(matches!(
            set.previous_owner(&addr(9)),
            Err(EngineError::SignerNotFound { .. })
        ));
    }

    #[test]
    fn remove_missing_and_last() {
        let mut set = SignerSet::from_owners([addr(1)]).unwrap();
        assert!(matches!(
            set.remove(&addr(2)),
            Err(EngineError::SignerNotFound { .. })
        ));
        assert_eq!(set.remove(&addr(1)), Err(EngineError::SignersEmpty));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn swap_keeps_position() {
        let mut set = SignerSet::from_owners([addr(1), addr(2), addr(3)]).unwrap();
        set.swap(&addr(2), addr(7)).unwrap();
        assert_eq!(set.as_slice(), &[addr(1), addr(7), addr(3)]);
        assert!(matches!(
            set.swap(&addr(1), addr(3)),
            Err(EngineError::DuplicateOwner { .. })
        ));
    }

    #[test]
    fn contains_is_case_insensitive() {
        let owner = Address::parse("o", "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        let set = SignerSet::from_owners([owner]).unwrap();
        assert!(set.contains_str("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert!(!set.contains_str("not-an-address"));
    }

    #[test]
    fn mirrors_contract_list_through_mixed_operations() {
        let initial = [addr(1), addr(2), addr(3)];
        let mut chain = OnChainOwners::setup(&initial);
        let mut set = SignerSet::from_owners(initial.clone()).unwrap();

        // add, add, remove middle, swap head, remove tail, add again
        for n in [4u8, 5] {
            chain.add(&addr(n));
            set.add(addr(n)).unwrap();
            assert_eq!(set.as_slice(), chain.owners().as_slice());
        }

        let prev = set.previous_owner(&addr(1)).unwrap();
        chain.remove(&prev, &addr(1));
        set.remove(&addr(1)).unwrap();
        assert_eq!(set.as_slice(), chain.owners().as_slice());

        let head = set.as_slice()[0].clone();
        let prev = set.previous_owner(&head).unwrap();
        assert!(prev.is_sentinel());
        chain.swap(&prev, &head, &addr(6));
        set.swap(&head, addr(6)).unwrap();
        assert_eq!(set.as_slice(), chain.owners().as_slice());

        let tail = set.as_slice().last().unwrap().clone();
        let prev = set.previous_owner(&tail).unwrap();
        chain.remove(&prev, &tail);
        set.remove(&tail).unwrap();
        assert_eq!(set.as_slice(), chain.owners().as_slice());

        chain.add(&addr(1));
        set.add(addr(1)).unwrap();
        assert_eq!(set.as_slice(), chain.owners().as_slice());

        // Every prevOwner we compute must be accepted by the contract.
        for owner in set.as_slice().to_vec() {
            let prev = set.previous_owner(&owner).unwrap();
            assert_eq!(chain.next[&prev], owner);
        }
    }

    #[test]
    fn remove_owner_change_carries_prev_owner() {
        let set = SignerSet::from_owners([addr(1), addr(2), addr(3)]).unwrap();
        let change = set.remove_owner_change(&addr(3), 1).unwrap();
        assert_eq!(
            change,
            ConfigChange::RemoveOwner {
                prev_owner: addr(2),
                owner: addr(3),
                threshold: 1,
            }
        );
    }
}
