//! The unit of atomic read-modify-write: one treasury with its configuration
//! and every transaction that references it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::address::normalize;
use crate::error::{EngineError, EngineResult};
use crate::safe::configuration::TreasuryConfiguration;
use crate::safe::treasury::Treasury;
use crate::transaction::types::Transaction;

/// A treasury aggregate as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryRecord {
    /// Identity and lifecycle.
    pub treasury: Treasury,
    /// Signers, threshold, modules.
    pub configuration: TreasuryConfiguration,
    /// Transactions in creation order.
    pub transactions: Vec<Transaction>,
}

impl TreasuryRecord {
    /// A record with no transactions yet.
    pub fn new(treasury: Treasury, configuration: TreasuryConfiguration) -> Self {
        Self {
            treasury,
            configuration,
            transactions: Vec::new(),
        }
    }

    /// Treasury id.
    pub fn id(&self) -> Uuid {
        self.treasury.id
    }

    /// Looks up a transaction by id.
    pub fn transaction(&self, id: Uuid) -> EngineResult<&Transaction> {
        self.transactions
            .iter()
            .find(|tx| tx.id == id)
            .ok_or(EngineError::TransactionNotFound(id))
    }

    /// Mutable lookup by id.
    pub fn transaction_mut(&mut self, id: Uuid) -> EngineResult<&mut Transaction> {
        self.transactions
            .iter_mut()
            .find(|tx| tx.id == id)
            .ok_or(EngineError::TransactionNotFound(id))
    }

    /// Whether `account` should see this treasury in their list: the owner
    /// and every current signer do. Address-shaped ids match in any casing.
    pub fn is_visible_to(&self, account: &str) -> bool {
        self.owner_key() == account_key(account)
            || self.configuration.signers().contains_str(account)
    }

    /// Account-list key for the owner.
    pub(crate) fn owner_key(&self) -> String {
        account_key(&self.treasury.owner)
    }
}

/// Owners are opaque account ids; when they happen to be addresses the key
/// uses the normalized form.
fn account_key(account: &str) -> String {
    if crate::codec::is_valid_address(account) {
        normalize(account)
    } else {
        account.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Address;
    use crate::config::EngineConfig;
    use crate::safe::signers::SignerSet;

    fn record(owner: &str) -> TreasuryRecord {
        let signer = Address::parse("signer", "0x00000000000000000000000000000000000000b1").unwrap();
        let signers = SignerSet::from_owners(vec![signer]).unwrap();
        let configuration =
            TreasuryConfiguration::new(signers, 1, &EngineConfig::default()).unwrap();
        TreasuryRecord::new(Treasury::new(owner, 11155111), configuration)
    }

    #[test]
    fn address_owner_is_visible_in_any_casing() {
        let record = record("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
        assert!(record.is_visible_to("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
        assert!(record.is_visible_to("0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED"));
        assert!(record.is_visible_to("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"));
        assert_eq!(record.owner_key(), "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");
    }

    #[test]
    fn opaque_owner_matches_exactly() {
        let record = record("Alice");
        assert!(record.is_visible_to("Alice"));
        assert!(!record.is_visible_to("alice"));
    }

    #[test]
    fn signers_see_the_treasury() {
        let record = record("alice");
        assert!(record.is_visible_to("0x00000000000000000000000000000000000000B1"));
        assert!(!record.is_visible_to("0x00000000000000000000000000000000000000b2"));
    }
}
