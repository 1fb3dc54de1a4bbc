//! In-memory [`TreasuryStore`].

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use uuid::Uuid;

use super::{TreasuryRecord, TreasuryStore};
use crate::error::{EngineError, EngineResult};

/// Records held in a `DashMap`, each behind its own mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<Uuid, Arc<Mutex<TreasuryRecord>>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of treasuries stored.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn slot(&self, id: Uuid) -> EngineResult<Arc<Mutex<TreasuryRecord>>> {
        // Clone the Arc so the shard lock is released before we block on the
        // record's own mutex.
        self.records
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(EngineError::TreasuryNotFound(id))
    }
}

impl TreasuryStore for MemoryStore {
    fn insert(&self, record: TreasuryRecord) -> EngineResult<()> {
        let id = record.id();
        match self.records.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(EngineError::Storage(format!("treasury {} already exists", id)))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(record)));
                Ok(())
            }
        }
    }

    fn load(&self, id: Uuid) -> EngineResult<TreasuryRecord> {
        Ok(self.slot(id)?.lock().clone())
    }

    fn list(&self) -> EngineResult<Vec<TreasuryRecord>> {
        let slots: Vec<_> = self
            .records
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        Ok(slots.iter().map(|slot| slot.lock().clone()).collect())
    }

    fn update_with(
        &self,
        id: Uuid,
        f: &mut dyn FnMut(&mut TreasuryRecord) -> EngineResult<()>,
    ) -> EngineResult<()> {
        let slot = self.slot(id)?;
        let mut guard = slot.lock();
        let mut working = guard.clone();
        f(&mut working)?;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::safe::configuration::ConfigurationDraft;
    use crate::safe::treasury::Treasury;
    use crate::storage::TreasuryStoreExt;

    fn record() -> TreasuryRecord {
        let configuration = ConfigurationDraft::new(["0x00000000000000000000000000000000000000a1"], 1)
            .build(&EngineConfig::default())
            .unwrap();
        TreasuryRecord::new(Treasury::new("alice", 1), configuration)
    }

    #[test]
    fn insert_and_load() {
        let store = MemoryStore::new();
        let record = record();
        let id = record.id();
        store.insert(record.clone()).unwrap();
        assert_eq!(store.load(id).unwrap(), record);
        assert!(store.insert(record).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn failed_update_leaves_record_untouched() {
        let store = MemoryStore::new();
        let record = record();
        let id = record.id();
        store.insert(record.clone()).unwrap();

        let result: EngineResult<()> = store.update(id, |r| {
            r.treasury.owner = "mallory".into();
            Err(EngineError::SignersEmpty)
        });
        assert!(result.is_err());
        assert_eq!(store.load(id).unwrap(), record);

        let owner = store
            .update(id, |r| {
                r.treasury.owner = "bob".into();
                Ok(r.treasury.owner.clone())
            })
            .unwrap();
        assert_eq!(owner, "bob");
        assert_eq!(store.load(id).unwrap().treasury.owner, "bob");
    }

    #[test]
    fn unknown_id_is_not_found() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.load(id).unwrap_err(), EngineError::TreasuryNotFound(id));
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let store = Arc::new(MemoryStore::new());
        let record = record();
        let id = record.id();
        store.insert(record).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store
                            .update(id, |r| {
                                r.treasury.network += 1;
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.load(id).unwrap().treasury.network, 1 + 8 * 50);
    }
}
