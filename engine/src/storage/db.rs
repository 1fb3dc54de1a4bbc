//! # SledStore — Persistent Treasury Storage
//!
//! Treasury records on sled's embedded key-value store.
//!
//! ## Tree Layout
//!
//! | Tree         | Key                 | Value                    |
//! |--------------|---------------------|--------------------------|
//! | `treasuries` | treasury id (16B)   | `bincode(TreasuryRecord)` |
//!
//! A record carries its configuration and transactions, so one `insert`
//! under one key is the whole write. sled makes the single-key write atomic;
//! the per-id mutex makes the read-modify-write around it atomic.

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use sled::{Db, Tree};
use uuid::Uuid;

use super::{TreasuryRecord, TreasuryStore};
use crate::error::{EngineError, EngineResult};

/// Persistent [`TreasuryStore`] backed by sled.
///
/// sled handles are cheap to clone and thread-safe; the lock table is shared
/// between clones so they serialize updates against each other.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    treasuries: Tree,
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SledStore {
    /// Open or create a store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let db = sled::open(path).map_err(EngineError::storage)?;
        Self::from_db(db)
    }

    /// Create a store that lives in a temporary directory and is removed
    /// when the last handle is dropped.
    pub fn open_temporary() -> EngineResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(EngineError::storage)?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> EngineResult<Self> {
        let treasuries = db.open_tree("treasuries").map_err(EngineError::storage)?;
        Ok(Self {
            db,
            treasuries,
            locks: Arc::new(DashMap::new()),
        })
    }

    /// Force pending writes to disk.
    pub fn flush(&self) -> EngineResult<()> {
        self.db.flush().map_err(EngineError::storage)?;
        Ok(())
    }

    /// Number of treasuries stored.
    pub fn treasury_count(&self) -> usize {
        self.treasuries.len()
    }

    fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(id).or_default().value())
    }

    fn get(&self, id: Uuid) -> EngineResult<TreasuryRecord> {
        let bytes = self
            .treasuries
            .get(id.as_bytes())
            .map_err(EngineError::storage)?
            .ok_or(EngineError::TreasuryNotFound(id))?;
        bincode::deserialize(&bytes).map_err(EngineError::storage)
    }

    fn put(&self, record: &TreasuryRecord) -> EngineResult<()> {
        let bytes = bincode::serialize(record).map_err(EngineError::storage)?;
        self.treasuries
            .insert(record.id().as_bytes(), bytes)
            .map_err(EngineError::storage)?;
        Ok(())
    }
}

impl TreasuryStore for SledStore {
    fn insert(&self, record: TreasuryRecord) -> EngineResult<()> {
        let id = record.id();
        let lock = self.lock_for(id);
        let _guard = lock.lock();
        if self
            .treasuries
            .contains_key(id.as_bytes())
            .map_err(EngineError::storage)?
        {
            return Err(EngineError::Storage(format!("treasury {} already exists", id)));
        }
        self.put(&record)
    }

    fn load(&self, id: Uuid) -> EngineResult<TreasuryRecord> {
        self.get(id)
    }

    fn list(&self) -> EngineResult<Vec<TreasuryRecord>> {
        self.treasuries
            .iter()
            .values()
            .map(|bytes| {
                let bytes = bytes.map_err(EngineError::storage)?;
                bincode::deserialize(&bytes).map_err(EngineError::storage)
            })
            .collect()
    }

    fn update_with(
        &self,
        id: Uuid,
        f: &mut dyn FnMut(&mut TreasuryRecord) -> EngineResult<()>,
    ) -> EngineResult<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();
        let mut working = self.get(id)?;
        f(&mut working)?;
        self.put(&working)
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
        let configuration = ConfigurationDraft::new(
            [
                "0x00000000000000000000000000000000000000a1",
                "0x00000000000000000000000000000000000000a2",
            ],
            2,
        )
        .build(&EngineConfig::default())
        .unwrap();
        TreasuryRecord::new(Treasury::new("alice", 11_155_111), configuration)
    }

    #[test]
    fn open_temporary_store() {
        let store = SledStore::open_temporary().unwrap();
        assert_eq!(store.treasury_count(), 0);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn record_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let record = record();
        let id = record.id();
        {
            let store = SledStore::open(dir.path()).unwrap();
            store.insert(record.clone()).unwrap();
            store.flush().unwrap();
        }
        let store = SledStore::open(dir.path()).unwrap();
        assert_eq!(store.load(id).unwrap(), record);
    }

    #[test]
    fn update_commits_only_on_success() {
        let store = SledStore::open_temporary().unwrap();
        let record = record();
        let id = record.id();
        store.insert(record.clone()).unwrap();

        let result: EngineResult<()> = store.update(id, |r| {
            r.treasury.begin_deployment()?;
            Err(EngineError::SignersEmpty)
        });
        assert!(result.is_err());
        assert_eq!(store.load(id).unwrap(), record);

        store.update(id, |r| r.treasury.begin_deployment()).unwrap();
        assert_eq!(
            store.load(id).unwrap().treasury.status(),
            crate::safe::treasury::TreasuryStatus::Deploying
        );
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let store = SledStore::open_temporary().unwrap();
        let record = record();
        store.insert(record.clone()).unwrap();
        assert!(matches!(store.insert(record), Err(EngineError::Storage(_))));
    }
}
