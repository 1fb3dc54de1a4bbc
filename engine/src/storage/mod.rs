//! # Treasury Storage
//!
//! Every engine operation is a read-modify-write of one [`TreasuryRecord`].
//! Nonce assignment and signature collection are only correct if those
//! cycles never interleave for the same treasury, so the store, not the
//! caller, owns the locking:
//!
//! - [`TreasuryStore::update_with`] holds a per-treasury lock for the whole
//!   cycle and writes back only when the closure returns `Ok`.
//! - Different treasuries use different locks and never contend.
//!
//! Two backends ship with the engine: [`MemoryStore`] for tests and
//! embedding, and [`SledStore`] for persistence.

pub mod db;
pub mod memory;
pub mod record;

pub use db::SledStore;
pub use memory::MemoryStore;
pub use record::TreasuryRecord;

use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Transactional storage for treasury records.
pub trait TreasuryStore: Send + Sync {
    /// Stores a new record. Fails if the id is already taken.
    fn insert(&self, record: TreasuryRecord) -> EngineResult<()>;

    /// Returns a snapshot of the record.
    fn load(&self, id: Uuid) -> EngineResult<TreasuryRecord>;

    /// Snapshots of every record.
    fn list(&self) -> EngineResult<Vec<TreasuryRecord>>;

    /// Runs `f` on a working copy of the record under the treasury's lock
    /// and commits the copy only if `f` succeeds.
    fn update_with(
        &self,
        id: Uuid,
        f: &mut dyn FnMut(&mut TreasuryRecord) -> EngineResult<()>,
    ) -> EngineResult<()>;
}

/// Typed convenience over [`TreasuryStore::update_with`].
pub trait TreasuryStoreExt: TreasuryStore {
    /// All-or-nothing update returning the closure's result.
    fn update<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut TreasuryRecord) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let mut f = Some(f);
        let mut output = None;
        self.update_with(id, &mut |record| {
            let f = f
                .take()
                .ok_or_else(|| EngineError::Storage("update closure ran twice".into()))?;
            output = Some(f(record)?);
            Ok(())
        })?;
        output.ok_or_else(|| EngineError::Storage("update closure did not run".into()))
    }
}

impl<S: TreasuryStore + ?Sized> TreasuryStoreExt for S {}
