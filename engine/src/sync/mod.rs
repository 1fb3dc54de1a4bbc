//! Synchronization between the off-chain ledger and the chain, and the
//! invalidation keys that tell caches what changed.

pub mod coordinator;
pub mod invalidation;
pub mod provider;

pub use coordinator::{AccessibilityReport, ReconcileReport, RecoveryOption, SyncCoordinator};
pub use invalidation::{invalidation_keys, CacheSink, InvalidationKey, NoopSink, RecordingSink};
pub use provider::{ChainStateProvider, ProviderError, SafeInfo};
