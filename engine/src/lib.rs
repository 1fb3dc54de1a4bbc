// Copyright (c) 2026 The safe-engine authors. MIT License.
// See LICENSE for details.

//! # Safe Engine — Treasury Transactions and Configuration
//!
//! The off-chain half of a multi-signature Safe treasury: who may sign, how
//! many signatures a transaction needs, in which order transactions may
//! execute, and how the ledger catches up when the chain changes under it.
//!
//! Wallet signing, gas and broadcasting are someone else's job. This crate
//! keeps the books and keeps them consistent with the contract.
//!
//! ## Architecture
//!
//! - **codec** — Addresses, hashes, wei amounts and call data over `alloy-primitives`.
//! - **safe** — Treasury lifecycle, configuration, the owner linked list,
//!   and decoding of configuration-change call data.
//! - **transaction** — Nonce-ordered ledger, signature bookkeeping and the
//!   EIP-712 `safeTxHash`.
//! - **sync** — Post-execution reconciliation, chain-state checks and cache
//!   invalidation.
//! - **registry** — Creating, deploying and administering treasuries.
//! - **storage** — Per-treasury atomic storage (memory and sled).
//! - **config** — Protocol constants and engine tunables.
//! - **error** — The one error type every operation returns.
//!
//! ## Ground Rules
//!
//! 1. On-chain state wins. Off-chain drift is reported and healed, never
//!    allowed to abort a sync.
//! 2. A mutation either commits completely or not at all.
//! 3. The owner list order is the contract's order. Nothing here sorts it.

pub mod codec;
pub mod config;
pub mod error;
pub mod registry;
pub mod safe;
pub mod storage;
pub mod sync;
pub mod transaction;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use registry::TreasuryRegistry;
pub use safe::{ConfigChange, ConfigurationDraft, SignerSet, ThresholdPolicy, TreasuryConfiguration};
pub use storage::{MemoryStore, SledStore, TreasuryRecord, TreasuryStore};
pub use sync::{CacheSink, ChainStateProvider, SyncCoordinator};
pub use transaction::{Proposal, Transaction, TransactionLedger, TransactionStatus};
