//! Treasury transactions: types, the EIP-712 hash owners sign, and the
//! ledger that orders and gates them.

pub mod hash;
pub mod ledger;
pub mod types;

pub use hash::{domain_separator, safe_tx_hash, SafeTx};
pub use ledger::{ExecutionReport, Proposal, TransactionLedger};
pub use types::{Operation, SignatureRecord, Transaction, TransactionStatus};
