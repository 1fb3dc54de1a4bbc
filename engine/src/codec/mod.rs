//! # Codec Primitives
//!
//! Everything that turns user-supplied strings into typed, validated values
//! and back. No other module parses hex by hand: addresses, hashes,
//! signatures, wei amounts and call data all enter the engine through here.
//! The byte-level types come from `alloy-primitives`.
//!
//! ```text
//! address.rs — Address / TxHash newtypes, format checks, EIP-55 checksums
//! abi.rs     — uint256 wei amounts, hex call-data payloads
//! ```

pub mod abi;
pub mod address;

pub use abi::{parse_call_data, WeiAmount};
pub use address::{is_valid_address, is_valid_signature, is_valid_tx_hash, normalize, Address, TxHash};
