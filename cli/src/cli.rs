//! # CLI Interface
//!
//! Defines the command-line argument structure for `safe-cli` using `clap`
//! derive. Every subcommand works offline: nothing here talks to a chain.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Operator tool for Safe treasuries.
///
/// Decodes configuration-change call data, validates configuration files,
/// computes `prevOwner` arguments, checksums addresses and computes the
/// EIP-712 hash owners sign.
#[derive(Parser, Debug)]
#[command(
    name = "safe-cli",
    about = "Safe treasury operator tool",
    version,
    propagate_version = true
)]
pub struct SafeCli {
    /// Engine configuration file (JSON). Defaults apply when omitted.
    #[arg(long, short = 'c', global = true, env = "SAFE_ENGINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format on stderr.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Level for engine and CLI events when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode call data into a configuration change, if it is one.
    Decode(DecodeArgs),
    /// Validate a treasury configuration file and report every violation.
    Validate(ValidateArgs),
    /// Compute the `prevOwner` argument for removing or replacing an owner.
    PrevOwner(PrevOwnerArgs),
    /// Print the EIP-55 checksum form of an address.
    Checksum(ChecksumArgs),
    /// Compute the EIP-712 `safeTxHash` of a transaction.
    SafeTxHash(SafeTxHashArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `decode` subcommand.
#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// `0x`-prefixed call data.
    pub data: String,
}

/// Arguments for the `validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration draft (JSON): `signers`, `threshold`, and optionally
    /// `modules`, `fallback_handler`, `version`, `salt_nonce`,
    /// `threshold_policy`.
    pub file: PathBuf,
}

/// Arguments for the `prev-owner` subcommand.
#[derive(Args, Debug)]
pub struct PrevOwnerArgs {
    /// Owners in on-chain list order, comma separated.
    #[arg(long, value_delimiter = ',', required = true)]
    pub owners: Vec<String>,

    /// The owner to remove or replace.
    #[arg(long)]
    pub owner: String,

    /// Also print `removeOwner` call data with this new threshold.
    #[arg(long)]
    pub threshold: Option<u32>,
}

/// Arguments for the `checksum` subcommand.
#[derive(Args, Debug)]
pub struct ChecksumArgs {
    /// Address in any casing.
    pub address: String,
}

/// Arguments for the `safe-tx-hash` subcommand.
#[derive(Args, Debug)]
pub struct SafeTxHashArgs {
    /// Chain id.
    #[arg(long, default_value_t = 1)]
    pub chain_id: u64,

    /// Safe address (the EIP-712 verifying contract).
    #[arg(long)]
    pub safe: String,

    /// Destination address.
    #[arg(long)]
    pub to: String,

    /// Amount in wei.
    #[arg(long, default_value = "0")]
    pub value: String,

    /// `0x`-prefixed call data.
    #[arg(long, default_value = "0x")]
    pub data: String,

    /// Operation: 0 for call, 1 for delegatecall.
    #[arg(long, default_value_t = 0)]
    pub operation: u8,

    /// Safe nonce.
    #[arg(long)]
    pub nonce: u64,
}
