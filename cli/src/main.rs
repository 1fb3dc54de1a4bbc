// Copyright (c) 2026 The safe-engine authors. MIT License.
// See LICENSE for details.

//! # safe-cli
//!
//! Operator tool for Safe treasuries. Every subcommand is offline and prints
//! JSON to stdout; logs go to stderr.
//!
//! ## Subcommands
//!
//! - `decode` — Decode call data into a configuration change.
//! - `validate` — Validate a configuration draft file.
//! - `prev-owner` — Compute the `prevOwner` argument for an owner.
//! - `checksum` — Print the EIP-55 form of an address.
//! - `safe-tx-hash` — Compute the EIP-712 `safeTxHash`.
//! - `version` — Print version information.

mod cli;
mod logging;

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};

use cli::{
    ChecksumArgs, Commands, DecodeArgs, PrevOwnerArgs, SafeCli, SafeTxHashArgs, ValidateArgs,
};
use safe_engine::codec::abi::call_data_bytes;
use safe_engine::codec::{parse_call_data, Address, WeiAmount};
use safe_engine::config::network_name;
use safe_engine::safe::{decode_config_change_hex, ConfigViolation};
use safe_engine::transaction::{safe_tx_hash, Operation, SafeTx};
use safe_engine::{ConfigurationDraft, EngineConfig, SignerSet};

fn main() -> Result<()> {
    let cli = SafeCli::parse();

    logging::init(&cli.log_level, cli.log_format)?;

    let config = load_config(cli.config.as_deref())?;
    debug!(?config, "engine config loaded");

    match cli.command {
        Commands::Decode(args) => run_decode(args),
        Commands::Validate(args) => run_validate(args, &config),
        Commands::PrevOwner(args) => run_prev_owner(args),
        Commands::Checksum(args) => run_checksum(args),
        Commands::SafeTxHash(args) => run_safe_tx_hash(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Reads the engine config file, or falls back to defaults when none is given.
fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    EngineConfig::from_json(&raw)
        .with_context(|| format!("invalid config file {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

fn run_decode(args: DecodeArgs) -> Result<()> {
    let change = decode_config_change_hex(&args.data).context("failed to decode call data")?;
    match &change {
        Some(change) => info!(function = change.function_signature(), "decoded configuration change"),
        None => info!("call data is not a configuration change"),
    }
    print_json(&serde_json::json!({ "config_change": change }))
}

#[derive(Serialize)]
struct ValidationOutput {
    valid: bool,
    violations: Vec<ConfigViolation>,
    messages: Vec<String>,
}

fn run_validate(args: ValidateArgs, config: &EngineConfig) -> Result<()> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let draft: ConfigurationDraft = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a configuration draft", args.file.display()))?;

    let violations = draft.validate();
    let messages = violations.iter().map(ToString::to_string).collect();
    let valid = violations.is_empty();
    print_json(&ValidationOutput {
        valid,
        violations,
        messages,
    })?;

    if !valid {
        bail!("configuration is invalid");
    }

    // Building fills defaults (version, salt nonce, policy) the same way
    // treasury creation does.
    let built = draft.build(config).context("failed to build configuration")?;
    debug!(
        signers = built.signers().len(),
        threshold = built.threshold(),
        "configuration is valid"
    );
    Ok(())
}

fn run_prev_owner(args: PrevOwnerArgs) -> Result<()> {
    let owners = args
        .owners
        .iter()
        .map(|raw| Address::parse("owners", raw.trim()))
        .collect::<Result<Vec<_>, _>>()
        .context("invalid owner list")?;
    let signers = SignerSet::from_owners(owners).context("invalid owner list")?;
    let owner = Address::parse("owner", &args.owner).context("invalid owner")?;
    let prev_owner = signers
        .previous_owner(&owner)
        .context("owner is not in the list")?;

    let remove_owner_call = match args.threshold {
        Some(threshold) => Some(
            signers
                .remove_owner_change(&owner, threshold)
                .context("cannot build removeOwner call")?
                .encode_hex(),
        ),
        None => None,
    };

    print_json(&serde_json::json!({
        "owner": owner,
        "prev_owner": prev_owner,
        "remove_owner_call": remove_owner_call,
    }))
}

fn run_checksum(args: ChecksumArgs) -> Result<()> {
    let address = Address::parse("address", &args.address).context("invalid address")?;
    print_json(&serde_json::json!({
        "address": address,
        "checksum": address.to_checksum(),
    }))
}

fn run_safe_tx_hash(args: SafeTxHashArgs) -> Result<()> {
    let safe = Address::parse("safe", &args.safe).context("invalid safe address")?;
    let to = Address::parse("to", &args.to).context("invalid destination")?;
    let value = WeiAmount::parse("value", &args.value).context("invalid value")?;
    let data = parse_call_data("data", &args.data).context("invalid call data")?;
    let bytes = call_data_bytes(&data)?;
    let operation = Operation::from_u8(args.operation).context("invalid operation")?;

    let hash = safe_tx_hash(
        args.chain_id,
        &safe,
        &SafeTx {
            to: &to,
            value: &value,
            data: &bytes,
            operation,
            nonce: args.nonce,
        },
    );
    info!(
        network = %network_name(args.chain_id),
        safe = %safe,
        nonce = args.nonce,
        "computed safe transaction hash"
    );

    print_json(&serde_json::json!({
        "chain_id": args.chain_id,
        "safe": safe,
        "nonce": args.nonce,
        "safe_tx_hash": hash,
    }))
}

fn print_version() {
    println!("safe-cli {}", env!("CARGO_PKG_VERSION"));
    println!("Contract version:  {}", safe_engine::config::DEFAULT_SAFE_VERSION);
}
