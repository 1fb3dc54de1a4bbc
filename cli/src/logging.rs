//! # Operator Logging
//!
//! `safe-cli` prints its result as JSON on stdout, so every log line goes to
//! stderr. The default filter is scoped to this workspace: the engine and
//! the CLI log at the requested level while dependencies such as `sled`
//! stay at `warn`. `RUST_LOG` replaces the whole filter when set.

use std::io;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose events follow `--log-level`.
const WORKSPACE_TARGETS: [&str; 2] = ["safe_engine", "safe_cli"];

/// Log output format, selected with `--log-format`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Compact human-readable lines.
    #[default]
    Pretty,
    /// One flattened JSON object per event, for log shippers.
    Json,
}

/// Filter directives for `level`: workspace crates at `level`, the rest at
/// `warn`.
pub fn default_directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for target in WORKSPACE_TARGETS {
        directives.push_str(&format!(",{}={}", target, level));
    }
    directives
}

/// Installs the global subscriber. Fails on a malformed `--log-level`.
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directives(level))
            .with_context(|| format!("invalid log level {:?}", level))?,
    };
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_writer(io::stderr)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(io::stderr),
            )
            .try_init(),
    }
    .context("failed to install the log subscriber")?;

    tracing::debug!(?format, level, "logging initialized");
    Ok(())
}
