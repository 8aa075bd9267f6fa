//! `memo-node run`: load configuration, install tracing, and drive the
//! orchestrator until a shutdown signal arrives.
//!
//! The orchestrator is wired against external contracts (`LedgerClient`,
//! `KeyStore`, `TransactionRepository`, `Rule`) that this workspace
//! deliberately consumes but does not implement. This binary cannot
//! construct a usable [`memo_interfaces::Dependencies`] on its own; an
//! embedding application links in concrete implementations of those
//! traits and calls [`memo_orchestrator::Orchestrator::run`] directly,
//! the way `reth`'s own node builder is assembled by a downstream binary
//! rather than by the bare CLI crate.

use std::path::PathBuf;

use eyre::WrapErr;
use memo_config::Config;

use crate::cli;

pub async fn execute(args: cli::Command) -> eyre::Result<()> {
    let cli::Command::Run { config, log_dir } = args else {
        unreachable!("dispatch guarantees Command::Run");
    };

    let config = Config::load(&config).wrap_err("failed to load configuration")?;
    let _guard = install_tracing(log_dir);

    tracing::info!(accounts = config.accounts.len(), endpoints = config.ledger_endpoints.len(), "configuration loaded");

    eyre::bail!(
        "memo-node has no concrete LedgerClient/KeyStore/TransactionRepository/Rule \
         implementations to wire in; link memo-orchestrator into an embedding binary \
         that supplies them and call Orchestrator::run there"
    )
}

fn install_tracing(log_dir: Option<PathBuf>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let file = log_dir.map(|directory| memo_tracing::FileLogging { directory, file_name: "memo-node".to_string() });
    memo_tracing::init_tracing(&memo_tracing::TracingConfig { filter: None, file })
}
