use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ledger memo pipeline node.
#[derive(Debug, Parser)]
#[command(name = "memo-node", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Wire the orchestrator against a configuration file and run it until
    /// a shutdown signal arrives.
    Run {
        /// Path to a TOML configuration file, overridable via
        /// `memo-config::Config`.
        #[arg(long, default_value = "memo-node.toml")]
        config: PathBuf,
        /// Directory for rolling log files, in addition to stdout.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Encode a plaintext payload into the wire-ready memo fragments an
    /// operator would submit, without touching the ledger.
    Construct {
        #[arg(long)]
        source: String,
        #[arg(long)]
        destination: String,
        #[arg(long)]
        payload: String,
        #[arg(long)]
        memo_type: Option<String>,
        #[arg(long)]
        encrypt: bool,
        #[arg(long)]
        compress: bool,
    },
    /// Decode a previously-reassembled fragment payload back to plaintext,
    /// without touching the ledger.
    Decode {
        /// Hex-encoded fragment payload (concatenation of every fragment's
        /// `memo_data`, already hex-decoded to wire bytes).
        #[arg(long)]
        payload_hex: String,
        #[arg(long)]
        compressed: bool,
        #[arg(long)]
        encrypted: bool,
    },
}
