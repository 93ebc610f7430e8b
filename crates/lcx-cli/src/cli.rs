use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lcx",
    about = "Ledger change exporter: batched entry changes with checkpoint verification",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Export entry changes for a ledger range and verify checkpoints
    Export(ExportArgs),
    /// Validate an export configuration file
    CheckConfig(CheckConfigArgs),
}

/// Flags override values from `--config`.
#[derive(Args)]
pub struct ExportArgs {
    /// TOML export configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// First ledger to export
    #[arg(short, long)]
    pub start_ledger: Option<u32>,
    /// Last ledger to export; 0 exports continuously
    #[arg(short, long)]
    pub end_ledger: Option<u32>,
    /// Ledgers per batch
    #[arg(short, long, allow_hyphen_values = true)]
    pub batch_size: Option<i64>,
    #[arg(long)]
    pub verify_batch_size: Option<usize>,
    /// Replay engine configuration file
    #[arg(long)]
    pub core_config: Option<PathBuf>,
    #[arg(long)]
    pub export_accounts: bool,
    #[arg(long)]
    pub export_offers: bool,
    #[arg(long)]
    pub export_trustlines: bool,
    #[arg(long)]
    pub export_pools: bool,
    #[arg(long)]
    pub export_balances: bool,
    /// JSON-lines file of recorded ledger changes; `-` reads a live feed from stdin
    #[arg(long)]
    pub changes: PathBuf,
    /// JSON file of archived checkpoint snapshots
    #[arg(long)]
    pub archive: PathBuf,
}

#[derive(Args)]
pub struct CheckConfigArgs {
    #[arg(short, long)]
    pub config: PathBuf,
}
