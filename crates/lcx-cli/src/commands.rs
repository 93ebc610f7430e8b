use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use lcx_export::{ExportConfig, ExportDriver, ExportEvent, ExportSummary};
use lcx_stream::{ChangeSource, ChannelChangeSource, ReplayChangeSource};
use lcx_transform::{EntryFilter, SnapshotTransformer};
use lcx_types::shutdown_channel;
use lcx_verify::{InMemoryArchive, VerificationResult};
use tracing::info;

use crate::cli::*;

/// Ledgers buffered between the stdin reader and the change stream.
const FEED_CAPACITY: usize = 1024;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Export(args) => cmd_export(args, cli.format).await,
        Command::CheckConfig(args) => cmd_check_config(args, cli.format),
    }
}

/// Merge flag overrides onto the configured (or default) settings.
fn build_config(args: &ExportArgs) -> anyhow::Result<ExportConfig> {
    let mut config = match &args.config {
        Some(path) => ExportConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ExportConfig::default(),
    };

    if let Some(start) = args.start_ledger {
        config.start_ledger = start;
    }
    if let Some(end) = args.end_ledger {
        config.end_ledger = end;
    }
    if let Some(size) = args.batch_size {
        config.batch_size = size;
    }
    if let Some(size) = args.verify_batch_size {
        config.verify_batch_size = size;
    }
    if let Some(path) = &args.core_config {
        config.core_config = Some(path.clone());
    }

    let flags = EntryFilter {
        accounts: args.export_accounts,
        offers: args.export_offers,
        trustlines: args.export_trustlines,
        liquidity_pools: args.export_pools,
        claimable_balances: args.export_balances,
    };
    if flags != EntryFilter::default() {
        config.export = flags;
    }
    Ok(config)
}

async fn cmd_export(args: ExportArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = build_config(&args)?;
    let source = open_changes(&args.changes)?;
    let archive = InMemoryArchive::load(&args.archive)
        .with_context(|| format!("loading archive {}", args.archive.display()))?;

    let (driver, mut events) = ExportDriver::new(
        config,
        source,
        Box::new(SnapshotTransformer),
        Arc::new(archive),
    )?;

    let (handle, signal) = shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; shutting down");
            handle.trigger();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event, format);
        }
    });

    let outcome = driver.run(signal).await;
    printer.await?;
    let summary = outcome?;
    print_summary(&summary, format)
}

/// A recorded change file, or a live feed on stdin for `-`.
fn open_changes(path: &Path) -> anyhow::Result<Box<dyn ChangeSource>> {
    if path.as_os_str() == "-" {
        let feed = ChannelChangeSource::spawn_json_lines(BufReader::new(io::stdin()), FEED_CAPACITY)
            .context("starting stdin reader")?;
        return Ok(Box::new(feed));
    }
    let replay = ReplayChangeSource::open(path)
        .with_context(|| format!("reading changes from {}", path.display()))?;
    Ok(Box::new(replay))
}

fn print_event(event: &ExportEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => eprintln!("{} failed to encode event: {err}", "✗".red()),
        },
        OutputFormat::Text => match event {
            ExportEvent::Batch { batch, output } => {
                let counts = output
                    .counts()
                    .into_iter()
                    .map(|(t, n)| format!("{t}={n}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!(
                    "{} ledgers {}-{}: {} rows {}",
                    "→".cyan(),
                    batch.start_ledger,
                    batch.end_ledger,
                    output.len(),
                    counts.dimmed()
                );
            }
            ExportEvent::Verified(result @ VerificationResult::Match { .. }) => {
                println!("{} {}", "✓".green().bold(), result);
            }
            ExportEvent::Verified(VerificationResult::Mismatch {
                checkpoint,
                divergences,
            }) => {
                println!(
                    "{} checkpoint {} diverges from archive",
                    "✗".red().bold(),
                    checkpoint.to_string().yellow()
                );
                for d in divergences {
                    println!("    {d}");
                }
            }
        },
    }
}

fn print_summary(summary: &ExportSummary, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(summary)?),
        OutputFormat::Text => {
            println!(
                "{} Export {}: {} batches, {} ledgers, {} rows",
                "✓".green().bold(),
                summary.final_state,
                summary.batches.to_string().bold(),
                summary.ledgers,
                summary.rows
            );
            println!(
                "  Checkpoints verified: {}",
                summary.checkpoints_verified.to_string().green()
            );
            if summary.transform_failures > 0 {
                println!(
                    "  Transform failures: {}",
                    summary.transform_failures.to_string().yellow()
                );
            }
        }
    }
    Ok(())
}

fn cmd_check_config(args: CheckConfigArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = ExportConfig::load(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    config.validate()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&config)?),
        OutputFormat::Text => {
            let range = config.range()?;
            let end = range
                .end()
                .map_or_else(|| "unbounded".to_string(), |e| e.to_string());
            let types = config
                .export
                .enabled()
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            println!("{} Config valid: {}", "✓".green().bold(), args.config.display());
            println!("  Ledgers: {} to {}", range.start(), end.yellow());
            println!("  Batch size: {}", config.batch_size);
            println!("  Entry types: {}", types.cyan());
            println!("  Verify page size: {}", config.verify_batch_size);
            println!("  Checkpoint frequency: {}", config.checkpoint_frequency);
        }
    }
    Ok(())
}
