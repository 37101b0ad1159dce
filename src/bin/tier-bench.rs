#![forbid(unsafe_code)]
//! Admission throughput benchmark: single-transaction batches through the worker pool.

use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tierchain::cli::{demo_batches, load_node_from_config, DEFAULT_CONFIG_PATH};
use tierchain::error::ChainError;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Transactions to admit, one per batch
    #[arg(long, default_value_t = 10_000)]
    transactions: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (config, node) = load_node_from_config(&cli.config)?;

    println!(
        "{} {} transactions on {} workers",
        "Benchmarking".bright_cyan().bold(),
        cli.transactions,
        config.workers.effective_threads()
    );

    let pb = ProgressBar::new(cli.transactions as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})",
            )?
            .progress_chars("#>-"),
    );

    let started = Instant::now();
    let mut pending = Vec::with_capacity(cli.transactions);
    for batch in demo_batches(cli.transactions, 1, chrono::Utc::now().timestamp()) {
        pending.push(node.submit(batch)?);
    }

    let mut committed = 0usize;
    let mut no_capacity = 0usize;
    let mut other = 0usize;
    for reply in pending {
        match reply.recv()? {
            Ok(_) => committed += 1,
            Err(ChainError::NoCapacity { .. }) => {
                no_capacity += 1;
                // The open block has free bytes but no single slot fits; start a new one.
                node.seal()?;
            }
            Err(_) => other += 1,
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    node.seal()?;
    let elapsed = started.elapsed();
    let rate = committed as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    println!("{} {}", "Committed:".bold(), committed.to_string().green());
    println!("{} {}", "No capacity:".bold(), no_capacity);
    println!("{} {}", "Other rejections:".bold(), other.to_string().red());
    println!("{} {:.2?} ({:.0} tx/s)", "Elapsed:".bold(), elapsed, rate);
    println!("{} {}", "Height:".bold(), node.chain().height());

    Ok(())
}
