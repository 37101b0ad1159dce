#![forbid(unsafe_code)]
//! Runs a local TierChain node over a generated workload and prints the chain.

use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::path::PathBuf;
use std::time::Instant;
use tierchain::amount::Amount;
use tierchain::blockchain::MainBlock;
use tierchain::cli::{
    demo_batches, format_hash, fund_demo_accounts, load_node_from_config, DEFAULT_CONFIG_PATH,
};
use tierchain::error::Disposition;
use tierchain::node::init_tracing;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config; defaults apply if the file is missing
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Number of batches to generate
    #[arg(long, default_value_t = 200)]
    batches: usize,
    /// Largest number of transactions in one batch
    #[arg(long, default_value_t = 5)]
    batch_size: usize,
    /// Leave the open main-block unsealed at the end
    #[arg(long)]
    no_seal: bool,
    /// Print the chain as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let (_config, node) = load_node_from_config(&cli.config)?;
    fund_demo_accounts(&node, Amount::from_coins(1_000_000));

    let started = Instant::now();
    let batches = demo_batches(cli.batches, cli.batch_size, chrono::Utc::now().timestamp());
    let results = node.admit_all(batches);
    let elapsed = started.elapsed();

    let mut committed = 0usize;
    let mut rejected = 0usize;
    let mut retryable = 0usize;
    for result in &results {
        match result {
            Ok(_) => committed += 1,
            Err(e) => {
                rejected += 1;
                if e.disposition() != Disposition::Drop {
                    retryable += 1;
                }
            }
        }
    }

    if !cli.no_seal {
        node.seal()?;
    }

    let blocks = node.chain().blocks();
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&blocks)?);
        return Ok(());
    }

    println!("\n{}", "TierChain node".bright_cyan().bold());
    println!(
        "{} {} committed, {} rejected ({} retryable) in {:.2?}\n",
        "Batches:".bold(),
        committed.to_string().green(),
        rejected.to_string().red(),
        retryable,
        elapsed
    );

    println!("{}", chain_table(&blocks));

    let summary = node.summary();
    let validity = if summary.chain_valid {
        "valid".green().bold()
    } else {
        "INVALID".red().bold()
    };
    println!();
    println!("{} {}", "Height:".bold(), summary.height);
    println!("{} {}", "Tip:".bold(), format_hash(&summary.last_hash));
    println!("{} {}", "Open block:".bold(), summary.open_block);
    println!("{} {}", "Pending transactions:".bold(), summary.pending_transactions);
    println!("{} {}", "Chain:".bold(), validity);

    Ok(())
}

fn chain_table(blocks: &[MainBlock]) -> Table {
    let header = ["Height", "Sub-blocks", "Mini-blocks", "Transactions", "Reward", "Hash"];
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            header
                .iter()
                .map(|h| Cell::new(h).fg(TableColor::Cyan).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );

    for block in blocks {
        table.add_row(vec![
            Cell::new(format!("#{}", block.index)).fg(TableColor::White),
            Cell::new(block.sub_blocks.len()),
            Cell::new(block.mini_blocks().count()),
            Cell::new(block.transaction_count()),
            Cell::new(block.total_reward()).fg(TableColor::Green),
            Cell::new(format_hash(&block.hash)).fg(TableColor::Grey),
        ]);
    }
    table
}
