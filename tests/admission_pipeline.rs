//! Integration tests for batch admission end to end

use std::io::Write;
use std::sync::{Arc, Barrier};
use tempfile::TempDir;
use tierchain::amount::Amount;
use tierchain::cli::{demo_batches, load_node_from_config};
use tierchain::config::Config;
use tierchain::error::ChainError;
use tierchain::ledger::InMemoryLedger;
use tierchain::node::Node;
use tierchain::persistence::InMemoryPersistence;
use tierchain::pipeline::{AdmissionPipeline, BatchStage};
use tierchain::transaction::Transaction;

/// Helper to build a pipeline whose mini-blocks hold `max_mini` bytes
fn pipeline_with(
    max_mini: usize,
    minis: usize,
) -> Result<AdmissionPipeline, Box<dyn std::error::Error>> {
    let mut config = Config::default();
    config.chain.max_mini_block_size = max_mini;
    config.chain.max_sub_block_size = max_mini * minis;
    config.chain.max_main_block_size = max_mini * minis;
    config.sealer.target_seal_time_ms = 1;
    let ledger = Arc::new(InMemoryLedger::new());
    ledger.mint("Alice", Amount::from_coins(1_000_000));
    let persistence = Arc::new(InMemoryPersistence::new());
    Ok(AdmissionPipeline::from_config(&config, ledger, persistence)?)
}

fn alice_to_bob() -> Vec<Transaction> {
    vec![Transaction::new("Alice", "Bob", Amount::from_coins(500), 1_700_000_000)]
}

#[test]
fn test_single_transfer_commits_into_fresh_mini_block() -> Result<(), Box<dyn std::error::Error>> {
    // Room for one 26-byte transfer but not two.
    let pipeline = pipeline_with(40, 1)?;
    let receipt = pipeline.admit_batch(alice_to_bob())?;

    assert_eq!(receipt.mini_block.transactions.len(), 1);
    assert!(!receipt.mini_block.is_full);
    assert!(receipt.tally.approvals >= receipt.tally.required);
    assert_eq!(receipt.stages.last(), Some(&BatchStage::Committed));
    assert!(receipt.mini_block.hash.ends_with(pipeline.chain().difficulty_suffix()));
    assert_eq!(receipt.mini_block.hash, receipt.mini_block.calculate_hash());
    Ok(())
}

#[test]
fn test_same_batch_in_parallel_commits_once() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Arc::new(pipeline_with(1_024, 4)?);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                pipeline.admit_batch(alice_to_bob())
            })
        })
        .collect();

    let mut committed = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.join().map_err(|_| "admission thread panicked")? {
            Ok(_) => committed += 1,
            Err(ChainError::DuplicateBatch(_)) => duplicates += 1,
            Err(other) => return Err(other.into()),
        }
    }
    assert_eq!((committed, duplicates), (1, 1));

    let pending = pipeline.chain().pending_mini_blocks();
    assert_eq!(pending.iter().map(|m| m.transactions.len()).sum::<usize>(), 1);
    Ok(())
}

#[test]
fn test_oversized_batch_mutates_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = pipeline_with(64, 2)?;
    let batch: Vec<Transaction> = (0..4)
        .map(|i| Transaction::new("Alice", "Bob", Amount::from_coins(1), 1_700_000_000 + i))
        .collect();

    let err = pipeline.admit_batch(batch).unwrap_err();
    assert_eq!(err, ChainError::SizeExceeded { size: 104, max: 64 });

    pipeline.chain().with_open_block(|open| {
        assert_eq!(open.arena.available_count(), 2);
        assert!(!open.arena.has_committed());
        assert_eq!(open.arena.transaction_count(), 0);
    });
    Ok(())
}

#[test]
fn test_capacity_invariant_under_concurrency() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::default();
    config.chain.max_mini_block_size = 200;
    config.chain.max_sub_block_size = 800;
    config.chain.max_main_block_size = 1_600;
    config.sealer.target_seal_time_ms = 1;
    config.workers.threads = 8;
    let node = Node::new(config)?;

    let batches = demo_batches(300, 4, 1_700_000_000);
    let results = node.admit_all(batches.clone());
    assert_eq!(results.len(), batches.len());

    let mut admitted = 0;
    for (batch, result) in batches.iter().zip(&results) {
        match result {
            Ok(receipt) => {
                assert!(receipt.mini_block.current_size <= 200);
                admitted += batch.len();
            }
            Err(ChainError::NoCapacity { .. }) => {}
            Err(other) => return Err(other.clone().into()),
        }
    }
    node.seal()?;

    let blocks = node.chain().blocks();
    for mini in blocks.iter().flat_map(|b| b.mini_blocks()) {
        assert!(mini.current_size <= 200);
        let size: usize = mini.transactions.iter().map(Transaction::byte_size).sum();
        assert_eq!(size, mini.current_size);
    }
    let committed: usize = blocks.iter().map(|b| b.transaction_count()).sum();
    assert_eq!(committed, admitted);
    assert!(node.chain().is_valid());
    Ok(())
}

#[test]
fn test_node_from_config_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let path = dir.path().join("tierchain.toml");
    let mut file = std::fs::File::create(&path)?;
    writeln!(
        file,
        r#"
[chain]
max_mini_block_size = 128
max_sub_block_size = 256
max_main_block_size = 512

[consensus]
policy = "supermajority"

[workers]
threads = 2
"#
    )?;

    let (config, node) = load_node_from_config(&path)?;
    assert_eq!(config.chain.layout().mini_blocks_per_main(), 4);

    let receipt = node.submit(alice_to_bob())?.recv()??;
    assert_eq!(receipt.tally.required, 2);
    assert_eq!(node.summary().workers, 2);
    Ok(())
}
