//! Integration tests for chain sealing, validation and peer adoption

use std::sync::Arc;
use tierchain::amount::Amount;
use tierchain::blockchain::{is_chain_valid, validate_chain, ChainRules, MainBlock};
use tierchain::config::Config;
use tierchain::error::ChainError;
use tierchain::ledger::InMemoryLedger;
use tierchain::merkle::MerkleProof;
use tierchain::persistence::InMemoryPersistence;
use tierchain::pipeline::AdmissionPipeline;
use tierchain::transaction::Transaction;

fn pipeline() -> Result<AdmissionPipeline, Box<dyn std::error::Error>> {
    let mut config = Config::default();
    config.chain.max_mini_block_size = 100;
    config.chain.max_sub_block_size = 200;
    config.chain.max_main_block_size = 400;
    config.sealer.target_seal_time_ms = 1;
    Ok(AdmissionPipeline::from_config(
        &config,
        Arc::new(InMemoryLedger::new()),
        Arc::new(InMemoryPersistence::new()),
    )?)
}

/// Admits `count` transfers starting at `ts` and seals them into one main-block
fn seal_round(
    pipeline: &AdmissionPipeline,
    ts: i64,
    count: i64,
) -> Result<MainBlock, Box<dyn std::error::Error>> {
    for i in 0..count {
        let transfer = Transaction::new("Alice", "Bob", Amount::from_coins(3), ts + i);
        pipeline.admit_batch(vec![transfer])?;
    }
    Ok(pipeline.seal_open_block()?.ok_or("nothing to seal")?)
}

#[test]
fn test_sealed_chain_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = pipeline()?;
    seal_round(&pipeline, 1_700_000_000, 5)?;
    seal_round(&pipeline, 1_700_001_000, 3)?;

    let blocks = pipeline.chain().blocks();
    assert_eq!(blocks.len(), 3);
    assert!(is_chain_valid(&blocks));
    assert!(pipeline.chain().is_valid());

    // Children are sealed before parents at every tier.
    for block in &blocks[1..] {
        for sub in &block.sub_blocks {
            assert!(sub.is_sealed());
            assert!(sub.mini_blocks.iter().all(|m| m.is_sealed()));
            assert_eq!(sub.hash, sub.calculate_hash());
        }
        assert_eq!(block.hash, block.calculate_hash());
    }
    Ok(())
}

#[test]
fn test_tampering_is_detected() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = pipeline()?;
    seal_round(&pipeline, 1_700_000_000, 4)?;
    let blocks = pipeline.chain().blocks();

    let mut stored_hash = blocks.clone();
    stored_hash[1].hash = "f".repeat(64);
    assert!(!is_chain_valid(&stored_hash));

    let mut parent_link = blocks.clone();
    parent_link[1].previous_hash = "0".repeat(64);
    assert!(matches!(
        validate_chain(&parent_link, ChainRules::default()),
        Err(ChainError::InvalidChain(_))
    ));

    let mut amount = blocks;
    amount[1].sub_blocks[0].mini_blocks[0].transactions[0].amount = Amount::from_coins(30);
    assert!(!is_chain_valid(&amount));
    Ok(())
}

#[test]
fn test_add_block_from_peer() -> Result<(), Box<dyn std::error::Error>> {
    let producer = pipeline()?;
    let block = seal_round(&producer, 1_700_000_000, 2)?;

    let follower = pipeline()?;
    follower.chain().add_block(block.clone())?;
    assert_eq!(follower.chain().height(), 1);
    assert_eq!(follower.chain().last_hash(), block.hash);
    assert!(follower.chain().is_valid());

    // The same block cannot be applied twice.
    assert!(follower.chain().add_block(block).is_err());

    // New admissions land in the next open block.
    let transfer = Transaction::new("Carol", "Dave", Amount::from_coins(1), 9);
    let receipt = follower.admit_batch(vec![transfer])?;
    assert_eq!(receipt.main_block_index, 2);
    Ok(())
}

#[test]
fn test_replace_chain_adopts_longer_peer_chain() -> Result<(), Box<dyn std::error::Error>> {
    let peer = pipeline()?;
    for round in 0..3 {
        seal_round(&peer, 1_700_000_000 + round * 100, 2)?;
    }

    let local = pipeline()?;
    seal_round(&local, 1_800_000_000, 1)?;
    local.chain().replace_chain(peer.chain().blocks())?;
    assert_eq!(local.chain().height(), 3);
    assert_eq!(local.chain().blocks(), peer.chain().blocks());

    assert!(local.chain().replace_chain(peer.chain().blocks()).is_err());
    Ok(())
}

#[test]
fn test_peer_block_over_capacity_is_refused() -> Result<(), Box<dyn std::error::Error>> {
    // The producer allows 300-byte mini-blocks, the follower only 100.
    let mut config = Config::default();
    config.chain.max_mini_block_size = 300;
    config.chain.max_sub_block_size = 300;
    config.chain.max_main_block_size = 300;
    config.sealer.target_seal_time_ms = 1;
    let producer = AdmissionPipeline::from_config(
        &config,
        Arc::new(InMemoryLedger::new()),
        Arc::new(InMemoryPersistence::new()),
    )?;
    let block = seal_round(&producer, 1_700_000_000, 6)?;
    assert!(block.mini_blocks().any(|m| m.current_size > 100));

    let follower = pipeline()?;
    let err = follower.chain().add_block(block).unwrap_err();
    assert!(matches!(err, ChainError::InvalidBlock(_)));
    assert_eq!(follower.chain().height(), 0);
    Ok(())
}

#[test]
fn test_inclusion_proof_for_committed_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = pipeline()?;
    let batch = vec![
        Transaction::new("Alice", "Bob", Amount::from_coins(1), 1),
        Transaction::new("Bob", "Carol", Amount::from_coins(2), 2),
        Transaction::new("Carol", "Dave", Amount::from_coins(3), 3),
    ];
    let receipt = pipeline.admit_batch(batch)?;
    let mini = receipt.mini_block;

    for (i, tx) in mini.transactions.iter().enumerate() {
        let proof = MerkleProof::for_transaction(&mini.transactions, i).ok_or("no proof")?;
        assert!(proof.verify(&tx.id(), &mini.merkle_root));
    }
    let proof = mini.inclusion_proof(0).ok_or("no proof")?;
    assert!(!proof.verify(&mini.transactions[1].id(), &mini.merkle_root));
    Ok(())
}
