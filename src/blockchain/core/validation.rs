use crate::blockchain::core::block::{MainBlock, MiniBlock, SubBlock, GENESIS_PREVIOUS_HASH};
use crate::error::ChainError;
use crate::miner::meets_difficulty;

/// Checks applied on top of recomputing every hash. `Default` enforces neither.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainRules<'a> {
    /// Every mini-block hash must end with this.
    pub difficulty_suffix: Option<&'a str>,
    /// Capacity of one mini-block; also fixes what `is_full` must say.
    pub max_mini_block_size: Option<usize>,
}

fn validate_mini_block(mini: &MiniBlock, rules: ChainRules<'_>) -> Result<(), ChainError> {
    if !mini.is_sealed() {
        return Err(ChainError::UnsealedChild(format!("mini-block {}", mini.index)));
    }
    if mini.transactions.is_empty() {
        return Err(ChainError::InvalidBlock(format!(
            "mini-block {} has no transactions",
            mini.index
        )));
    }
    for (i, tx) in mini.transactions.iter().enumerate() {
        tx.validate().map_err(|e| {
            ChainError::InvalidBlock(format!("mini-block {} transaction {}: {}", mini.index, i, e))
        })?;
    }

    let size: usize = mini.transactions.iter().map(|tx| tx.byte_size()).sum();
    if size != mini.current_size {
        return Err(ChainError::InvalidBlock(format!(
            "mini-block {} size mismatch. Expected {}, but got {}.",
            mini.index, size, mini.current_size
        )));
    }
    if let Some(max) = rules.max_mini_block_size {
        if mini.current_size > max {
            return Err(ChainError::InvalidBlock(format!(
                "mini-block {} holds {} bytes, more than the limit of {}",
                mini.index, mini.current_size, max
            )));
        }
        if mini.is_full != (mini.current_size >= max) {
            return Err(ChainError::InvalidBlock(format!(
                "mini-block {} is_full = {} does not match {} of {} bytes",
                mini.index, mini.is_full, mini.current_size, max
            )));
        }
    }

    let merkle_root = mini.calculate_merkle_root();
    if merkle_root != mini.merkle_root {
        return Err(ChainError::InvalidBlock(format!(
            "mini-block {} merkle root mismatch. Expected {}, but got {}.",
            mini.index, merkle_root, mini.merkle_root
        )));
    }

    let hash = mini.calculate_hash();
    if hash != mini.hash {
        return Err(ChainError::InvalidBlock(format!(
            "mini-block {} hash mismatch. Expected {}, but got {}.",
            mini.index, hash, mini.hash
        )));
    }
    if let Some(suffix) = rules.difficulty_suffix {
        if !meets_difficulty(&mini.hash, suffix) {
            return Err(ChainError::InvalidBlock(format!(
                "mini-block {} hash {} does not end with {:?}",
                mini.index, mini.hash, suffix
            )));
        }
    }
    Ok(())
}

fn validate_sub_block(sub: &SubBlock, rules: ChainRules<'_>) -> Result<(), ChainError> {
    if !sub.is_sealed() {
        return Err(ChainError::UnsealedChild(format!("sub-block {}", sub.index)));
    }
    for mini in &sub.mini_blocks {
        validate_mini_block(mini, rules)?;
    }
    let hash = sub.calculate_hash();
    if hash != sub.hash {
        return Err(ChainError::InvalidBlock(format!(
            "sub-block {} hash mismatch. Expected {}, but got {}.",
            sub.index, hash, sub.hash
        )));
    }
    Ok(())
}

/// Recomputes every tier of `block` bottom-up. The parent link is not checked here.
pub fn validate_main_block(block: &MainBlock, rules: ChainRules<'_>) -> Result<(), ChainError> {
    if !block.is_sealed() {
        return Err(ChainError::UnsealedChild(format!("main-block {}", block.index)));
    }
    for sub in &block.sub_blocks {
        validate_sub_block(sub, rules)?;
    }
    let hash = block.calculate_hash();
    if hash != block.hash {
        return Err(ChainError::InvalidBlock(format!(
            "main-block {} hash mismatch. Expected {}, but got {}.",
            block.index, hash, block.hash
        )));
    }
    Ok(())
}

/// Full structural check: genesis, contiguous indexes, parent links and every
/// sealed hash, plus whatever `rules` adds.
pub fn validate_chain(blocks: &[MainBlock], rules: ChainRules<'_>) -> Result<(), ChainError> {
    let genesis = blocks
        .first()
        .ok_or_else(|| ChainError::InvalidChain("chain is empty".to_string()))?;
    if genesis.index != 0
        || genesis.previous_hash != GENESIS_PREVIOUS_HASH
        || !genesis.sub_blocks.is_empty()
    {
        return Err(ChainError::InvalidChain("first block is not a genesis block".to_string()));
    }
    validate_main_block(genesis, rules)?;

    for pair in blocks.windows(2) {
        let (parent, block) = (&pair[0], &pair[1]);
        if block.index != parent.index + 1 {
            return Err(ChainError::InvalidChain(format!(
                "Invalid block index. Expected {}, but got {}.",
                parent.index + 1,
                block.index
            )));
        }
        if block.previous_hash != parent.hash {
            return Err(ChainError::InvalidChain(format!(
                "main-block {} does not link to main-block {}",
                block.index, parent.index
            )));
        }
        validate_main_block(block, rules)?;
    }
    Ok(())
}

pub fn is_chain_valid(blocks: &[MainBlock]) -> bool {
    validate_chain(blocks, ChainRules::default()).is_ok()
}
