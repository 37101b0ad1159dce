//! Proof sealing for mini-blocks.
//!
//! A mini-block is sealed once its hex hash ends with the difficulty suffix. The
//! suffix is deliberately short: the seal makes every mini-block verifiable, it
//! is not meant to be expensive. Sub- and main-blocks carry no nonce; their proof
//! is the aggregation hash over already sealed children.

use crate::blockchain::MiniBlock;
use crate::config::SealerConfig;
use crate::error::ChainError;
use std::time::{Duration, Instant};
use tracing::debug;

/// Character every difficulty suffix is made of.
pub const SUFFIX_CHAR: char = '0';

/// How often the wall-clock deadline is checked during the nonce search.
const DEADLINE_CHECK_INTERVAL: u64 = 1_024;

/// Shorter targets get shorter suffixes.
pub fn difficulty_suffix(target_seal_time: Duration) -> String {
    let width = if target_seal_time < Duration::from_millis(10) {
        1
    } else if target_seal_time < Duration::from_secs(1) {
        2
    } else {
        3
    };
    std::iter::repeat(SUFFIX_CHAR).take(width).collect()
}

pub fn meets_difficulty(hash: &str, suffix: &str) -> bool {
    !hash.is_empty() && hash.ends_with(suffix)
}

#[derive(Debug, Clone)]
pub struct ProofSealer {
    suffix: String,
    max_iterations: u64,
    deadline: Duration,
}

impl ProofSealer {
    pub fn new(suffix: impl Into<String>, max_iterations: u64, deadline: Duration) -> Self {
        ProofSealer {
            suffix: suffix.into(),
            max_iterations,
            deadline,
        }
    }

    pub fn from_config(config: &SealerConfig) -> Self {
        Self::new(
            difficulty_suffix(config.target_seal_time()),
            config.max_iterations,
            config.deadline(),
        )
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Recomputes the Merkle root, then searches nonces from zero until the hash
    /// meets the suffix. On failure the block's nonce and hash are left as they
    /// were before the call.
    pub fn seal(&self, block: &mut MiniBlock) -> Result<(), ChainError> {
        block.merkle_root = block.calculate_merkle_root();
        let prefix = block.hash_prefix();
        let started = Instant::now();

        for nonce in 0..self.max_iterations {
            let hash = MiniBlock::hash_with_nonce(&prefix, nonce);
            if meets_difficulty(&hash, &self.suffix) {
                debug!(mini_block = block.index, nonce, "mini-block sealed");
                block.nonce = nonce;
                block.hash = hash;
                return Ok(());
            }
            if nonce % DEADLINE_CHECK_INTERVAL == DEADLINE_CHECK_INTERVAL - 1
                && started.elapsed() > self.deadline
            {
                return Err(ChainError::SealTimeout { iterations: nonce + 1 });
            }
        }

        Err(ChainError::SealTimeout {
            iterations: self.max_iterations,
        })
    }

    /// True if `block` carries a seal that is both reproducible and meets the suffix.
    pub fn verify(&self, block: &MiniBlock) -> bool {
        meets_difficulty(&block.hash, &self.suffix) && block.hash == block.calculate_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use crate::transaction::Transaction;

    fn mini_with_tx() -> MiniBlock {
        let mut mini = MiniBlock::new(7);
        mini.transactions
            .push(Transaction::new("Alice", "Bob", Amount::from_coins(500), 1_700_000_000));
        mini
    }

    #[test]
    fn test_suffix_follows_target_time() {
        assert_eq!(difficulty_suffix(Duration::from_millis(1)), "0");
        assert_eq!(difficulty_suffix(Duration::from_millis(10)), "00");
        assert_eq!(difficulty_suffix(Duration::from_millis(999)), "00");
        assert_eq!(difficulty_suffix(Duration::from_secs(5)), "000");
    }

    #[test]
    fn test_seal_produces_verifiable_hash() {
        let sealer = ProofSealer::new("00", 1_000_000, Duration::from_secs(10));
        let mut mini = mini_with_tx();
        sealer.seal(&mut mini).unwrap();

        assert!(mini.hash.ends_with("00"));
        assert_eq!(mini.hash, mini.calculate_hash());
        assert_eq!(mini.merkle_root, mini.calculate_merkle_root());
        assert!(sealer.verify(&mini));
    }

    #[test]
    fn test_exhausted_search_times_out_and_leaves_block_unsealed() {
        // No hex digest ends in 'g'.
        let sealer = ProofSealer::new("g", 50, Duration::from_secs(10));
        let mut mini = mini_with_tx();
        assert_eq!(sealer.seal(&mut mini), Err(ChainError::SealTimeout { iterations: 50 }));
        assert!(!mini.is_sealed());
        assert_eq!(mini.nonce, 0);
    }

    #[test]
    fn test_deadline_stops_search() {
        let sealer = ProofSealer::new("g", u64::MAX, Duration::ZERO);
        let mut mini = mini_with_tx();
        match sealer.seal(&mut mini) {
            Err(ChainError::SealTimeout { iterations }) => {
                assert_eq!(iterations, DEADLINE_CHECK_INTERVAL)
            }
            other => panic!("Expected SealTimeout, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_rejects_tampered_block() {
        let sealer = ProofSealer::new("0", 1_000_000, Duration::from_secs(10));
        let mut mini = mini_with_tx();
        sealer.seal(&mut mini).unwrap();
        mini.transactions[0].amount = Amount::from_coins(501);
        assert!(!sealer.verify(&mini));
    }
}
