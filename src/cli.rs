//! Shared helpers for the command-line binaries

use crate::amount::Amount;
use crate::config::{load_config, Config};
use crate::error::ChainError;
use crate::node::Node;
use crate::transaction::Transaction;
use rand::Rng;
use std::path::Path;

/// Default config file looked up by the binaries.
pub const DEFAULT_CONFIG_PATH: &str = "tierchain.toml";

const DEMO_ACCOUNTS: [&str; 6] = ["Alice", "Bob", "Carol", "Dave", "Erin", "Frank"];

/// Loads the config at `path` and builds a node from it.
pub fn load_node_from_config(path: impl AsRef<Path>) -> Result<(Config, Node), ChainError> {
    let config = load_config(path)?;
    let node = Node::new(config.clone())?;
    Ok((config, node))
}

/// Funds every demo account so generated transfers clear the ledger.
pub fn fund_demo_accounts(node: &Node, per_account: Amount) {
    for account in DEMO_ACCOUNTS {
        node.ledger.mint(account, per_account);
    }
}

/// `count` random batches of 1..=`max_batch_len` transfers between demo accounts.
/// Timestamps start at `base_timestamp` and are unique across the workload.
pub fn demo_batches(
    count: usize,
    max_batch_len: usize,
    base_timestamp: i64,
) -> Vec<Vec<Transaction>> {
    let mut rng = rand::thread_rng();
    let mut timestamp = base_timestamp;
    (0..count)
        .map(|_| {
            let len = rng.gen_range(1..=max_batch_len.max(1));
            (0..len)
                .map(|_| {
                    let from = rng.gen_range(0..DEMO_ACCOUNTS.len());
                    let to = (from + rng.gen_range(1..DEMO_ACCOUNTS.len())) % DEMO_ACCOUNTS.len();
                    timestamp += 1;
                    Transaction::new(
                        DEMO_ACCOUNTS[from],
                        DEMO_ACCOUNTS[to],
                        Amount::from_minor(rng.gen_range(1..=10_000)),
                        timestamp,
                    )
                })
                .collect()
        })
        .collect()
}

/// `head…tail` form of a long hex digest.
pub fn format_hash(hash: &str) -> String {
    let chars: Vec<char> = hash.chars().collect();
    if chars.len() > 20 {
        let head: String = chars[..10].iter().collect();
        let tail: String = chars[chars.len() - 8..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        hash.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_batches_are_valid_and_distinct() {
        let batches = demo_batches(20, 4, 1_700_000_000);
        assert_eq!(batches.len(), 20);
        let mut ids = std::collections::HashSet::new();
        for batch in &batches {
            assert!((1..=4).contains(&batch.len()));
            for tx in batch {
                tx.validate().unwrap();
            }
            assert!(ids.insert(crate::transaction::Batch::identity(batch)));
        }
    }

    #[test]
    fn test_format_hash() {
        let hash = "ab".repeat(32);
        assert_eq!(format_hash(&hash), "ababababab...abababab");
        assert_eq!(format_hash("0"), "0");
        // Multi-byte characters from a peer must not split mid-character.
        let odd = "é".repeat(30);
        assert_eq!(format_hash(&odd), format!("{}...{}", "é".repeat(10), "é".repeat(8)));
    }
}
