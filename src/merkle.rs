//! Merkle roots and inclusion proofs over mini-block transactions.
//!
//! Behavior:
//! - Leaves are transaction identities (hex SHA-256 of the canonical fields).
//! - A parent is the hex SHA-256 of `left_hex ‖ right_hex`.
//! - Odd levels duplicate their last element before pairing.
//! - A single leaf is its own root; no leaves yields an empty root.

use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}

fn next_level(level: &[String]) -> Vec<String> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_pair(left, right),
            [last] => hash_pair(last, last),
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

/// Computes a Merkle root from leaf digests.
pub fn root_from_leaves(leaves: Vec<String>) -> String {
    let mut level = leaves;
    if level.is_empty() {
        return String::new();
    }
    while level.len() > 1 {
        level = next_level(&level);
    }
    level.swap_remove(0)
}

pub fn merkle_root(transactions: &[Transaction]) -> String {
    root_from_leaves(transactions.iter().map(Transaction::id).collect())
}

/// Position of a sibling relative to the running hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Path from one leaf up to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub siblings: Vec<(Side, String)>,
}

impl MerkleProof {
    /// Builds the proof for `leaf_index`, or `None` if it is out of range.
    pub fn build(leaves: &[String], leaf_index: usize) -> Option<Self> {
        if leaf_index >= leaves.len() {
            return None;
        }
        let mut siblings = Vec::new();
        let mut level = leaves.to_vec();
        let mut index = leaf_index;
        while level.len() > 1 {
            let sibling = if index % 2 == 0 {
                // The last odd node is paired with itself.
                let right = level.get(index + 1).unwrap_or(&level[index]);
                (Side::Right, right.clone())
            } else {
                (Side::Left, level[index - 1].clone())
            };
            siblings.push(sibling);
            level = next_level(&level);
            index /= 2;
        }
        Some(MerkleProof { leaf_index, siblings })
    }

    pub fn for_transaction(transactions: &[Transaction], leaf_index: usize) -> Option<Self> {
        let leaves: Vec<String> = transactions.iter().map(Transaction::id).collect();
        Self::build(&leaves, leaf_index)
    }

    pub fn verify(&self, leaf: &str, root: &str) -> bool {
        let computed = self
            .siblings
            .iter()
            .fold(leaf.to_string(), |acc, (side, sibling)| match side {
                Side::Left => hash_pair(sibling, &acc),
                Side::Right => hash_pair(&acc, sibling),
            });
        !root.is_empty() && computed == root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;

    fn leaf(data: &str) -> String {
        hex::encode(Sha256::digest(data.as_bytes()))
    }

    #[test]
    fn empty_returns_empty_root() {
        assert_eq!(root_from_leaves(Vec::new()), "");
        assert_eq!(merkle_root(&[]), "");
    }

    #[test]
    fn single_leaf_returns_leaf() {
        let a = leaf("a");
        assert_eq!(root_from_leaves(vec![a.clone()]), a);
    }

    #[test]
    fn even_number_of_leaves_matches_manual_reduction() {
        let (a, b, c, d) = (leaf("a"), leaf("b"), leaf("c"), leaf("d"));
        let expected = hash_pair(&hash_pair(&a, &b), &hash_pair(&c, &d));
        assert_eq!(root_from_leaves(vec![a, b, c, d]), expected);
    }

    #[test]
    fn odd_number_of_leaves_duplicates_last() {
        let (a, b, c) = (leaf("a"), leaf("b"), leaf("c"));
        let expected = hash_pair(&hash_pair(&a, &b), &hash_pair(&c, &c));
        assert_eq!(root_from_leaves(vec![a, b, c]), expected);
    }

    #[test]
    fn transaction_root_uses_transaction_ids() {
        let txs = vec![
            Transaction::new("Alice", "Bob", Amount::from_coins(5), 10),
            Transaction::new("Bob", "Carol", Amount::from_coins(3), 11),
        ];
        assert_eq!(merkle_root(&txs), hash_pair(&txs[0].id(), &txs[1].id()));
    }

    #[test]
    fn proofs_verify_for_every_leaf() {
        let leaves: Vec<String> = (0..5).map(|i| leaf(&i.to_string())).collect();
        let root = root_from_leaves(leaves.clone());
        for (i, l) in leaves.iter().enumerate() {
            let proof = MerkleProof::build(&leaves, i).unwrap();
            assert!(proof.verify(l, &root), "leaf {} failed", i);
        }
    }

    #[test]
    fn proof_rejects_wrong_leaf_or_root() {
        let leaves: Vec<String> = (0..4).map(|i| leaf(&i.to_string())).collect();
        let root = root_from_leaves(leaves.clone());
        let proof = MerkleProof::build(&leaves, 2).unwrap();
        assert!(!proof.verify(&leaves[1], &root));
        assert!(!proof.verify(&leaves[2], &leaf("other")));
        assert!(MerkleProof::build(&leaves, 4).is_none());
    }
}
