use crate::amount::Amount;
use crate::error::ChainError;
use crate::merkle::{self, MerkleProof};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// `previous_hash` of the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Smallest tier: a run of admitted transactions sealed by a nonce search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiniBlock {
    pub index: u64,
    pub transactions: Vec<Transaction>,
    pub current_size: usize,
    pub is_full: bool,
    pub merkle_root: String,
    pub nonce: u64,
    /// Empty until sealed.
    pub hash: String,
    pub reward: Amount,
}

impl MiniBlock {
    pub fn new(index: u64) -> Self {
        MiniBlock {
            index,
            transactions: Vec::new(),
            current_size: 0,
            is_full: false,
            merkle_root: String::new(),
            nonce: 0,
            hash: String::new(),
            reward: Amount::ZERO,
        }
    }

    pub fn is_sealed(&self) -> bool {
        !self.hash.is_empty()
    }

    /// Hasher primed with `index ‖ transactions`; the nonce is appended per attempt.
    pub fn hash_prefix(&self) -> Sha256 {
        let mut record = self.index.to_string();
        for tx in &self.transactions {
            tx.write_canonical(&mut record);
        }
        let mut hasher = Sha256::new();
        hasher.update(record.as_bytes());
        hasher
    }

    pub fn hash_with_nonce(prefix: &Sha256, nonce: u64) -> String {
        let mut hasher = prefix.clone();
        hasher.update(nonce.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn calculate_hash(&self) -> String {
        Self::hash_with_nonce(&self.hash_prefix(), self.nonce)
    }

    pub fn calculate_merkle_root(&self) -> String {
        merkle::merkle_root(&self.transactions)
    }

    pub fn total_amount(&self) -> Amount {
        self.transactions.iter().map(|tx| tx.amount).sum()
    }

    /// Inclusion proof for the transaction at `position`.
    pub fn inclusion_proof(&self, position: usize) -> Option<MerkleProof> {
        MerkleProof::for_transaction(&self.transactions, position)
    }
}

/// Middle tier: the mini-blocks of one slice of a main-block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubBlock {
    pub index: u64,
    pub mini_blocks: Vec<MiniBlock>,
    pub hash: String,
}

impl SubBlock {
    pub fn new(index: u64) -> Self {
        SubBlock {
            index,
            mini_blocks: Vec::new(),
            hash: String::new(),
        }
    }

    pub fn is_sealed(&self) -> bool {
        !self.hash.is_empty()
    }

    pub fn push_mini_block(&mut self, mini_block: MiniBlock) -> Result<(), ChainError> {
        if self.is_sealed() {
            return Err(ChainError::BlockSealed(format!("sub-block {}", self.index)));
        }
        self.mini_blocks.push(mini_block);
        Ok(())
    }

    pub fn calculate_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_string().as_bytes());
        for mini in &self.mini_blocks {
            hasher.update(mini.hash.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Fixes the aggregation hash. Every mini-block must already be sealed.
    pub fn seal(&mut self) -> Result<&str, ChainError> {
        if self.is_sealed() {
            return Err(ChainError::BlockSealed(format!("sub-block {}", self.index)));
        }
        if let Some(unsealed) = self.mini_blocks.iter().find(|m| !m.is_sealed()) {
            return Err(ChainError::UnsealedChild(format!(
                "sub-block {} (mini-block {})",
                self.index, unsealed.index
            )));
        }
        self.hash = self.calculate_hash();
        Ok(&self.hash)
    }

    pub fn transaction_count(&self) -> usize {
        self.mini_blocks.iter().map(|m| m.transactions.len()).sum()
    }
}

/// Top tier, linked into the chain through `previous_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainBlock {
    pub index: u64,
    pub previous_hash: String,
    pub sub_blocks: Vec<SubBlock>,
    pub hash: String,
}

impl MainBlock {
    pub fn new(index: u64, previous_hash: impl Into<String>) -> Self {
        MainBlock {
            index,
            previous_hash: previous_hash.into(),
            sub_blocks: Vec::new(),
            hash: String::new(),
        }
    }

    pub fn genesis() -> Self {
        let mut genesis = MainBlock::new(0, GENESIS_PREVIOUS_HASH);
        genesis.hash = genesis.calculate_hash();
        genesis
    }

    pub fn is_sealed(&self) -> bool {
        !self.hash.is_empty()
    }

    pub fn push_sub_block(&mut self, sub_block: SubBlock) -> Result<(), ChainError> {
        if self.is_sealed() {
            return Err(ChainError::BlockSealed(format!("main-block {}", self.index)));
        }
        self.sub_blocks.push(sub_block);
        Ok(())
    }

    pub fn calculate_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_string().as_bytes());
        for sub in &self.sub_blocks {
            hasher.update(sub.hash.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Fixes the aggregation hash. Every sub-block must already be sealed.
    pub fn seal(&mut self) -> Result<&str, ChainError> {
        if self.is_sealed() {
            return Err(ChainError::BlockSealed(format!("main-block {}", self.index)));
        }
        if let Some(unsealed) = self.sub_blocks.iter().find(|s| !s.is_sealed()) {
            return Err(ChainError::UnsealedChild(format!(
                "main-block {} (sub-block {})",
                self.index, unsealed.index
            )));
        }
        self.hash = self.calculate_hash();
        Ok(&self.hash)
    }

    pub fn mini_blocks(&self) -> impl Iterator<Item = &MiniBlock> {
        self.sub_blocks.iter().flat_map(|s| s.mini_blocks.iter())
    }

    pub fn transaction_count(&self) -> usize {
        self.sub_blocks.iter().map(SubBlock::transaction_count).sum()
    }

    pub fn total_reward(&self) -> Amount {
        self.mini_blocks().map(|m| m.reward).sum()
    }
}
