//! Post-commit hook for storing or broadcasting sealed blocks

use crate::blockchain::{MainBlock, MiniBlock};
use crate::error::ChainError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Receives every committed mini-block and every sealed main-block.
/// Implementations must be cheap or hand work off; they run on admission workers.
pub trait Persistence: Send + Sync {
    fn save_mini_block(&self, main_index: u64, mini_block: &MiniBlock) -> Result<(), ChainError>;
    fn save_main_block(&self, block: &MainBlock) -> Result<(), ChainError>;
}

/// Simple in-memory persistence implementation useful for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    pub mini_blocks: Arc<Mutex<Vec<(u64, MiniBlock)>>>,
    pub main_blocks: Arc<Mutex<Vec<MainBlock>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mini_block_count(&self) -> usize {
        self.mini_blocks.lock().len()
    }

    /// Latest saved copy of mini-block `index` under main-block `main_index`.
    pub fn mini_block(&self, main_index: u64, index: u64) -> Option<MiniBlock> {
        self.mini_blocks
            .lock()
            .iter()
            .find(|(main, m)| *main == main_index && m.index == index)
            .map(|(_, m)| m.clone())
    }

    pub fn main_blocks(&self) -> Vec<MainBlock> {
        self.main_blocks.lock().clone()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_mini_block(&self, main_index: u64, mini_block: &MiniBlock) -> Result<(), ChainError> {
        let mut stored = self.mini_blocks.lock();
        stored.retain(|(index, m)| !(*index == main_index && m.index == mini_block.index));
        stored.push((main_index, mini_block.clone()));
        Ok(())
    }

    fn save_main_block(&self, block: &MainBlock) -> Result<(), ChainError> {
        let mut blocks = self.main_blocks.lock();
        blocks.retain(|b| b.index != block.index);
        blocks.push(block.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resaving_replaces_previous_copy() {
        let persistence = InMemoryPersistence::new();
        let mut mini = MiniBlock::new(3);
        persistence.save_mini_block(1, &mini).unwrap();
        mini.nonce = 9;
        persistence.save_mini_block(1, &mini).unwrap();
        persistence.save_mini_block(2, &mini).unwrap();
        assert_eq!(persistence.mini_block_count(), 2);
        assert_eq!(persistence.mini_block(1, 3).map(|m| m.nonce), Some(9));
        assert!(persistence.mini_block(1, 4).is_none());

        persistence.save_main_block(&MainBlock::genesis()).unwrap();
        persistence.save_main_block(&MainBlock::genesis()).unwrap();
        assert_eq!(persistence.main_blocks().len(), 1);
    }

    #[test]
    fn test_clones_share_storage() {
        let persistence = InMemoryPersistence::new();
        let handle = persistence.clone();
        handle.save_main_block(&MainBlock::genesis()).unwrap();
        assert_eq!(persistence.main_blocks().len(), 1);
    }
}
