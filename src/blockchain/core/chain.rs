use crate::allocator::MiniBlockArena;
use crate::blockchain::core::block::{MainBlock, MiniBlock, SubBlock};
use crate::blockchain::core::validation::{validate_chain, validate_main_block, ChainRules};
use crate::config::BlockLayout;
use crate::error::ChainError;
use parking_lot::RwLock;
use tracing::info;

/// The main-block currently being filled.
#[derive(Debug)]
pub struct OpenBlock {
    pub index: u64,
    pub arena: MiniBlockArena,
}

impl OpenBlock {
    fn new(index: u64, layout: BlockLayout) -> Self {
        OpenBlock {
            index,
            arena: MiniBlockArena::new(layout),
        }
    }
}

/// Sealed main-blocks plus the single open main-block.
///
/// Lock order is always `open` before `blocks`. Admissions hold `open` for
/// reading; sealing, `add_block` and `replace_chain` take it for writing and so
/// wait for every in-flight admission.
#[derive(Debug)]
pub struct Blockchain {
    blocks: RwLock<Vec<MainBlock>>,
    open: RwLock<OpenBlock>,
    layout: BlockLayout,
    difficulty_suffix: String,
}

impl Blockchain {
    /// Genesis plus an empty open main-block at index 1.
    pub fn new(layout: BlockLayout, difficulty_suffix: impl Into<String>) -> Self {
        Blockchain {
            blocks: RwLock::new(vec![MainBlock::genesis()]),
            open: RwLock::new(OpenBlock::new(1, layout)),
            layout,
            difficulty_suffix: difficulty_suffix.into(),
        }
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    pub fn difficulty_suffix(&self) -> &str {
        &self.difficulty_suffix
    }

    /// What every block on this chain must satisfy beyond its hashes.
    pub fn rules(&self) -> ChainRules<'_> {
        ChainRules {
            difficulty_suffix: Some(&self.difficulty_suffix),
            max_mini_block_size: Some(self.layout.max_mini_block_size),
        }
    }

    /// Runs `f` against the open block while holding off any seal of it.
    pub fn with_open_block<R>(&self, f: impl FnOnce(&OpenBlock) -> R) -> R {
        let open = self.open.read();
        f(&open)
    }

    pub fn open_index(&self) -> u64 {
        self.open.read().index
    }

    /// Committed mini-blocks of the open main-block.
    pub fn pending_mini_blocks(&self) -> Vec<MiniBlock> {
        self.open.read().arena.snapshot()
    }

    /// Seals the open main-block into the chain and opens the next one.
    /// Returns `None` if nothing has been committed to the open block yet.
    pub fn seal_open_block(&self) -> Result<Option<MainBlock>, ChainError> {
        let mut open = self.open.write();
        self.seal_locked(&mut open)
    }

    /// Seals only if main-block `index` is still open and has no room left.
    pub fn seal_if_exhausted(&self, index: u64) -> Result<Option<MainBlock>, ChainError> {
        let mut open = self.open.write();
        if open.index != index || !open.arena.is_exhausted() {
            return Ok(None);
        }
        self.seal_locked(&mut open)
    }

    fn seal_locked(&self, open: &mut OpenBlock) -> Result<Option<MainBlock>, ChainError> {
        if !open.arena.has_committed() {
            return Ok(None);
        }

        let mut blocks = self.blocks.write();
        let previous_hash = blocks
            .last()
            .map(|b| b.hash.clone())
            .ok_or_else(|| ChainError::InvalidChain("chain has no genesis block".to_string()))?;

        let next = OpenBlock::new(open.index + 1, self.layout);
        let sealing = std::mem::replace(open, next);

        let mut main_block = MainBlock::new(sealing.index, previous_hash);
        for (position, group) in sealing.arena.into_groups().into_iter().enumerate() {
            let committed: Vec<MiniBlock> =
                group.into_iter().filter(MiniBlock::is_sealed).collect();
            if committed.is_empty() {
                continue;
            }
            let mut sub_block = SubBlock::new(position as u64);
            for mini_block in committed {
                sub_block.push_mini_block(mini_block)?;
            }
            sub_block.seal()?;
            main_block.push_sub_block(sub_block)?;
        }
        main_block.seal()?;

        info!(
            height = main_block.index,
            sub_blocks = main_block.sub_blocks.len(),
            transactions = main_block.transaction_count(),
            hash = %main_block.hash,
            "main-block sealed"
        );
        blocks.push(main_block.clone());
        Ok(Some(main_block))
    }

    /// Appends an externally assembled main-block on top of the chain.
    pub fn add_block(&self, block: MainBlock) -> Result<(), ChainError> {
        let mut open = self.open.write();
        if open.arena.has_committed() {
            return Err(ChainError::InvalidBlock(format!(
                "main-block {} is open with committed transactions",
                open.index
            )));
        }

        let mut blocks = self.blocks.write();
        let last = blocks
            .last()
            .ok_or_else(|| ChainError::InvalidChain("chain has no genesis block".to_string()))?;
        if block.index != last.index + 1 {
            return Err(ChainError::InvalidBlock(format!(
                "Invalid block index. Expected {}, but got {}.",
                last.index + 1,
                block.index
            )));
        }
        if block.previous_hash != last.hash {
            return Err(ChainError::InvalidBlock(format!(
                "Invalid previous block hash. Expected {}, but got {}.",
                last.hash, block.previous_hash
            )));
        }
        validate_main_block(&block, self.rules())?;

        info!(height = block.index, hash = %block.hash, "main-block added");
        *open = OpenBlock::new(block.index + 1, self.layout);
        blocks.push(block);
        Ok(())
    }

    /// Adopts `candidate` if it is strictly longer than the local chain and valid.
    pub fn replace_chain(&self, candidate: Vec<MainBlock>) -> Result<(), ChainError> {
        let mut open = self.open.write();
        if open.arena.has_committed() {
            return Err(ChainError::InvalidChain(format!(
                "main-block {} is open with committed transactions",
                open.index
            )));
        }

        let mut blocks = self.blocks.write();
        if candidate.len() <= blocks.len() {
            return Err(ChainError::InvalidChain(format!(
                "candidate chain of {} blocks is not longer than the local chain of {}",
                candidate.len(),
                blocks.len()
            )));
        }
        validate_chain(&candidate, self.rules())?;

        let tip = candidate.last().map_or(0, |b| b.index);
        info!(height = tip, replaced = blocks.len(), "chain replaced");
        *open = OpenBlock::new(tip + 1, self.layout);
        *blocks = candidate;
        Ok(())
    }

    pub fn blocks(&self) -> Vec<MainBlock> {
        self.blocks.read().clone()
    }

    /// Index of the last sealed main-block.
    pub fn height(&self) -> u64 {
        self.blocks.read().last().map_or(0, |b| b.index)
    }

    pub fn last_hash(&self) -> String {
        self.blocks.read().last().map(|b| b.hash.clone()).unwrap_or_default()
    }

    pub fn is_valid(&self) -> bool {
        validate_chain(&self.blocks.read(), self.rules()).is_ok()
    }
}
