use crate::blockchain::{Blockchain, MainBlock};
use crate::config::{load_config, Config};
use crate::error::ChainError;
use crate::ledger::InMemoryLedger;
use crate::persistence::InMemoryPersistence;
use crate::pipeline::{AdmissionPipeline, AdmissionReceipt};
use crate::transaction::Transaction;
use crate::worker::WorkerPool;
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeState {
    Ready,
    Degraded,
}

/// Point-in-time view of a node for status output.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub state: NodeState,
    pub height: u64,
    pub last_hash: String,
    pub open_block: u64,
    pub pending_transactions: usize,
    pub admitted_batches: usize,
    pub workers: usize,
    pub chain_valid: bool,
}

/// Installs the fmt subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();
}

pub struct Node {
    pub config: Config,
    pub pipeline: Arc<AdmissionPipeline>,
    pub ledger: Arc<InMemoryLedger>,
    pub persistence: InMemoryPersistence,
    pool: WorkerPool,
    state: RwLock<NodeState>,
}

impl Node {
    pub fn new(config: Config) -> Result<Self, ChainError> {
        let ledger = Arc::new(InMemoryLedger::new());
        let persistence = InMemoryPersistence::new();
        let pipeline = Arc::new(AdmissionPipeline::from_config(
            &config,
            ledger.clone(),
            Arc::new(persistence.clone()),
        )?);
        let pool = WorkerPool::new(config.workers.effective_threads(), config.workers.queue_depth)?;

        info!(
            validators = config.consensus.validators.len(),
            policy = ?config.consensus.policy,
            mini_blocks_per_main = config.chain.layout().mini_blocks_per_main(),
            suffix = pipeline.chain().difficulty_suffix(),
            "node ready"
        );

        Ok(Node {
            config,
            pipeline,
            ledger,
            persistence,
            pool,
            state: RwLock::new(NodeState::Ready),
        })
    }

    /// Loads `path` (defaults if absent) and builds a node from it.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, ChainError> {
        Self::new(load_config(path)?)
    }

    pub fn chain(&self) -> &Arc<Blockchain> {
        self.pipeline.chain()
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    /// Queues one batch on the worker pool.
    pub fn submit(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<Receiver<Result<AdmissionReceipt, ChainError>>, ChainError> {
        let pipeline = Arc::clone(&self.pipeline);
        self.pool.submit(move || pipeline.admit_batch(transactions))
    }

    pub fn admit_all(
        &self,
        batches: Vec<Vec<Transaction>>,
    ) -> Vec<Result<AdmissionReceipt, ChainError>> {
        self.pool.admit_all(&self.pipeline, batches)
    }

    /// Seals the open main-block and re-checks the whole chain.
    pub fn seal(&self) -> Result<Option<MainBlock>, ChainError> {
        let sealed = self.pipeline.seal_open_block()?;
        if !self.chain().is_valid() {
            warn!(height = self.chain().height(), "chain failed validation after seal");
            *self.state.write() = NodeState::Degraded;
        }
        Ok(sealed)
    }

    pub fn summary(&self) -> NodeSummary {
        let chain = self.chain();
        NodeSummary {
            state: self.state(),
            height: chain.height(),
            last_hash: chain.last_hash(),
            open_block: chain.open_index(),
            pending_transactions: chain
                .pending_mini_blocks()
                .iter()
                .map(|m| m.transactions.len())
                .sum(),
            admitted_batches: self.pipeline.dedup().len(),
            workers: self.pool.size(),
            chain_valid: chain.is_valid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;

    fn node() -> Node {
        let mut config = Config::default();
        config.workers.threads = 4;
        config.sealer.target_seal_time_ms = 1;
        Node::new(config).unwrap()
    }

    #[test]
    fn test_node_admits_through_pool() {
        let node = node();
        node.ledger.mint("Alice", Amount::from_coins(100));
        let receipt = node
            .submit(vec![Transaction::new("Alice", "Bob", Amount::from_coins(5), 1)])
            .unwrap()
            .recv()
            .unwrap()
            .unwrap();
        assert_eq!(receipt.main_block_index, 1);

        let summary = node.summary();
        assert_eq!(summary.state, NodeState::Ready);
        assert_eq!(summary.pending_transactions, 1);
        assert_eq!(summary.admitted_batches, 1);
        assert_eq!(summary.workers, 4);
    }

    #[test]
    fn test_seal_advances_height() {
        let node = node();
        let batches = (0..8)
            .map(|ts| vec![Transaction::new("Alice", "Bob", Amount::from_coins(1), ts)])
            .collect();
        assert!(node.admit_all(batches).iter().all(Result::is_ok));

        let block = node.seal().unwrap().unwrap();
        assert_eq!(block.transaction_count(), 8);
        assert_eq!(node.summary().height, 1);
        assert!(node.summary().chain_valid);
    }
}
