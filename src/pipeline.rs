//! Batch admission: dedup, quorum, allocation, sealing, accounting, commit.
//!
//! A batch moves one way through the stages and stops at the first failure.
//! Nothing is written to a mini-block until every stage before `Committed` has
//! succeeded, so readers only ever see sealed mini-blocks.

use crate::allocator::{MiniBlockArena, Reservation};
use crate::blockchain::{Blockchain, MainBlock, MiniBlock};
use crate::config::Config;
use crate::consensus::{QuorumValidator, Tally};
use crate::dedup::DedupRegistry;
use crate::economics::RewardSchedule;
use crate::error::ChainError;
use crate::ledger::Ledger;
use crate::miner::ProofSealer;
use crate::persistence::Persistence;
use crate::transaction::{Batch, Transaction};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BatchStage {
    Received,
    Deduplicated,
    QuorumApproved,
    Allocated,
    Sealed,
    Accounted,
    Committed,
    Rejected,
}

impl fmt::Display for BatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchStage::Received => "received",
            BatchStage::Deduplicated => "deduplicated",
            BatchStage::QuorumApproved => "quorum-approved",
            BatchStage::Allocated => "allocated",
            BatchStage::Sealed => "sealed",
            BatchStage::Accounted => "accounted",
            BatchStage::Committed => "committed",
            BatchStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// Outcome of a committed batch.
#[derive(Debug, Clone)]
pub struct AdmissionReceipt {
    pub batch_id: String,
    pub main_block_index: u64,
    /// The mini-block as committed by this batch.
    pub mini_block: MiniBlock,
    pub tally: Tally,
    pub stages: Vec<BatchStage>,
    /// Ledger transfers that failed after commit. The commit stands regardless.
    pub ledger_errors: Vec<ChainError>,
    /// Set when this commit filled the open main-block and it was sealed.
    pub sealed_main_block: Option<u64>,
}

/// A batch that stopped short of `Committed`.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub batch_id: String,
    /// Every stage the batch reached, ending in `Rejected`.
    pub stages: Vec<BatchStage>,
    pub error: ChainError,
}

pub struct AdmissionPipeline {
    chain: Arc<Blockchain>,
    dedup: DedupRegistry,
    quorum: QuorumValidator,
    sealer: ProofSealer,
    rewards: RewardSchedule,
    ledger: Arc<dyn Ledger>,
    persistence: Arc<dyn Persistence>,
    auto_seal: bool,
}

impl AdmissionPipeline {
    pub fn from_config(
        config: &Config,
        ledger: Arc<dyn Ledger>,
        persistence: Arc<dyn Persistence>,
    ) -> Result<Self, ChainError> {
        config.validate()?;
        let sealer = ProofSealer::from_config(&config.sealer);
        let chain = Arc::new(Blockchain::new(config.chain.layout(), sealer.suffix()));
        Ok(AdmissionPipeline {
            chain,
            dedup: DedupRegistry::new(),
            quorum: QuorumValidator::from_config(&config.consensus),
            sealer,
            rewards: RewardSchedule::from_config(&config.rewards),
            ledger,
            persistence,
            auto_seal: config.chain.auto_seal_full_blocks,
        })
    }

    /// Swaps the validator quorum, e.g. for a custom attestor.
    pub fn with_quorum(mut self, quorum: QuorumValidator) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn chain(&self) -> &Arc<Blockchain> {
        &self.chain
    }

    pub fn dedup(&self) -> &DedupRegistry {
        &self.dedup
    }

    pub fn quorum(&self) -> &QuorumValidator {
        &self.quorum
    }

    pub fn admit_batch(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<AdmissionReceipt, ChainError> {
        self.admit(transactions).map_err(|rejection| rejection.error)
    }

    /// Same as `admit_batch`, but a failure keeps the stages the batch got through.
    pub fn admit(&self, transactions: Vec<Transaction>) -> Result<AdmissionReceipt, Rejection> {
        let batch = Arc::new(Batch::new(transactions));
        let mut stages = vec![BatchStage::Received];
        debug!(batch = batch.id(), transactions = batch.len(), "batch received");

        if batch.is_empty() {
            let required = self.quorum.required_votes();
            let error = ChainError::QuorumRejected { approvals: 0, required };
            return Err(self.reject(&batch, stages, error));
        }

        // Stateless checks run whatever the attestor, so nothing the chain
        // validator would refuse can reach a mini-block.
        if let Err(e) = batch.validate() {
            return Err(self.reject(&batch, stages, e));
        }

        if !self.dedup.admit(batch.id()) {
            let error = ChainError::DuplicateBatch(batch.id().to_string());
            return Err(self.reject(&batch, stages, error));
        }
        stages.push(BatchStage::Deduplicated);

        let tally = match self.quorum.poll(&batch) {
            Ok(tally) if tally.is_approved() => tally,
            Ok(tally) => {
                let error = ChainError::QuorumRejected {
                    approvals: tally.approvals,
                    required: tally.required,
                };
                return Err(self.reject(&batch, stages, error));
            }
            Err(e) => return Err(self.reject(&batch, stages, e)),
        };
        stages.push(BatchStage::QuorumApproved);

        let committed = self.chain.with_open_block(|open| -> Result<(u64, MiniBlock), ChainError> {
            let reservation = open.arena.reserve(batch.byte_size())?;
            stages.push(BatchStage::Allocated);
            let sealed =
                self.seal_and_commit(open.index, &open.arena, &reservation, &batch, &mut stages);
            if sealed.is_err() {
                open.arena.release(&reservation);
            }
            sealed.map(|mini_block| (open.index, mini_block))
        });
        let (main_block_index, mini_block) = match committed {
            Ok(committed) => committed,
            Err(e) => return Err(self.reject(&batch, stages, e)),
        };

        info!(
            batch = batch.id(),
            main_block = main_block_index,
            mini_block = mini_block.index,
            size = mini_block.current_size,
            full = mini_block.is_full,
            "batch committed"
        );

        let mut ledger_errors = Vec::new();
        for tx in batch.transactions() {
            if let Err(e) = self.ledger.transfer(&tx.sender, &tx.receiver, tx.amount) {
                warn!(batch = batch.id(), tx = %tx.id(), error = %e, "ledger transfer failed");
                ledger_errors.push(e);
            }
        }

        let sealed_main_block = if self.auto_seal {
            match self.chain.seal_if_exhausted(main_block_index) {
                Ok(Some(block)) => {
                    self.persist_main_block(&block);
                    Some(block.index)
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(main_block = main_block_index, error = %e, "automatic seal failed");
                    None
                }
            }
        } else {
            None
        };

        Ok(AdmissionReceipt {
            batch_id: batch.id().to_string(),
            main_block_index,
            mini_block,
            tally,
            stages,
            ledger_errors,
            sealed_main_block,
        })
    }

    /// Seals a private copy of the reserved mini-block with the batch appended and
    /// publishes it only once sealing and accounting have succeeded.
    fn seal_and_commit(
        &self,
        main_index: u64,
        arena: &MiniBlockArena,
        reservation: &Reservation,
        batch: &Batch,
        stages: &mut Vec<BatchStage>,
    ) -> Result<MiniBlock, ChainError> {
        let mut slot = arena.lock_slot(reservation.id).ok_or_else(|| {
            ChainError::InvalidBlock(format!(
                "mini-block {} is not in the open block",
                reservation.id
            ))
        })?;

        let mut working = slot.clone();
        working.transactions.extend(batch.transactions().iter().cloned());
        working.current_size += reservation.size;
        working.is_full = working.current_size >= arena.layout().max_mini_block_size;

        self.sealer.seal(&mut working)?;
        stages.push(BatchStage::Sealed);

        self.rewards.account(&mut working);
        stages.push(BatchStage::Accounted);

        *slot = working.clone();
        stages.push(BatchStage::Committed);

        // Still under the slot lock, so the hook sees one mini-block's commits in order.
        if let Err(e) = self.persistence.save_mini_block(main_index, &working) {
            warn!(batch = batch.id(), error = %e, "failed to persist mini-block");
        }
        Ok(working)
    }

    /// Seals whatever the open main-block holds, regardless of fill level.
    pub fn seal_open_block(&self) -> Result<Option<MainBlock>, ChainError> {
        let sealed = self.chain.seal_open_block()?;
        if let Some(block) = &sealed {
            self.persist_main_block(block);
        }
        Ok(sealed)
    }

    fn persist_main_block(&self, block: &MainBlock) {
        if let Err(e) = self.persistence.save_main_block(block) {
            warn!(height = block.index, error = %e, "failed to persist main-block");
        }
    }

    fn reject(
        &self,
        batch: &Batch,
        mut stages: Vec<BatchStage>,
        error: ChainError,
    ) -> Rejection {
        let after = stages.last().copied().unwrap_or(BatchStage::Received);
        info!(batch = batch.id(), after = %after, error = %error, "batch rejected");
        stages.push(BatchStage::Rejected);
        Rejection {
            batch_id: batch.id().to_string(),
            stages,
            error,
        }
    }
}
