//! Validator quorum for batch admission.
//!
//! Every trusted validator attests to a batch independently; the batch passes
//! once the affirmative votes reach the configured threshold. This is a
//! bounded-trust heuristic, not a Byzantine agreement protocol.

use crate::config::{AttestationMode, ConsensusConfig, QuorumPolicy};
use crate::error::ChainError;
use crate::transaction::Batch;
use crossbeam_channel::RecvTimeoutError;
use rand::Rng;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Fixed mapping of validator identities to trust flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSet {
    validators: BTreeMap<String, bool>,
}

impl ValidatorSet {
    pub fn new(validators: BTreeMap<String, bool>) -> Self {
        Self { validators }
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn is_trusted(&self, id: &str) -> bool {
        self.validators.get(id).copied().unwrap_or(false)
    }

    pub fn trusted(&self) -> impl Iterator<Item = &str> {
        self.validators
            .iter()
            .filter(|(_, trusted)| **trusted)
            .map(|(id, _)| id.as_str())
    }
}

impl FromIterator<(String, bool)> for ValidatorSet {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Produces one validator's vote on a batch.
pub trait Attestor: Send + Sync {
    fn attest(&self, validator: &str, batch: &Batch) -> bool;
}

/// Votes yes only if every transaction passes the stateless checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionAttestor;

impl Attestor for TransactionAttestor {
    fn attest(&self, _validator: &str, batch: &Batch) -> bool {
        batch.validate().is_ok()
    }
}

/// Placeholder quorum: each vote is an independent draw.
#[derive(Debug, Clone, Copy)]
pub struct RandomAttestor {
    pub approval_rate: f64,
}

impl Attestor for RandomAttestor {
    fn attest(&self, _validator: &str, batch: &Batch) -> bool {
        !batch.is_empty() && rand::thread_rng().gen_bool(self.approval_rate.clamp(0.0, 1.0))
    }
}

/// Vote count for one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub approvals: usize,
    pub rejections: usize,
    pub required: usize,
    pub total: usize,
}

impl Tally {
    pub fn is_approved(&self) -> bool {
        self.approvals >= self.required
    }

    /// Approval can no longer be reached with the votes still outstanding.
    pub fn is_rejected(&self) -> bool {
        self.total - self.rejections < self.required
    }

    pub fn is_decided(&self) -> bool {
        self.is_approved() || self.is_rejected()
    }
}

pub struct QuorumValidator {
    validators: ValidatorSet,
    policy: QuorumPolicy,
    attestor: Arc<dyn Attestor>,
    poll_timeout: Duration,
}

impl QuorumValidator {
    pub fn new(
        validators: ValidatorSet,
        policy: QuorumPolicy,
        attestor: Arc<dyn Attestor>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            validators,
            policy,
            attestor,
            poll_timeout,
        }
    }

    pub fn from_config(config: &ConsensusConfig) -> Self {
        let attestor: Arc<dyn Attestor> = match config.attestation {
            AttestationMode::TransactionChecks => Arc::new(TransactionAttestor),
            AttestationMode::Random => Arc::new(RandomAttestor {
                approval_rate: config.approval_rate,
            }),
        };
        Self::new(
            ValidatorSet::new(config.validators.clone()),
            config.policy,
            attestor,
            config.poll_timeout(),
        )
    }

    pub fn validators(&self) -> &ValidatorSet {
        &self.validators
    }

    /// Affirmative votes needed, counted over the whole validator set.
    pub fn required_votes(&self) -> usize {
        self.policy.required_votes(self.validators.len())
    }

    /// Polls trusted validators in parallel until the outcome is decided or the
    /// poll deadline passes. Untrusted validators are not asked and count as no.
    pub fn poll(&self, batch: &Arc<Batch>) -> Result<Tally, ChainError> {
        let total = self.validators.len();
        let trusted: Vec<String> = self.validators.trusted().map(str::to_string).collect();
        let mut tally = Tally {
            approvals: 0,
            rejections: total - trusted.len(),
            required: self.required_votes(),
            total,
        };
        if batch.is_empty() || tally.is_decided() {
            return Ok(tally);
        }

        let (tx, rx) = crossbeam_channel::bounded(trusted.len());
        for validator in trusted {
            let tx = tx.clone();
            let batch = Arc::clone(batch);
            let attestor = Arc::clone(&self.attestor);
            rayon::spawn(move || {
                let vote = attestor.attest(&validator, &batch);
                // The poller may have stopped listening once the outcome was decided.
                let _ = tx.send((validator, vote));
            });
        }
        drop(tx);

        let deadline = Instant::now() + self.poll_timeout;
        while !tally.is_decided() {
            match rx.recv_deadline(deadline) {
                Ok((validator, vote)) => {
                    debug!(batch = batch.id(), validator = %validator, vote, "validator vote");
                    if vote {
                        tally.approvals += 1;
                    } else {
                        tally.rejections += 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(ChainError::QuorumTimeout {
                        approvals: tally.approvals,
                        required: tally.required,
                    })
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(tally)
    }

    /// `true` when the batch reaches quorum. An empty batch is never approved.
    pub fn validate(&self, batch: &Arc<Batch>) -> Result<bool, ChainError> {
        Ok(!batch.is_empty() && self.poll(batch)?.is_approved())
    }
}
