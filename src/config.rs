//! Configuration management for TierChain

use crate::amount::Amount;
use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Upper bound on mini-blocks grouped under one sub-block.
pub const MAX_MINI_BLOCKS_PER_SUB_BLOCK: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub sealer: SealerConfig,
    #[serde(default)]
    pub rewards: RewardConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_max_main_block_size")]
    pub max_main_block_size: usize,
    #[serde(default = "default_max_sub_block_size")]
    pub max_sub_block_size: usize,
    #[serde(default = "default_max_mini_block_size")]
    pub max_mini_block_size: usize,
    /// Seal the open main-block as soon as every mini-block in it is full.
    #[serde(default = "default_true")]
    pub auto_seal_full_blocks: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_main_block_size: default_max_main_block_size(),
            max_sub_block_size: default_max_sub_block_size(),
            max_mini_block_size: default_max_mini_block_size(),
            auto_seal_full_blocks: true,
        }
    }
}

impl ChainConfig {
    pub fn layout(&self) -> BlockLayout {
        BlockLayout {
            max_mini_block_size: self.max_mini_block_size,
            sub_blocks_per_main: (self.max_main_block_size / self.max_sub_block_size.max(1)).max(1),
            mini_blocks_per_sub: (self.max_sub_block_size / self.max_mini_block_size.max(1))
                .clamp(1, MAX_MINI_BLOCKS_PER_SUB_BLOCK),
        }
    }
}

/// Capacity-derived shape of a main-block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub max_mini_block_size: usize,
    pub sub_blocks_per_main: usize,
    pub mini_blocks_per_sub: usize,
}

impl BlockLayout {
    pub fn mini_blocks_per_main(&self) -> usize {
        self.sub_blocks_per_main * self.mini_blocks_per_sub
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuorumPolicy {
    /// `⌊n/2⌋ + 1`
    Majority,
    /// `⌈2n/3⌉`
    Supermajority,
}

impl QuorumPolicy {
    pub fn required_votes(&self, validators: usize) -> usize {
        match self {
            QuorumPolicy::Majority => validators / 2 + 1,
            QuorumPolicy::Supermajority => (2 * validators).div_ceil(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttestationMode {
    /// Each validator re-checks every transaction of the batch.
    TransactionChecks,
    /// Each validator approves with probability `approval_rate`.
    Random,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Validator identity to trust flag.
    #[serde(default = "default_validators")]
    pub validators: BTreeMap<String, bool>,
    #[serde(default = "default_policy")]
    pub policy: QuorumPolicy,
    #[serde(default = "default_attestation")]
    pub attestation: AttestationMode,
    #[serde(default = "default_approval_rate")]
    pub approval_rate: f64,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            validators: default_validators(),
            policy: default_policy(),
            attestation: default_attestation(),
            approval_rate: default_approval_rate(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl ConsensusConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealerConfig {
    /// Target time for one mini-block seal; picks the difficulty suffix.
    #[serde(default = "default_target_seal_time_ms")]
    pub target_seal_time_ms: u64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
    #[serde(default = "default_seal_deadline_ms")]
    pub deadline_ms: u64,
}

impl Default for SealerConfig {
    fn default() -> Self {
        Self {
            target_seal_time_ms: default_target_seal_time_ms(),
            max_iterations: default_max_iterations(),
            deadline_ms: default_seal_deadline_ms(),
        }
    }
}

impl SealerConfig {
    pub fn target_seal_time(&self) -> Duration {
        Duration::from_millis(self.target_seal_time_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    #[serde(default = "default_base_reward")]
    pub base_reward: Amount,
    /// Share of the transferred volume added to the reward, in basis points.
    #[serde(default = "default_volume_bps")]
    pub volume_bps: u32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            base_reward: default_base_reward(),
            volume_bps: default_volume_bps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Worker threads; 0 means one per available CPU.
    #[serde(default)]
    pub threads: usize,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            queue_depth: default_queue_depth(),
        }
    }
}

impl WorkerConfig {
    pub fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            return self.threads;
        }
        std::thread::available_parallelism().map_or(1, |n| n.get())
    }
}

impl Config {
    /// Checks cross-field invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ChainError> {
        let chain = &self.chain;
        if chain.max_mini_block_size == 0 {
            return Err(ChainError::Config("chain.max_mini_block_size must be positive".into()));
        }
        if chain.max_sub_block_size < chain.max_mini_block_size {
            return Err(ChainError::Config(
                "chain.max_sub_block_size must be at least chain.max_mini_block_size".into(),
            ));
        }
        if chain.max_main_block_size < chain.max_sub_block_size {
            return Err(ChainError::Config(
                "chain.max_main_block_size must be at least chain.max_sub_block_size".into(),
            ));
        }
        if !self.consensus.validators.values().any(|trusted| *trusted) {
            return Err(ChainError::Config(
                "consensus.validators must contain at least one trusted validator".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.consensus.approval_rate) {
            return Err(ChainError::Config("consensus.approval_rate must be within [0, 1]".into()));
        }
        if self.sealer.max_iterations == 0 {
            return Err(ChainError::Config("sealer.max_iterations must be positive".into()));
        }
        if self.workers.queue_depth == 0 {
            return Err(ChainError::Config("workers.queue_depth must be positive".into()));
        }
        Ok(())
    }
}

/// Loads `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    let path = path.as_ref();
    let config: Config = if path.exists() {
        let config_str = fs::read_to_string(path)?;
        toml::from_str(&config_str)?
    } else {
        Config::default()
    };

    config.validate()?;
    Ok(config)
}

fn default_true() -> bool {
    true
}

fn default_max_main_block_size() -> usize {
    10 * 1024 * 1024
}

fn default_max_sub_block_size() -> usize {
    1024 * 1024
}

fn default_max_mini_block_size() -> usize {
    100 * 1024
}

fn default_validators() -> BTreeMap<String, bool> {
    ["staking-node-1", "staking-node-2", "staking-node-3"]
        .into_iter()
        .map(|id| (id.to_string(), true))
        .collect()
}

fn default_policy() -> QuorumPolicy {
    QuorumPolicy::Majority
}

fn default_attestation() -> AttestationMode {
    AttestationMode::TransactionChecks
}

fn default_approval_rate() -> f64 {
    0.9
}

fn default_poll_timeout_ms() -> u64 {
    500
}

fn default_target_seal_time_ms() -> u64 {
    10
}

fn default_max_iterations() -> u64 {
    1_000_000
}

fn default_seal_deadline_ms() -> u64 {
    2_000
}

fn default_base_reward() -> Amount {
    Amount::from_coins(50)
}

fn default_volume_bps() -> u32 {
    10
}

fn default_queue_depth() -> usize {
    1_024
}
