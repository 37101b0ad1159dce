//! Error types for TierChain

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Batch {0} has already been admitted")]
    DuplicateBatch(String),
    #[error("Quorum rejected batch: {approvals} of {required} required approvals")]
    QuorumRejected { approvals: usize, required: usize },
    #[error("Quorum polling timed out after {approvals} of {required} required approvals")]
    QuorumTimeout { approvals: usize, required: usize },
    #[error("No mini-block has room for a {size} byte batch")]
    NoCapacity { size: usize },
    #[error("Batch of {size} bytes exceeds the mini-block limit of {max} bytes")]
    SizeExceeded { size: usize, max: usize },
    #[error("Seal search gave up after {iterations} nonces")]
    SealTimeout { iterations: u64 },
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Block {0} is sealed and cannot be modified")]
    BlockSealed(String),
    #[error("Cannot seal {0}: a child block is not sealed")]
    UnsealedChild(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Invalid chain: {0}")]
    InvalidChain(String),
    #[error("Ledger error: {0}")]
    Ledger(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// What a caller should do with a batch after it failed with a given error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The batch can never succeed as submitted; drop it.
    Drop,
    /// Fix the transactions and submit a new batch.
    Resubmit,
    /// Wait until capacity is provisioned, then submit again.
    RetryLater,
    /// The batch is too large for one mini-block and has to be split.
    Split,
    /// Transient failure; submit again with fresh state.
    Retry,
}

impl ChainError {
    pub fn disposition(&self) -> Disposition {
        match self {
            ChainError::QuorumRejected { .. } | ChainError::InvalidTransaction(_) => {
                Disposition::Resubmit
            }
            ChainError::NoCapacity { .. } => Disposition::RetryLater,
            ChainError::SizeExceeded { .. } => Disposition::Split,
            ChainError::SealTimeout { .. } | ChainError::QuorumTimeout { .. } => Disposition::Retry,
            _ => Disposition::Drop,
        }
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::Config(err.to_string())
    }
}

impl From<Box<bincode::ErrorKind>> for ChainError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispositions() {
        assert_eq!(ChainError::DuplicateBatch("ab".into()).disposition(), Disposition::Drop);
        assert_eq!(
            ChainError::QuorumRejected { approvals: 1, required: 2 }.disposition(),
            Disposition::Resubmit
        );
        assert_eq!(ChainError::NoCapacity { size: 10 }.disposition(), Disposition::RetryLater);
        assert_eq!(
            ChainError::SizeExceeded { size: 10, max: 5 }.disposition(),
            Disposition::Split
        );
        assert_eq!(ChainError::SealTimeout { iterations: 3 }.disposition(), Disposition::Retry);
    }

    #[test]
    fn test_display_mentions_sizes() {
        let msg = ChainError::SizeExceeded { size: 200, max: 100 }.to_string();
        assert!(msg.contains("200"));
        assert!(msg.contains("100"));
    }
}
