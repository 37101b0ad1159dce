/// Stateless transaction checks, run independently by each validator
use crate::error::ChainError;
use crate::transaction::types::{Batch, Transaction, MAX_TRANSACTION_SIZE};

impl Transaction {
    /// Validates field contents and size. Does not verify the signature itself;
    /// that happens before a transaction reaches the core.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.sender.trim().is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Sender address cannot be empty".to_string(),
            ));
        }
        if self.receiver.trim().is_empty() {
            return Err(ChainError::InvalidTransaction(
                "Receiver address cannot be empty".to_string(),
            ));
        }
        // Prevent self-sends
        if self.sender == self.receiver {
            return Err(ChainError::InvalidTransaction(
                "Sender and receiver cannot be the same".to_string(),
            ));
        }
        if self.amount.is_zero() {
            return Err(ChainError::InvalidTransaction(
                "Transaction amount must be positive".to_string(),
            ));
        }
        if matches!(self.signature.as_deref(), Some("")) {
            return Err(ChainError::InvalidTransaction(
                "Signature must not be empty when present".to_string(),
            ));
        }
        self.validate_size()
    }

    /// Validate serialized size to prevent DoS attacks
    pub fn validate_size(&self) -> Result<(), ChainError> {
        let serialized = bincode::serialize(self)
            .map_err(|e| ChainError::InvalidTransaction(format!("Serialization failed: {}", e)))?;

        if serialized.len() > MAX_TRANSACTION_SIZE {
            return Err(ChainError::InvalidTransaction(format!(
                "Transaction too large: {} bytes (max: {})",
                serialized.len(),
                MAX_TRANSACTION_SIZE
            )));
        }
        Ok(())
    }
}

impl Batch {
    /// Validates every transaction, reporting the first failure with its position.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.is_empty() {
            return Err(ChainError::InvalidTransaction("Batch is empty".to_string()));
        }
        for (i, tx) in self.transactions().iter().enumerate() {
            tx.validate().map_err(|e| match e {
                ChainError::InvalidTransaction(msg) => {
                    ChainError::InvalidTransaction(format!("transaction {}: {}", i, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}
