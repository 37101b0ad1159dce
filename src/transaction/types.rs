/// Transaction and batch types for TierChain
use crate::amount::Amount;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum serialized transaction size in bytes to prevent DoS
pub const MAX_TRANSACTION_SIZE: usize = 4_096;

/// Fixed width charged for the amount field by the byte-size proxy.
const AMOUNT_SIZE_PROXY: usize = 8;

/// A value transfer between two addresses.
///
/// Signatures are checked upstream; the core only carries them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub amount: Amount,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    #[serde(default)]
    pub signature: Option<String>,
}

impl Transaction {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: Amount,
        timestamp: i64,
    ) -> Self {
        Transaction {
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            timestamp,
            signature: None,
        }
    }

    /// Creates a transaction stamped with the current wall-clock time.
    pub fn now(sender: impl Into<String>, receiver: impl Into<String>, amount: Amount) -> Self {
        Self::new(sender, receiver, amount, chrono::Utc::now().timestamp())
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// `sender ‖ receiver ‖ amount ‖ timestamp`, the string every hash input is built from.
    pub fn write_canonical(&self, out: &mut String) {
        out.push_str(&self.sender);
        out.push_str(&self.receiver);
        out.push_str(&self.amount.to_string());
        out.push_str(&self.timestamp.to_string());
    }

    /// Content identity: hex SHA-256 of the canonical fields.
    pub fn id(&self) -> String {
        let mut record = String::new();
        self.write_canonical(&mut record);
        hex::encode(Sha256::digest(record.as_bytes()))
    }

    /// Byte-size proxy used for mini-block capacity accounting.
    pub fn byte_size(&self) -> usize {
        self.sender.len()
            + self.receiver.len()
            + AMOUNT_SIZE_PROXY
            + self.timestamp.to_string().len()
            + self.signature.as_ref().map_or(0, String::len)
    }
}

/// An ordered group of transactions admitted together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    transactions: Vec<Transaction>,
    id: String,
}

impl Batch {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        let id = Self::identity(&transactions);
        Batch { transactions, id }
    }

    /// Hex SHA-256 over the canonical fields of every transaction, in order.
    pub fn identity(transactions: &[Transaction]) -> String {
        let mut record = String::new();
        for tx in transactions {
            tx.write_canonical(&mut record);
        }
        hex::encode(Sha256::digest(record.as_bytes()))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn into_transactions(self) -> Vec<Transaction> {
        self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn byte_size(&self) -> usize {
        self.transactions.iter().map(Transaction::byte_size).sum()
    }

    pub fn total_amount(&self) -> Amount {
        self.transactions.iter().map(|tx| tx.amount).sum()
    }
}
