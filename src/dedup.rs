//! Replay protection for admitted batches.

use parking_lot::Mutex;
use std::collections::HashSet;

/// Append-only set of admitted batch identities.
///
/// Entries are never evicted, so memory grows with the number of batches seen
/// over the life of the process.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    seen: Mutex<HashSet<String>>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic check-and-set. Returns `true` only for the first caller with `batch_id`.
    pub fn admit(&self, batch_id: &str) -> bool {
        let mut seen = self.seen.lock();
        if seen.contains(batch_id) {
            return false;
        }
        seen.insert(batch_id.to_string())
    }

    pub fn contains(&self, batch_id: &str) -> bool {
        self.seen.lock().contains(batch_id)
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
