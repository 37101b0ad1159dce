//! Token balances applied after a batch commits.

use crate::amount::Amount;
use crate::error::ChainError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Balance store the pipeline moves funds through once a batch is committed.
pub trait Ledger: Send + Sync {
    fn transfer(&self, from: &str, to: &str, amount: Amount) -> Result<(), ChainError>;
}

/// Account balances held in memory. Transfers never overdraw.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    balances: RwLock<HashMap<String, Amount>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, account: &str, amount: Amount) {
        let mut balances = self.balances.write();
        let balance = balances.entry(account.to_string()).or_insert(Amount::ZERO);
        *balance = balance.saturating_add(amount);
    }

    pub fn balance(&self, account: &str) -> Amount {
        self.balances.read().get(account).copied().unwrap_or(Amount::ZERO)
    }

    pub fn total_supply(&self) -> Amount {
        self.balances.read().values().copied().sum()
    }
}

impl Ledger for InMemoryLedger {
    fn transfer(&self, from: &str, to: &str, amount: Amount) -> Result<(), ChainError> {
        let mut balances = self.balances.write();
        let available = balances.get(from).copied().unwrap_or(Amount::ZERO);
        let remaining = available.checked_sub(amount).ok_or_else(|| {
            ChainError::Ledger(format!(
                "{} holds {} but tried to send {}",
                from, available, amount
            ))
        })?;
        let credited = balances
            .get(to)
            .copied()
            .unwrap_or(Amount::ZERO)
            .checked_add(amount)
            .ok_or_else(|| ChainError::Ledger(format!("balance of {} would overflow", to)))?;

        balances.insert(from.to_string(), remaining);
        balances.insert(to.to_string(), credited);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_moves_funds() {
        let ledger = InMemoryLedger::new();
        ledger.mint("Alice", Amount::from_coins(1_000));
        ledger.transfer("Alice", "Bob", Amount::from_coins(500)).unwrap();
        assert_eq!(ledger.balance("Alice"), Amount::from_coins(500));
        assert_eq!(ledger.balance("Bob"), Amount::from_coins(500));
        assert_eq!(ledger.total_supply(), Amount::from_coins(1_000));
    }

    #[test]
    fn test_overdraft_is_refused_without_change() {
        let ledger = InMemoryLedger::new();
        ledger.mint("Alice", Amount::from_coins(10));
        let result = ledger.transfer("Alice", "Bob", Amount::from_coins(11));
        assert!(matches!(result, Err(ChainError::Ledger(_))));
        assert_eq!(ledger.balance("Alice"), Amount::from_coins(10));
        assert_eq!(ledger.balance("Bob"), Amount::ZERO);
    }
}
