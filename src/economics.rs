/// Economics module: block rewards derived from transferred volume
use crate::amount::Amount;
use crate::blockchain::MiniBlock;
use crate::config::RewardConfig;

/// Fixed base reward plus a basis-point share of the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardSchedule {
    pub base_reward: Amount,
    pub volume_bps: u32,
}

impl RewardSchedule {
    pub fn new(base_reward: Amount, volume_bps: u32) -> Self {
        Self { base_reward, volume_bps }
    }

    pub fn from_config(config: &RewardConfig) -> Self {
        Self::new(config.base_reward, config.volume_bps)
    }

    /// Pure function of the volume; saturates rather than overflowing.
    pub fn reward(&self, total_transaction_amount: Amount) -> Amount {
        self.base_reward
            .saturating_add(total_transaction_amount.basis_points(self.volume_bps))
    }

    /// Sets `block.reward` from the block's aggregate volume.
    pub fn account(&self, block: &mut MiniBlock) -> Amount {
        block.reward = self.reward(block.total_amount());
        block.reward
    }
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self::from_config(&RewardConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    #[test]
    fn test_reward_is_base_plus_share() {
        let schedule = RewardSchedule::new(Amount::from_coins(50), 10);
        // 0.1% of 500.00 is 0.50
        assert_eq!(schedule.reward(Amount::from_coins(500)), Amount::from_minor(5_050));
        assert_eq!(schedule.reward(Amount::ZERO), Amount::from_coins(50));
    }

    #[test]
    fn test_reward_saturates() {
        let schedule = RewardSchedule::new(Amount::from_minor(u64::MAX), 10_000);
        assert_eq!(schedule.reward(Amount::from_coins(1)), Amount::from_minor(u64::MAX));
    }

    #[test]
    fn test_account_uses_block_volume() {
        let schedule = RewardSchedule::default();
        let mut mini = MiniBlock::new(0);
        mini.transactions.push(Transaction::new("A", "B", Amount::from_coins(300), 1));
        mini.transactions.push(Transaction::new("C", "D", Amount::from_coins(700), 2));
        let reward = schedule.account(&mut mini);
        assert_eq!(reward, Amount::from_minor(5_000 + 100));
        assert_eq!(mini.reward, reward);
    }
}
