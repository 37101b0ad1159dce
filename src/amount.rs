//! Fixed-point monetary amounts.
//!
//! Amounts are stored as integer minor units so that the canonical text form fed
//! into block hashes is identical on every node.

use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

/// Minor units per whole coin.
pub const MINOR_UNITS_PER_COIN: u64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_minor(minor: u64) -> Self {
        Amount(minor)
    }

    /// Whole coins. Saturates instead of overflowing.
    pub const fn from_coins(coins: u64) -> Self {
        Amount(coins.saturating_mul(MINOR_UNITS_PER_COIN))
    }

    pub const fn minor_units(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// `self * bps / 10_000`, rounded down.
    pub fn basis_points(self, bps: u32) -> Amount {
        let scaled = (self.0 as u128 * bps as u128) / 10_000;
        Amount(u64::try_from(scaled).unwrap_or(u64::MAX))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.0 / MINOR_UNITS_PER_COIN,
            self.0 % MINOR_UNITS_PER_COIN
        )
    }
}

impl FromStr for Amount {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ChainError::InvalidTransaction(format!("Invalid amount '{}'", s));
        let (whole, frac) = match s.trim().split_once('.') {
            Some((w, f)) => (w, f),
            None => (s.trim(), ""),
        };
        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || frac.len() > 2 || !digits(whole) || !digits(frac) {
            return Err(invalid());
        }
        let coins: u64 = whole.parse().map_err(|_| invalid())?;
        let cents: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => frac.parse().map_err(|_| invalid())?,
        };
        coins
            .checked_mul(MINOR_UNITS_PER_COIN)
            .and_then(|m| m.checked_add(cents))
            .map(Amount)
            .ok_or_else(invalid)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Amount::saturating_add)
    }
}
