//! Portfolio snapshot model: account-level aggregates for one batch pass.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregate account state, fetched once per batch pass.
///
/// The runner holds the snapshot for the whole pass and hands out shared
/// references, so every symbol in a pass sees the same concentration
/// denominator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// Cash available for new purchases
    pub buying_power: Decimal,

    /// Combined dollar value of all held positions
    pub total_equity: Decimal,

    /// Symbols with a live position (equity and crypto)
    pub held_symbols: HashSet<String>,
}

impl PortfolioSnapshot {
    pub fn new(buying_power: Decimal, total_equity: Decimal, held_symbols: HashSet<String>) -> Self {
        Self {
            buying_power,
            total_equity,
            held_symbols,
        }
    }

    /// Cash plus equity: the denominator for concentration thresholds.
    pub fn total_account_value(&self) -> Decimal {
        self.buying_power + self.total_equity
    }

    pub fn holds(&self, symbol: &str) -> bool {
        self.held_symbols.contains(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_total_account_value() {
        let snap = PortfolioSnapshot::new(
            dec!(1500),
            dec!(8500),
            HashSet::from(["AAPL".to_string(), "BTC".to_string()]),
        );
        assert_eq!(snap.total_account_value(), dec!(10000));
        assert!(snap.holds("AAPL"));
        assert!(!snap.holds("TSLA"));
    }
}
