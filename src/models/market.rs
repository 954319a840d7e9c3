//! Market snapshot model: one symbol's prices and our holding in it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Asset class of a tradeable symbol.
///
/// Resolved once by the data collaborator (crypto watchlist membership plus
/// held crypto positions) and carried on the snapshot; decision code never
/// re-derives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Equity,
    Crypto,
}

impl AssetClass {
    /// Decimal places the brokerage accepts on a unit-quantity order.
    pub fn quantity_precision(&self) -> u32 {
        match self {
            AssetClass::Equity => 6,
            AssetClass::Crypto => 8,
        }
    }
}

/// Immutable view of one symbol at decision time.
///
/// Built by the data collaborator before a pass; the engine only reads it.
/// `week52_high >= current_price` is NOT guaranteed (the recorded high can
/// be stale), so a proximity ratio above 1 is a valid input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Ticker symbol (e.g., "AAPL", "BTC")
    pub symbol: String,

    /// Equity or crypto
    pub asset_class: AssetClass,

    /// Latest trade/mark price; always positive
    pub current_price: Decimal,

    /// Price at the start of the configured lookback period
    pub period_start_price: Decimal,

    /// Highest price over the trailing year
    pub week52_high: Decimal,

    /// Shares (or coin quantity) currently held; zero if not in portfolio
    pub held_shares: Decimal,

    /// Average cost per share of the held position
    pub average_cost: Decimal,

    /// Dollar value of the held position
    pub held_equity: Decimal,

    /// When this snapshot was assembled
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Gain over cost basis as a ratio (0.30 = 30% up).
    pub fn profit_ratio(&self) -> Decimal {
        if self.average_cost.is_zero() {
            return Decimal::ZERO;
        }
        (self.current_price - self.average_cost) / self.average_cost
    }

    /// Price change over the lookback period as a ratio.
    pub fn price_change(&self) -> Decimal {
        if self.period_start_price.is_zero() {
            return Decimal::ZERO;
        }
        (self.current_price - self.period_start_price) / self.period_start_price
    }

    /// current_price / 52-week high. Can exceed 1 when the recorded high
    /// is stale.
    pub fn proximity(&self) -> Decimal {
        if self.week52_high.is_zero() {
            return Decimal::ZERO;
        }
        self.current_price / self.week52_high
    }

    /// Whether we hold any of this symbol.
    pub fn is_held(&self) -> bool {
        !self.held_shares.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(current: Decimal, cost: Decimal, high: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "AAPL".to_string(),
            asset_class: AssetClass::Equity,
            current_price: current,
            period_start_price: dec!(100),
            week52_high: high,
            held_shares: dec!(10),
            average_cost: cost,
            held_equity: current * dec!(10),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_profit_ratio() {
        let snap = snapshot(dec!(130), dec!(100), dec!(140));
        assert_eq!(snap.profit_ratio(), dec!(0.30));
    }

    #[test]
    fn test_proximity_can_exceed_one() {
        // Stale recorded high: price already above it.
        let snap = snapshot(dec!(150), dec!(100), dec!(140));
        assert!(snap.proximity() > Decimal::ONE);
    }

    #[test]
    fn test_zero_denominators() {
        let snap = MarketSnapshot {
            symbol: "NEW".to_string(),
            asset_class: AssetClass::Equity,
            current_price: dec!(10),
            period_start_price: Decimal::ZERO,
            week52_high: Decimal::ZERO,
            held_shares: Decimal::ZERO,
            average_cost: Decimal::ZERO,
            held_equity: Decimal::ZERO,
            fetched_at: Utc::now(),
        };
        assert_eq!(snap.profit_ratio(), Decimal::ZERO);
        assert_eq!(snap.price_change(), Decimal::ZERO);
        assert_eq!(snap.proximity(), Decimal::ZERO);
    }

    #[test]
    fn test_quantity_precision() {
        assert_eq!(AssetClass::Equity.quantity_precision(), 6);
        assert_eq!(AssetClass::Crypto.quantity_precision(), 8);
    }
}
