//! Position sizing: concentration caps, dollar floors, dust handling.

use rust_decimal::Decimal;

use crate::models::{MarketSnapshot, PortfolioSnapshot};

use super::ThresholdConfig;

/// How a sell should be denominated after sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellSize {
    /// Liquidate the whole position as a unit-quantity order
    AllShares,
    /// Unit-quantity order for part of the position
    Shares(Decimal),
    /// Dollar-denominated order
    Dollars(Decimal),
}

/// Computes trade amounts under the configured portfolio and dollar
/// constraints. Never talks to the broker; rejected orders are reshaped by
/// the retry loop, not here.
pub struct PositionSizer {
    config: ThresholdConfig,
}

impl PositionSizer {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    /// Size a sell for a position that already passed eligibility.
    ///
    /// Starts from the full held equity, caps at the portfolio
    /// concentration threshold, then routes small or near-total amounts to
    /// unit-quantity orders so no dust position survives.
    pub fn size_sell(&self, market: &MarketSnapshot, portfolio: &PortfolioSnapshot) -> SellSize {
        let mut candidate = market.held_equity;

        // Equity accounting can round to zero while shares remain; a
        // non-fractional account always liquidates whole positions.
        if candidate.is_zero() || !self.config.sell_fractional {
            return SellSize::AllShares;
        }

        let total = portfolio.total_account_value();
        if !total.is_zero() && candidate / total > self.config.portfolio_sell_threshold {
            candidate = self.config.portfolio_sell_threshold * total;
        }

        // Below the dollar floor the broker would refuse a price order;
        // convert to shares, clamped to what we actually hold.
        if candidate < self.config.sell_dollar_floor {
            let shares = (candidate / market.current_price).min(market.held_shares);
            return SellSize::Shares(shares);
        }

        // Selling almost everything would leave dust; take the whole
        // position instead.
        if (market.held_equity - candidate).abs() < self.config.sell_dollar_floor {
            return SellSize::AllShares;
        }

        SellSize::Dollars(candidate)
    }

    /// Size a buy for a symbol that already passed eligibility.
    ///
    /// Cap order matters: the portfolio-concentration cap is applied first
    /// and the buying-power cap re-verified after it, then the result is
    /// floored at the minimum order size.
    pub fn size_buy(&self, portfolio: &PortfolioSnapshot) -> Decimal {
        let buying_power = portfolio.buying_power;
        let mut candidate = buying_power * self.config.buying_power_limit;

        let total = portfolio.total_account_value();
        if !total.is_zero() && candidate / total > self.config.portfolio_buy_threshold {
            candidate = self.config.portfolio_buy_threshold * total;
        }

        if !buying_power.is_zero()
            && candidate / buying_power > self.config.buying_power_limit
        {
            candidate = buying_power * self.config.buying_power_limit;
        }

        if candidate < self.config.buy_dollar_floor {
            candidate = self.config.buy_dollar_floor;
        }

        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetClass;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;

    fn config() -> ThresholdConfig {
        ThresholdConfig {
            avoid_year_threshold: dec!(0.30),
            buy_year_threshold: dec!(0.95),
            sell_year_threshold: dec!(0.95),
            buy_threshold: dec!(0),
            profit_threshold: dec!(0.15),
            buying_power_limit: dec!(0.1),
            portfolio_buy_threshold: dec!(0.1),
            portfolio_sell_threshold: dec!(0.2),
            buy_dollar_floor: dec!(5),
            sell_dollar_floor: dec!(1),
            sell_limit: None,
            sell_fractional: true,
        }
    }

    fn market(held_equity: Decimal, held_shares: Decimal, price: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "AAPL".to_string(),
            asset_class: AssetClass::Equity,
            current_price: price,
            period_start_price: price,
            week52_high: price * dec!(2),
            held_shares,
            average_cost: dec!(1),
            held_equity,
            fetched_at: Utc::now(),
        }
    }

    fn portfolio(buying_power: Decimal, total_equity: Decimal) -> PortfolioSnapshot {
        PortfolioSnapshot::new(buying_power, total_equity, HashSet::new())
    }

    #[test]
    fn test_sell_non_fractional_liquidates() {
        let mut cfg = config();
        cfg.sell_fractional = false;
        let sizer = PositionSizer::new(cfg);

        let size = sizer.size_sell(&market(dec!(500), dec!(10), dec!(50)), &portfolio(dec!(0), dec!(10000)));
        assert_eq!(size, SellSize::AllShares);
    }

    #[test]
    fn test_sell_zero_equity_liquidates() {
        // Shares remain but equity accounting rounds to zero.
        let sizer = PositionSizer::new(config());
        let size = sizer.size_sell(
            &market(dec!(0), dec!(0.0000004), dec!(0.5)),
            &portfolio(dec!(0), dec!(10000)),
        );
        assert_eq!(size, SellSize::AllShares);
    }

    #[test]
    fn test_sell_concentration_cap() {
        let sizer = PositionSizer::new(config());
        // 5000 of a 10000 account, cap = 0.2 * 10000 = 2000; the 3000
        // left behind clears the dust rule, so a dollar order results.
        let size = sizer.size_sell(
            &market(dec!(5000), dec!(100), dec!(50)),
            &portfolio(dec!(5000), dec!(5000)),
        );
        assert_eq!(size, SellSize::Dollars(dec!(2000.0)));
    }

    #[test]
    fn test_sell_below_floor_converts_to_shares() {
        let sizer = PositionSizer::new(config());
        // Candidate 0.50 < floor 1: becomes 0.50 / 0.25 = 2 shares.
        let size = sizer.size_sell(
            &market(dec!(0.50), dec!(10), dec!(0.25)),
            &portfolio(dec!(5000), dec!(5000)),
        );
        assert_eq!(size, SellSize::Shares(dec!(2)));
    }

    #[test]
    fn test_sell_share_conversion_clamped_to_held() {
        let sizer = PositionSizer::new(config());
        // 0.50 / 0.25 = 2 shares but only 1.5 held.
        let size = sizer.size_sell(
            &market(dec!(0.50), dec!(1.5), dec!(0.25)),
            &portfolio(dec!(5000), dec!(5000)),
        );
        assert_eq!(size, SellSize::Shares(dec!(1.5)));
    }

    #[test]
    fn test_sell_dust_rule_takes_whole_position() {
        let sizer = PositionSizer::new(config());
        // Candidate equals held equity: remainder 0 < floor, sell all.
        let size = sizer.size_sell(
            &market(dec!(500), dec!(10), dec!(50)),
            &portfolio(dec!(5000), dec!(5000)),
        );
        assert_eq!(size, SellSize::AllShares);
    }

    #[test]
    fn test_buy_basic_fraction_of_buying_power() {
        let sizer = PositionSizer::new(config());
        let amount = sizer.size_buy(&portfolio(dec!(1000), dec!(9000)));
        assert_eq!(amount, dec!(100.0));
    }

    #[test]
    fn test_buy_portfolio_cap_applies() {
        let mut cfg = config();
        cfg.buying_power_limit = dec!(0.9);
        cfg.portfolio_buy_threshold = dec!(0.05);
        let sizer = PositionSizer::new(cfg);

        // 0.9 * 1000 = 900 > 0.05 * 1500 = 75: capped at 75.
        let amount = sizer.size_buy(&portfolio(dec!(1000), dec!(500)));
        assert_eq!(amount, dec!(75.00));
    }

    #[test]
    fn test_buy_never_exceeds_either_cap() {
        let sizer = PositionSizer::new(config());
        let snapshot = portfolio(dec!(4000), dec!(6000));
        let amount = sizer.size_buy(&snapshot);

        let power_cap = snapshot.buying_power * dec!(0.1);
        let portfolio_cap = snapshot.total_account_value() * dec!(0.1);
        assert!(amount <= power_cap.min(portfolio_cap));
        assert!(amount >= dec!(5));
    }

    #[test]
    fn test_buy_floored_at_dollar_floor() {
        let sizer = PositionSizer::new(config());
        // 0.1 * 20 = 2 < floor 5.
        let amount = sizer.size_buy(&portfolio(dec!(20), dec!(0)));
        assert_eq!(amount, dec!(5));
    }
}
