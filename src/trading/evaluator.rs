//! Eligibility evaluation: ordered threshold checks producing a Decision.
//!
//! Each check short-circuits with a human-readable reason; the first
//! failure wins. Amounts come from the position sizer; the evaluator never
//! reshapes them afterwards.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use crate::models::{MarketSnapshot, PortfolioSnapshot};

use super::sizer::{PositionSizer, SellSize};
use super::ThresholdConfig;

/// Outcome of evaluating one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Sell `amount`, denominated in shares when `as_shares` is set,
    /// dollars otherwise
    Sell { amount: Decimal, as_shares: bool },
    /// Buy a dollar amount
    Buy { amount: Decimal },
    /// A threshold check failed; not an error and never retried
    Rejected { reason: String },
}

impl Decision {
    fn rejected(reason: impl Into<String>) -> Self {
        Decision::Rejected { reason: reason.into() }
    }
}

/// Render a ratio the way the reports show it: `0.3012` -> `"30.12%"`.
pub(crate) fn format_pct(ratio: Decimal) -> String {
    format!("{:.2}%", ratio * dec!(100))
}

/// Applies the threshold policy to snapshots.
pub struct Evaluator {
    config: ThresholdConfig,
    sizer: PositionSizer,
}

impl Evaluator {
    pub fn new(config: ThresholdConfig) -> Self {
        let sizer = PositionSizer::new(config.clone());
        Self { config, sizer }
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Sell-side evaluation for a held symbol.
    ///
    /// Policy: take profit only once the gain clears `profit_threshold`
    /// AND the price has pulled back below `sell_year_threshold` of the
    /// 52-week high. A position at its peak is held, not sold.
    pub fn sell_decision(
        &self,
        market: &MarketSnapshot,
        portfolio: &PortfolioSnapshot,
    ) -> Decision {
        if market.held_shares.is_zero() {
            return Decision::rejected("No shares available for sale.");
        }

        let profit = market.profit_ratio();
        if profit < self.config.profit_threshold {
            debug!(symbol = %market.symbol, profit = %profit, "Sell rejected: profit below threshold");
            return Decision::rejected(format!(
                "Profit of sale does not meet profit threshold. ({})",
                format_pct(profit)
            ));
        }

        if market.proximity() > self.config.sell_year_threshold {
            debug!(symbol = %market.symbol, proximity = %market.proximity(), "Sell rejected: too close to 52-week high");
            return Decision::rejected(format!(
                "Proximity to 52-week high exceeds threshold. Price: {} 52-week high: {}",
                market.current_price, market.week52_high
            ));
        }

        match self.sizer.size_sell(market, portfolio) {
            SellSize::AllShares => Decision::Sell {
                amount: market.held_shares,
                as_shares: true,
            },
            SellSize::Shares(quantity) => Decision::Sell {
                amount: quantity,
                as_shares: true,
            },
            SellSize::Dollars(amount) => Decision::Sell {
                amount,
                as_shares: false,
            },
        }
    }

    /// Buy-side evaluation for a candidate symbol.
    ///
    /// Buys dips: the period change must be below `buy_threshold`, and the
    /// price must sit inside the (avoid, buy) window of its 52-week high —
    /// neither collapsed nor peaking.
    pub fn buy_decision(
        &self,
        market: &MarketSnapshot,
        portfolio: &PortfolioSnapshot,
        exclude_held: bool,
    ) -> Decision {
        if exclude_held && portfolio.holds(&market.symbol) {
            return Decision::rejected("Symbol already in portfolio.");
        }

        if portfolio.buying_power < self.config.buy_dollar_floor {
            return Decision::rejected(format!(
                "Buying power less than dollar floor. ({})",
                portfolio.buying_power
            ));
        }

        let change = market.price_change();
        if change >= self.config.buy_threshold {
            debug!(symbol = %market.symbol, change = %change, "Buy rejected: not enough of a dip");
            return Decision::rejected(format!(
                "Price decrease does not meet buy threshold. ({})",
                format_pct(change)
            ));
        }

        let proximity = market.proximity();
        if proximity <= self.config.avoid_year_threshold {
            return Decision::rejected(format!(
                "Price too far from 52-week high. Price: {} 52-week high: {}",
                market.current_price, market.week52_high
            ));
        }
        if proximity >= self.config.buy_year_threshold {
            return Decision::rejected(format!(
                "Price too close to 52-week high. Price: {} 52-week high: {}",
                market.current_price, market.week52_high
            ));
        }

        Decision::Buy {
            amount: self.sizer.size_buy(portfolio),
        }
    }
}
