//! Policy configuration: thresholds, floors, and data-fetch parameters.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Allowed historical-data parameters at the brokerage.
const INTERVALS: &[&str] = &["5minute", "10minute", "hour", "day", "week"];
const SPANS: &[&str] = &["day", "week", "month", "3month", "year", "5year"];
const DATA_POINTS: &[&str] = &["open_price", "close_price", "high_price", "low_price"];

/// A policy field failed validation. Fatal at startup; no pass runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: Decimal },

    #[error("{field} must be a fraction in (0, 1] (got {value})")]
    NotFraction { field: &'static str, value: Decimal },

    #[error("avoid_year_threshold ({avoid}) must be below buy_year_threshold ({buy})")]
    InvertedYearWindow { avoid: Decimal, buy: Decimal },

    #[error("avoid_year_threshold must not be negative (got {0})")]
    NegativeAvoidThreshold(Decimal),

    #[error("{field} must be one of {allowed:?} (got {value:?})")]
    UnknownOption {
        field: &'static str,
        value: String,
        allowed: &'static [&'static str],
    },
}

/// Buy/sell threshold policy. Loaded once at startup, never mutated.
///
/// Every field is required in the policy file; the engine infers no
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Minimum price/52wk-high ratio to consider buying (below this the
    /// symbol has fallen too far)
    pub avoid_year_threshold: Decimal,

    /// Maximum price/52wk-high ratio to consider buying
    pub buy_year_threshold: Decimal,

    /// Maximum price/52wk-high ratio to consider selling; above it the
    /// position is held until the price pulls back
    pub sell_year_threshold: Decimal,

    /// Maximum period price-change ratio to trigger a buy (dips only when
    /// negative)
    pub buy_threshold: Decimal,

    /// Minimum profit ratio over cost basis required to sell
    pub profit_threshold: Decimal,

    /// Fraction of buying power usable in a single buy
    pub buying_power_limit: Decimal,

    /// Max fraction of total account value a single buy may represent
    pub portfolio_buy_threshold: Decimal,

    /// Max fraction of total account value a single sell may represent
    pub portfolio_sell_threshold: Decimal,

    /// Smallest dollar buy the policy will place
    pub buy_dollar_floor: Decimal,

    /// Smallest dollar sell the policy will place
    pub sell_dollar_floor: Decimal,

    /// Max sell operations per batch pass; null means unlimited
    pub sell_limit: Option<u32>,

    /// Whether partial-position sells are permitted
    pub sell_fractional: bool,
}

impl ThresholdConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn positive(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
            if value <= Decimal::ZERO {
                return Err(ConfigError::NotPositive { field, value });
            }
            Ok(())
        }

        fn fraction(field: &'static str, value: Decimal) -> Result<(), ConfigError> {
            if value <= Decimal::ZERO || value > Decimal::ONE {
                return Err(ConfigError::NotFraction { field, value });
            }
            Ok(())
        }

        positive("buy_dollar_floor", self.buy_dollar_floor)?;
        positive("sell_dollar_floor", self.sell_dollar_floor)?;
        positive("sell_year_threshold", self.sell_year_threshold)?;
        positive("buy_year_threshold", self.buy_year_threshold)?;

        fraction("buying_power_limit", self.buying_power_limit)?;
        fraction("portfolio_buy_threshold", self.portfolio_buy_threshold)?;
        fraction("portfolio_sell_threshold", self.portfolio_sell_threshold)?;

        if self.avoid_year_threshold < Decimal::ZERO {
            return Err(ConfigError::NegativeAvoidThreshold(self.avoid_year_threshold));
        }
        if self.avoid_year_threshold >= self.buy_year_threshold {
            return Err(ConfigError::InvertedYearWindow {
                avoid: self.avoid_year_threshold,
                buy: self.buy_year_threshold,
            });
        }

        Ok(())
    }
}

/// Full policy file: engine thresholds plus the data-fetch parameters the
/// brokerage client consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub thresholds: ThresholdConfig,

    /// Symbols always treated as crypto (the brokerage has no crypto
    /// mover feed, so these are watched explicitly)
    pub crypto_watchlist: Vec<String>,

    /// Historical bar interval for movement analysis
    pub interval: String,

    /// Historical span for movement analysis
    pub span: String,

    /// Which bar field to read: open/close/high/low price
    pub data_point: String,
}

impl AppConfig {
    /// Parse and validate a policy file. Any failure here aborts the run
    /// before a batch starts.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read policy file {}: {}", path.display(), e))?;
        let config: AppConfig = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Invalid policy file {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;

        fn option_of(
            field: &'static str,
            value: &str,
            allowed: &'static [&'static str],
        ) -> Result<(), ConfigError> {
            if !allowed.contains(&value) {
                return Err(ConfigError::UnknownOption {
                    field,
                    value: value.to_string(),
                    allowed,
                });
            }
            Ok(())
        }

        option_of("interval", &self.interval, INTERVALS)?;
        option_of("span", &self.span, SPANS)?;
        option_of("data_point", &self.data_point, DATA_POINTS)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_thresholds() -> ThresholdConfig {
        ThresholdConfig {
            avoid_year_threshold: dec!(0.30),
            buy_year_threshold: dec!(0.95),
            sell_year_threshold: dec!(0.95),
            buy_threshold: dec!(0),
            profit_threshold: dec!(0.15),
            buying_power_limit: dec!(0.1),
            portfolio_buy_threshold: dec!(0.1),
            portfolio_sell_threshold: dec!(0.2),
            buy_dollar_floor: dec!(1),
            sell_dollar_floor: dec!(1),
            sell_limit: Some(10),
            sell_fractional: true,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(sample_thresholds().validate().is_ok());
    }

    #[test]
    fn test_floor_must_be_positive() {
        let mut config = sample_thresholds();
        config.buy_dollar_floor = Decimal::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive { field: "buy_dollar_floor", .. })
        ));
    }

    #[test]
    fn test_buying_power_limit_is_a_fraction() {
        let mut config = sample_thresholds();
        config.buying_power_limit = dec!(1.5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotFraction { field: "buying_power_limit", .. })
        ));
    }

    #[test]
    fn test_year_window_must_not_invert() {
        let mut config = sample_thresholds();
        config.avoid_year_threshold = dec!(0.95);
        config.buy_year_threshold = dec!(0.95);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvertedYearWindow { .. })
        ));
    }

    #[test]
    fn test_missing_field_is_fatal_at_parse() {
        // profit_threshold omitted: deserialization must fail, not default.
        let raw = r#"{
            "avoid_year_threshold": "0.3",
            "buy_year_threshold": "0.95",
            "sell_year_threshold": "0.95",
            "buy_threshold": "0",
            "buying_power_limit": "0.1",
            "portfolio_buy_threshold": "0.1",
            "portfolio_sell_threshold": "0.2",
            "buy_dollar_floor": "1",
            "sell_dollar_floor": "1",
            "sell_limit": 10,
            "sell_fractional": true,
            "crypto_watchlist": ["BTC"],
            "interval": "day",
            "span": "week",
            "data_point": "close_price"
        }"#;
        assert!(serde_json::from_str::<AppConfig>(raw).is_err());
    }

    #[test]
    fn test_unknown_interval_rejected() {
        let thresholds = sample_thresholds();
        let config = AppConfig {
            thresholds,
            crypto_watchlist: vec!["BTC".to_string()],
            interval: "minute".to_string(),
            span: "week".to_string(),
            data_point: "close_price".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownOption { field: "interval", .. })
        ));
    }
}
