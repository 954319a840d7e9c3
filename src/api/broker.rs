//! Brokerage REST client implementing the engine's collaborator traits.
//!
//! Read operations assemble `MarketSnapshot`/`PortfolioSnapshot` values;
//! the write side submits market orders and maps broker decline phrases to
//! structured reject codes. Session establishment is out of scope: the
//! client authenticates every request with a pre-issued bearer token.

use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::models::{AssetClass, MarketSnapshot, PortfolioSnapshot};
use crate::trading::AppConfig;

use super::gateway::{MarketData, OrderGateway, OrderMode, OrderOutcome, OrderReceipt, RejectReason};
use super::types::*;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Decline phrases the brokerage embeds in 200-status order responses.
const DECLINE_INSUFFICIENT_HOLDINGS: &str = "Insufficient holdings.";
const DECLINE_NOT_ENOUGH_SHARES: &str = "Not enough shares to sell.";
const DECLINE_PURCHASE_LIMIT: &str = "You can only purchase";

/// HTTP client for the brokerage API.
pub struct BrokerClient {
    client: Client,
    base_url: String,
    token: String,

    // Historical-data parameters, from the policy file
    interval: String,
    span: String,
    data_point: String,

    // Watchlist plus held crypto, resolved lazily once per client
    crypto_watchlist: Vec<String>,
    crypto_symbols: RwLock<Option<HashSet<String>>>,
}

impl BrokerClient {
    /// Create a client for the given endpoint and token.
    pub fn new(base_url: String, token: String, config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token,
            interval: config.interval.clone(),
            span: config.span.clone(),
            data_point: config.data_point.clone(),
            crypto_watchlist: config.crypto_watchlist.clone(),
            crypto_symbols: RwLock::new(None),
        })
    }

    /// Create a client from `BROKER_API_URL` / `BROKER_API_TOKEN`.
    pub fn from_env(config: &AppConfig) -> Result<Self> {
        let base_url =
            std::env::var("BROKER_API_URL").context("BROKER_API_URL is not set")?;
        let token =
            std::env::var("BROKER_API_TOKEN").context("BROKER_API_TOKEN is not set")?;
        Self::new(base_url, token, config)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET {}", what);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", what))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("{} request failed: {} - {}", what, status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    /// Symbols treated as crypto: the configured watchlist plus anything the
    /// account currently holds on the crypto side. Resolved once and cached
    /// for the client's lifetime.
    async fn crypto_set(&self) -> Result<HashSet<String>> {
        if let Some(set) = self.crypto_symbols.read().await.as_ref() {
            return Ok(set.clone());
        }

        let mut set: HashSet<String> =
            self.crypto_watchlist.iter().cloned().collect();
        for position in self.crypto_positions().await? {
            if position.currency_code != "USD" && !position.direct_cost_basis.is_zero() {
                set.insert(position.currency_code);
            }
        }

        *self.crypto_symbols.write().await = Some(set.clone());
        Ok(set)
    }

    /// Resolve a symbol's asset class.
    pub async fn asset_class(&self, symbol: &str) -> Result<AssetClass> {
        if self.crypto_set().await?.contains(symbol) {
            Ok(AssetClass::Crypto)
        } else {
            Ok(AssetClass::Equity)
        }
    }

    /// Latest price for a symbol.
    pub async fn current_price(&self, symbol: &str, class: AssetClass) -> Result<Decimal> {
        let price = match class {
            AssetClass::Equity => {
                let quote: QuoteResponse = self
                    .get_json(&format!("/quotes/{}", symbol), "quote")
                    .await?;
                quote.last_trade_price
            }
            AssetClass::Crypto => {
                let quote: CryptoQuoteResponse = self
                    .get_json(&format!("/crypto/quotes/{}", symbol), "crypto quote")
                    .await?;
                quote.mark_price
            }
        };

        if price <= Decimal::ZERO {
            bail!("Non-positive price for {}: {}", symbol, price);
        }
        Ok(price)
    }

    fn bar_value(&self, bar: &HistoricalBar) -> Decimal {
        match self.data_point.as_str() {
            "open_price" => bar.open_price,
            "high_price" => bar.high_price,
            "low_price" => bar.low_price,
            _ => bar.close_price,
        }
    }

    async fn historicals(
        &self,
        symbol: &str,
        class: AssetClass,
        interval: &str,
        span: &str,
    ) -> Result<Vec<HistoricalBar>> {
        let root = match class {
            AssetClass::Equity => "/historicals",
            AssetClass::Crypto => "/crypto/historicals",
        };
        let path = format!("{}/{}?interval={}&span={}", root, symbol, interval, span);
        let response: HistoricalsResponse = self.get_json(&path, "historicals").await?;

        if response.historicals.is_empty() {
            bail!("No historical bars for {}", symbol);
        }
        Ok(response.historicals)
    }

    /// Price at the start of the configured lookback period.
    pub async fn period_start_price(&self, symbol: &str, class: AssetClass) -> Result<Decimal> {
        let bars = self
            .historicals(symbol, class, &self.interval, &self.span)
            .await?;
        let first = self.bar_value(&bars[0]);
        if first <= Decimal::ZERO {
            bail!("Non-positive period start price for {}", symbol);
        }
        Ok(first)
    }

    /// Highest price over the trailing year. Equities expose it as a
    /// fundamentals field; for crypto it is the max of the daily bars.
    pub async fn week52_high(&self, symbol: &str, class: AssetClass) -> Result<Decimal> {
        let high = match class {
            AssetClass::Equity => {
                let fundamentals: FundamentalsResponse = self
                    .get_json(&format!("/fundamentals/{}", symbol), "fundamentals")
                    .await?;
                fundamentals
                    .high_52_weeks
                    .with_context(|| format!("No 52-week high for {}", symbol))?
            }
            AssetClass::Crypto => self
                .historicals(symbol, class, "day", "year")
                .await?
                .iter()
                .map(|bar| bar.high_price)
                .max()
                .with_context(|| format!("No yearly bars for {}", symbol))?,
        };

        if high <= Decimal::ZERO {
            bail!("Non-positive 52-week high for {}", symbol);
        }
        Ok(high)
    }

    async fn holdings(&self) -> Result<Vec<HoldingResponse>> {
        self.get_json("/positions", "holdings").await
    }

    async fn crypto_positions(&self) -> Result<Vec<CryptoPositionResponse>> {
        self.get_json("/crypto/positions", "crypto positions").await
    }

    async fn buying_power(&self) -> Result<Decimal> {
        let account: AccountResponse = self.get_json("/accounts", "account").await?;
        Ok(account.buying_power)
    }

    /// Symbols currently held, optionally including the crypto side.
    pub async fn portfolio_symbols(&self, include_crypto: bool) -> Result<Vec<String>> {
        let mut symbols: Vec<String> = self
            .holdings()
            .await?
            .into_iter()
            .map(|h| h.symbol)
            .collect();

        if include_crypto {
            for position in self.crypto_positions().await? {
                if position.currency_code != "USD"
                    && !position.direct_cost_basis.is_zero()
                    && !symbols.contains(&position.currency_code)
                {
                    symbols.push(position.currency_code);
                }
            }
        }
        Ok(symbols)
    }

    /// Crypto symbols currently held.
    pub async fn portfolio_crypto_symbols(&self) -> Result<Vec<String>> {
        Ok(self
            .crypto_positions()
            .await?
            .into_iter()
            .filter(|p| p.currency_code != "USD" && !p.direct_cost_basis.is_zero())
            .map(|p| p.currency_code)
            .collect())
    }

    /// Top market movers from the brokerage, truncated to `limit`.
    pub async fn top_movers(&self, limit: usize) -> Result<Vec<String>> {
        let movers: MoversResponse = self.get_json("/markets/movers", "top movers").await?;
        let mut symbols = movers.symbols;
        symbols.truncate(limit);
        Ok(symbols)
    }

    /// Top movers plus the crypto watch set.
    pub async fn movers_with_crypto(&self, limit: usize) -> Result<Vec<String>> {
        let mut symbols = self.top_movers(limit).await?;
        for symbol in self.crypto_set().await? {
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        Ok(symbols)
    }

    /// The crypto watch set as a list (watchlist plus held crypto).
    pub async fn crypto_list(&self) -> Result<Vec<String>> {
        let mut list: Vec<String> = self.crypto_set().await?.into_iter().collect();
        list.sort();
        Ok(list)
    }

    /// Period price change per symbol. Symbols whose data is unavailable are
    /// skipped with a warning rather than failing the whole list.
    pub async fn price_changes(&self, symbols: &[String]) -> Vec<(String, Decimal)> {
        let mut changes = Vec::new();
        for symbol in symbols {
            match self.price_change(symbol).await {
                Ok(change) => changes.push((symbol.clone(), change)),
                Err(e) => warn!(symbol = %symbol, error = %e, "Skipping symbol in mover scan"),
            }
        }
        changes
    }

    async fn price_change(&self, symbol: &str) -> Result<Decimal> {
        let class = self.asset_class(symbol).await?;
        let first = self.period_start_price(symbol, class).await?;
        let current = self.current_price(symbol, class).await?;
        Ok((current - first) / first)
    }

    /// Sort symbols by period price change and keep one side of zero:
    /// gainers descending when `positive`, losers ascending otherwise.
    pub fn sort_movers(
        mut changes: Vec<(String, Decimal)>,
        positive: bool,
    ) -> Vec<(String, Decimal)> {
        changes.sort_by(|a, b| a.1.cmp(&b.1));
        if positive {
            changes.reverse();
            changes.retain(|(_, change)| *change > Decimal::ZERO);
        } else {
            changes.retain(|(_, change)| *change < Decimal::ZERO);
        }
        changes
    }

    fn order_path(class: AssetClass) -> &'static str {
        match class {
            AssetClass::Equity => "/orders",
            AssetClass::Crypto => "/crypto/orders",
        }
    }

    fn order_fields(mode: OrderMode) -> (&'static str, &'static str) {
        match mode {
            OrderMode::BuyByAmount => ("buy", "amount"),
            OrderMode::SellByAmount => ("sell", "amount"),
            OrderMode::SellByQuantity => ("sell", "quantity"),
        }
    }

    /// Map a broker order response onto the structured outcome the retry
    /// loop branches on. Declines arrive with HTTP 200 and a phrase in
    /// `detail` or `non_field_errors`.
    fn classify(response: OrderResponse, reference_id: String, amount: Decimal) -> OrderOutcome {
        if let Some(errors) = &response.non_field_errors {
            if errors.iter().any(|e| e == DECLINE_INSUFFICIENT_HOLDINGS) {
                return OrderOutcome::Rejected(RejectReason::InsufficientHoldings);
            }
            if let Some(first) = errors.first() {
                return OrderOutcome::Rejected(RejectReason::Other(first.clone()));
            }
        }

        if let Some(detail) = &response.detail {
            if detail == DECLINE_NOT_ENOUGH_SHARES {
                return OrderOutcome::Rejected(RejectReason::InsufficientHoldings);
            }
            if detail.contains(DECLINE_PURCHASE_LIMIT) {
                return OrderOutcome::Rejected(RejectReason::PurchaseLimit);
            }
            return OrderOutcome::Rejected(RejectReason::Other(detail.clone()));
        }

        match response.id {
            Some(order_id) => OrderOutcome::Filled(OrderReceipt {
                order_id,
                reference_id,
                state: response.state.unwrap_or_else(|| "confirmed".to_string()),
                amount,
            }),
            None => OrderOutcome::Error("Order response carried no ID".to_string()),
        }
    }
}

#[async_trait]
impl MarketData for BrokerClient {
    async fn market_snapshot(&self, symbol: &str) -> Result<MarketSnapshot> {
        let class = self.asset_class(symbol).await?;
        let current_price = self.current_price(symbol, class).await?;
        let period_start_price = self.period_start_price(symbol, class).await?;
        let week52_high = self.week52_high(symbol, class).await?;

        let (held_shares, average_cost, held_equity) = match class {
            AssetClass::Equity => self
                .holdings()
                .await?
                .into_iter()
                .find(|h| h.symbol == symbol)
                .map(|h| (h.quantity, h.average_buy_price, h.equity))
                .unwrap_or((Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)),
            AssetClass::Crypto => self
                .crypto_positions()
                .await?
                .into_iter()
                .find(|p| p.currency_code == symbol)
                .map(|p| {
                    let average = if p.quantity.is_zero() {
                        Decimal::ZERO
                    } else {
                        p.direct_cost_basis / p.quantity
                    };
                    (p.quantity, average, p.quantity * current_price)
                })
                .unwrap_or((Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)),
        };

        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            asset_class: class,
            current_price,
            period_start_price,
            week52_high,
            held_shares,
            average_cost,
            held_equity,
            fetched_at: Utc::now(),
        })
    }

    async fn portfolio_snapshot(&self) -> Result<PortfolioSnapshot> {
        let buying_power = self.buying_power().await?;

        let mut total_equity = Decimal::ZERO;
        let mut held_symbols = HashSet::new();

        for holding in self.holdings().await? {
            total_equity += holding.equity;
            held_symbols.insert(holding.symbol);
        }
        for position in self.crypto_positions().await? {
            if position.currency_code == "USD" || position.direct_cost_basis.is_zero() {
                continue;
            }
            let price = self
                .current_price(&position.currency_code, AssetClass::Crypto)
                .await?;
            total_equity += position.quantity * price;
            held_symbols.insert(position.currency_code);
        }

        Ok(PortfolioSnapshot::new(buying_power, total_equity, held_symbols))
    }
}

#[async_trait]
impl OrderGateway for BrokerClient {
    async fn submit_order(
        &self,
        symbol: &str,
        asset_class: AssetClass,
        amount: Decimal,
        mode: OrderMode,
    ) -> Result<OrderOutcome> {
        let (side, denomination) = Self::order_fields(mode);
        let reference_id = uuid::Uuid::new_v4().to_string();

        let request = OrderRequest {
            symbol: symbol.to_string(),
            side: side.to_string(),
            denomination: denomination.to_string(),
            amount,
            reference_id: reference_id.clone(),
        };

        let url = format!("{}{}", self.base_url, Self::order_path(asset_class));
        info!(
            symbol = %symbol,
            side = side,
            denomination = denomination,
            amount = %amount,
            "Submitting order"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .context("Failed to submit order")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Order submission failed: {} - {}", status, body);
        }

        let body: OrderResponse = response
            .json()
            .await
            .context("Failed to parse order response")?;

        Ok(Self::classify(body, reference_id, amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn response(
        id: Option<&str>,
        detail: Option<&str>,
        non_field_errors: Option<Vec<&str>>,
    ) -> OrderResponse {
        OrderResponse {
            id: id.map(String::from),
            state: None,
            detail: detail.map(String::from),
            non_field_errors: non_field_errors
                .map(|errors| errors.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn test_classify_filled() {
        let outcome = BrokerClient::classify(
            response(Some("ord-1"), None, None),
            "ref-1".to_string(),
            dec!(100),
        );
        match outcome {
            OrderOutcome::Filled(receipt) => {
                assert_eq!(receipt.order_id, "ord-1");
                assert_eq!(receipt.amount, dec!(100));
            }
            other => panic!("expected fill, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_insufficient_holdings() {
        // Crypto phrasing via non_field_errors
        let outcome = BrokerClient::classify(
            response(None, None, Some(vec!["Insufficient holdings."])),
            "ref".to_string(),
            dec!(5),
        );
        assert!(matches!(
            outcome,
            OrderOutcome::Rejected(RejectReason::InsufficientHoldings)
        ));

        // Equity phrasing via detail
        let outcome = BrokerClient::classify(
            response(None, Some("Not enough shares to sell."), None),
            "ref".to_string(),
            dec!(5),
        );
        assert!(matches!(
            outcome,
            OrderOutcome::Rejected(RejectReason::InsufficientHoldings)
        ));
    }

    #[test]
    fn test_classify_purchase_limit() {
        let outcome = BrokerClient::classify(
            response(
                None,
                Some("You can only purchase 87.21 at this time."),
                None,
            ),
            "ref".to_string(),
            dec!(100),
        );
        assert!(matches!(
            outcome,
            OrderOutcome::Rejected(RejectReason::PurchaseLimit)
        ));
    }

    #[test]
    fn test_classify_other_decline() {
        let outcome = BrokerClient::classify(
            response(None, Some("Market closed."), None),
            "ref".to_string(),
            dec!(100),
        );
        match outcome {
            OrderOutcome::Rejected(RejectReason::Other(detail)) => {
                assert_eq!(detail, "Market closed.");
            }
            other => panic!("expected other-rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_missing_id() {
        let outcome =
            BrokerClient::classify(response(None, None, None), "ref".to_string(), dec!(1));
        assert!(matches!(outcome, OrderOutcome::Error(_)));
    }

    #[test]
    fn test_sort_movers_negative_side() {
        let changes = vec![
            ("UP".to_string(), dec!(0.05)),
            ("DOWN2".to_string(), dec!(-0.12)),
            ("FLAT".to_string(), dec!(0)),
            ("DOWN1".to_string(), dec!(-0.03)),
        ];

        let losers = BrokerClient::sort_movers(changes.clone(), false);
        let symbols: Vec<&str> = losers.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(symbols, vec!["DOWN2", "DOWN1"]);

        let gainers = BrokerClient::sort_movers(changes, true);
        let symbols: Vec<&str> = gainers.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(symbols, vec!["UP"]);
    }

    #[test]
    fn test_order_fields() {
        assert_eq!(
            BrokerClient::order_fields(OrderMode::BuyByAmount),
            ("buy", "amount")
        );
        assert_eq!(
            BrokerClient::order_fields(OrderMode::SellByAmount),
            ("sell", "amount")
        );
        assert_eq!(
            BrokerClient::order_fields(OrderMode::SellByQuantity),
            ("sell", "quantity")
        );
    }
}
