//! Wire types for the brokerage REST API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Quote response from /quotes/{symbol}.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QuoteResponse {
    pub symbol: String,
    pub last_trade_price: Decimal,
    #[serde(default)]
    pub previous_close: Option<Decimal>,
    #[serde(default)]
    pub updated_at: String,
}

/// Quote response from /crypto/quotes/{symbol}.
#[derive(Debug, Clone, Deserialize)]
pub struct CryptoQuoteResponse {
    pub symbol: String,
    pub mark_price: Decimal,
    #[serde(default)]
    pub bid_price: Option<Decimal>,
    #[serde(default)]
    pub ask_price: Option<Decimal>,
}

/// One bar from /historicals endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalBar {
    pub begins_at: String,
    pub open_price: Decimal,
    pub close_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
}

/// Historicals response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalsResponse {
    pub symbol: String,
    pub interval: String,
    pub span: String,
    #[serde(default)]
    pub historicals: Vec<HistoricalBar>,
}

/// Fundamentals response from /fundamentals/{symbol} (equities only).
#[derive(Debug, Clone, Deserialize)]
pub struct FundamentalsResponse {
    #[serde(default)]
    pub high_52_weeks: Option<Decimal>,
    #[serde(default)]
    pub low_52_weeks: Option<Decimal>,
    #[serde(default)]
    pub market_cap: Option<Decimal>,
}

/// One equity holding from /positions.
#[derive(Debug, Clone, Deserialize)]
pub struct HoldingResponse {
    pub symbol: String,
    pub quantity: Decimal,
    pub average_buy_price: Decimal,
    pub equity: Decimal,
}

/// One crypto position from /crypto/positions.
#[derive(Debug, Clone, Deserialize)]
pub struct CryptoPositionResponse {
    pub currency_code: String,
    pub quantity: Decimal,
    pub direct_cost_basis: Decimal,
}

/// Account profile from /accounts.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub buying_power: Decimal,
    #[serde(default)]
    pub account_number: String,
}

/// Top movers response from /markets/movers.
#[derive(Debug, Clone, Deserialize)]
pub struct MoversResponse {
    #[serde(default)]
    pub symbols: Vec<String>,
}

/// Order submission request body for /orders and /crypto/orders.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: String,
    /// "amount" for dollar orders, "quantity" for unit orders
    pub denomination: String,
    pub amount: Decimal,
    pub reference_id: String,
}

/// Order response from /orders and /crypto/orders.
///
/// A decline arrives with HTTP 200 and `detail`/`non_field_errors` set; the
/// client maps those phrases onto reject codes.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub non_field_errors: Option<Vec<String>>,
}
