//! Collaborator contracts between the decision engine and the brokerage.
//!
//! The engine only ever sees these traits; the concrete HTTP client lives in
//! `broker.rs` and test code substitutes scripted fakes.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{AssetClass, MarketSnapshot, PortfolioSnapshot};

/// How an order amount is denominated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderMode {
    /// Buy a dollar amount at market
    BuyByAmount,
    /// Sell a dollar amount at market
    SellByAmount,
    /// Sell an exact share/coin quantity
    SellByQuantity,
}

/// Why the broker declined an order.
///
/// The retry loop branches on these; anything it cannot recover from lands
/// in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// Sell larger than the position the broker sees
    InsufficientHoldings,
    /// Buy exceeds what the account can purchase right now
    PurchaseLimit,
    /// Any other decline, verbatim from the broker
    Other(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::InsufficientHoldings => write!(f, "insufficient holdings"),
            RejectReason::PurchaseLimit => write!(f, "purchase limit exceeded"),
            RejectReason::Other(detail) => write!(f, "{}", detail),
        }
    }
}

/// Broker acknowledgement for a filled order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// Broker-assigned order ID
    pub order_id: String,

    /// Our client-side reference ID
    pub reference_id: String,

    /// Order state as reported ("confirmed", "filled", ...)
    pub state: String,

    /// Dollar amount or unit quantity, as submitted
    pub amount: Decimal,
}

/// Structured result of one order submission.
#[derive(Debug, Clone)]
pub enum OrderOutcome {
    Filled(OrderReceipt),
    Rejected(RejectReason),
    Error(String),
}

/// Read-side collaborator: assembles snapshots from brokerage data.
#[async_trait]
pub trait MarketData {
    /// Build a market snapshot for one symbol. Any failure means the data
    /// is unavailable and the symbol is skipped for this pass.
    async fn market_snapshot(&self, symbol: &str) -> Result<MarketSnapshot>;

    /// Build the account-level snapshot. Called once per batch pass.
    async fn portfolio_snapshot(&self) -> Result<PortfolioSnapshot>;
}

/// Write-side collaborator: places orders.
#[async_trait]
pub trait OrderGateway {
    /// Submit one order. `Ok` carries the broker's structured verdict;
    /// `Err` is a transport-level failure (network, decode).
    async fn submit_order(
        &self,
        symbol: &str,
        asset_class: AssetClass,
        amount: Decimal,
        mode: OrderMode,
    ) -> Result<OrderOutcome>;
}
