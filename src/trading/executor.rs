//! Order execution with size-based retry.
//!
//! The only place a computed amount changes after sizing: a buy declined
//! for the broker's purchase limit shrinks by a fixed decay factor until it
//! fills or falls under the dollar floor, and a dollar sell declined for
//! insufficient holdings converts once to a full-balance quantity order.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::api::{OrderGateway, OrderMode, OrderOutcome, OrderReceipt, RejectReason};
use crate::models::MarketSnapshot;

use super::evaluator::Decision;
use super::ThresholdConfig;

/// Multiplier applied to a buy amount after a purchase-limit decline.
const BUY_DECAY: Decimal = dec!(0.90);

/// Terminal result of executing one decision.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// The broker accepted an order
    Filled(OrderReceipt),
    /// The decision was a policy rejection; nothing was submitted
    Rejected(String),
    /// Submitted but the broker declined and no retry could recover
    NotFilled(String),
    /// Transport-level failure talking to the broker
    Failed(String),
}

/// Submits sized orders and absorbs recoverable broker declines.
pub struct OrderExecutor {
    config: ThresholdConfig,
}

impl OrderExecutor {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    /// Carry out a decision for one symbol.
    pub async fn execute<G: OrderGateway>(
        &self,
        gateway: &G,
        market: &MarketSnapshot,
        decision: Decision,
    ) -> ExecutionResult {
        match decision {
            Decision::Rejected { reason } => ExecutionResult::Rejected(reason),
            Decision::Buy { amount } => self.execute_buy(gateway, market, amount).await,
            Decision::Sell { amount, as_shares } => {
                if as_shares {
                    self.sell_quantity(gateway, market, amount).await
                } else {
                    self.execute_sell_amount(gateway, market, amount).await
                }
            }
        }
    }

    /// Dollar buy with the shrinking retry loop. The amount strictly
    /// decreases every iteration, so the loop terminates once it crosses
    /// the floor.
    async fn execute_buy<G: OrderGateway>(
        &self,
        gateway: &G,
        market: &MarketSnapshot,
        amount: Decimal,
    ) -> ExecutionResult {
        let mut amount = amount;
        loop {
            let outcome = gateway
                .submit_order(&market.symbol, market.asset_class, amount, OrderMode::BuyByAmount)
                .await;

            match outcome {
                Err(e) => return ExecutionResult::Failed(format!("{:#}", e)),
                Ok(OrderOutcome::Filled(receipt)) => {
                    info!(symbol = %market.symbol, amount = %amount, "Buy filled");
                    return ExecutionResult::Filled(receipt);
                }
                Ok(OrderOutcome::Rejected(RejectReason::PurchaseLimit)) => {
                    amount *= BUY_DECAY;
                    if amount < self.config.buy_dollar_floor {
                        return ExecutionResult::NotFilled(format!(
                            "Fraction too small to purchase. ({})",
                            amount.normalize()
                        ));
                    }
                    warn!(
                        symbol = %market.symbol,
                        retry_amount = %amount,
                        "Purchase limit hit, shrinking buy"
                    );
                }
                Ok(OrderOutcome::Rejected(reason)) => {
                    return ExecutionResult::NotFilled(format!("Order rejected: {}", reason));
                }
                Ok(OrderOutcome::Error(message)) => return ExecutionResult::Failed(message),
            }
        }
    }

    /// Dollar sell. Holdings are exact on the broker side, so an
    /// insufficient-holdings decline gets one corrective retry as a
    /// quantity order for the full remaining balance.
    async fn execute_sell_amount<G: OrderGateway>(
        &self,
        gateway: &G,
        market: &MarketSnapshot,
        amount: Decimal,
    ) -> ExecutionResult {
        let outcome = gateway
            .submit_order(&market.symbol, market.asset_class, amount, OrderMode::SellByAmount)
            .await;

        match outcome {
            Err(e) => ExecutionResult::Failed(format!("{:#}", e)),
            Ok(OrderOutcome::Filled(receipt)) => {
                info!(symbol = %market.symbol, amount = %amount, "Sell filled");
                ExecutionResult::Filled(receipt)
            }
            Ok(OrderOutcome::Rejected(RejectReason::InsufficientHoldings)) => {
                warn!(
                    symbol = %market.symbol,
                    shares = %market.held_shares,
                    "Insufficient holdings on dollar sell, retrying as full quantity"
                );
                self.sell_quantity(gateway, market, market.held_shares).await
            }
            Ok(OrderOutcome::Rejected(reason)) => {
                ExecutionResult::NotFilled(format!("Order rejected: {}", reason))
            }
            Ok(OrderOutcome::Error(message)) => ExecutionResult::Failed(message),
        }
    }

    /// Unit-quantity sell, rounded to what the brokerage accepts for the
    /// asset class.
    async fn sell_quantity<G: OrderGateway>(
        &self,
        gateway: &G,
        market: &MarketSnapshot,
        quantity: Decimal,
    ) -> ExecutionResult {
        let quantity = quantity.round_dp(market.asset_class.quantity_precision());

        let outcome = gateway
            .submit_order(
                &market.symbol,
                market.asset_class,
                quantity,
                OrderMode::SellByQuantity,
            )
            .await;

        match outcome {
            Err(e) => ExecutionResult::Failed(format!("{:#}", e)),
            Ok(OrderOutcome::Filled(receipt)) => {
                info!(symbol = %market.symbol, quantity = %quantity, "Quantity sell filled");
                ExecutionResult::Filled(receipt)
            }
            Ok(OrderOutcome::Rejected(reason)) => {
                ExecutionResult::NotFilled(format!("Order rejected: {}", reason))
            }
            Ok(OrderOutcome::Error(message)) => ExecutionResult::Failed(message),
        }
    }
}
