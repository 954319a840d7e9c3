//! Batch passes: evaluate a symbol list sequentially and collect results.
//!
//! The portfolio snapshot is fetched once per pass and shared read-only, so
//! every symbol sees the same concentration denominator. One symbol's
//! failure never aborts the pass.

use anyhow::Result;
use tracing::{info, warn};

use crate::api::{MarketData, OrderGateway, OrderReceipt};

use super::evaluator::Evaluator;
use super::executor::{ExecutionResult, OrderExecutor};
use super::ThresholdConfig;

/// Which side a pass trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Sell,
    Buy,
}

impl PassKind {
    fn verb(self) -> &'static str {
        match self {
            PassKind::Sell => "Sell",
            PassKind::Buy => "Buy",
        }
    }

    fn noun(self) -> &'static str {
        match self {
            PassKind::Sell => "sale",
            PassKind::Buy => "purchase",
        }
    }
}

/// One entry in a pass's result list.
#[derive(Debug, Clone)]
pub enum SymbolReport {
    /// An order went through
    Filled {
        kind: PassKind,
        symbol: String,
        receipt: OrderReceipt,
    },
    /// A threshold check said no
    Rejected {
        kind: PassKind,
        symbol: String,
        reason: String,
    },
    /// Submitted, but the broker declined beyond recovery
    NotFilled {
        kind: PassKind,
        symbol: String,
        reason: String,
    },
    /// Snapshot fetch or order transport failed; symbol skipped
    Failed {
        kind: PassKind,
        symbol: String,
        error: String,
    },
    /// The configured count limit stopped the pass
    LimitReached { kind: PassKind, limit: u32 },
    /// The pass ran with an empty symbol list
    NothingToDo { kind: PassKind },
}

impl std::fmt::Display for SymbolReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolReport::Filled { kind, symbol, receipt } => write!(
                f,
                "{} {} Result: filled (order {}, {})",
                kind.verb(),
                symbol,
                receipt.order_id,
                receipt.amount.normalize()
            ),
            SymbolReport::Rejected { kind, symbol, reason }
            | SymbolReport::NotFilled { kind, symbol, reason } => {
                write!(f, "{} {} Result: {}", kind.verb(), symbol, reason)
            }
            SymbolReport::Failed { kind, symbol, error } => {
                write!(f, "{} {} Result: error: {}", kind.verb(), symbol, error)
            }
            SymbolReport::LimitReached { kind, limit } => {
                write!(f, "Max number of {} operations reached. ({})", kind.noun(), limit)
            }
            SymbolReport::NothingToDo { kind } => match kind {
                PassKind::Sell => write!(f, "No holdings to evaluate for sale."),
                PassKind::Buy => write!(f, "No buy candidates to evaluate."),
            },
        }
    }
}

impl SymbolReport {
    fn from_execution(kind: PassKind, symbol: &str, result: ExecutionResult) -> Self {
        match result {
            ExecutionResult::Filled(receipt) => SymbolReport::Filled {
                kind,
                symbol: symbol.to_string(),
                receipt,
            },
            ExecutionResult::Rejected(reason) => SymbolReport::Rejected {
                kind,
                symbol: symbol.to_string(),
                reason,
            },
            ExecutionResult::NotFilled(reason) => SymbolReport::NotFilled {
                kind,
                symbol: symbol.to_string(),
                reason,
            },
            ExecutionResult::Failed(error) => SymbolReport::Failed {
                kind,
                symbol: symbol.to_string(),
                error,
            },
        }
    }
}

/// Runs decision passes over symbol lists, strictly sequentially.
pub struct BatchRunner<C> {
    broker: C,
    evaluator: Evaluator,
    executor: OrderExecutor,
}

impl<C> BatchRunner<C>
where
    C: MarketData + OrderGateway,
{
    pub fn new(broker: C, config: ThresholdConfig) -> Self {
        let evaluator = Evaluator::new(config.clone());
        let executor = OrderExecutor::new(config);
        Self {
            broker,
            evaluator,
            executor,
        }
    }

    pub fn broker(&self) -> &C {
        &self.broker
    }

    /// Evaluate held symbols for profit-taking sells.
    pub async fn run_sell_pass(
        &self,
        symbols: &[String],
        limit: Option<u32>,
    ) -> Result<Vec<SymbolReport>> {
        self.run_pass(PassKind::Sell, symbols, limit, false).await
    }

    /// Evaluate candidate symbols (typically negative movers) for dip buys.
    pub async fn run_buy_pass(
        &self,
        symbols: &[String],
        limit: Option<u32>,
        exclude_held: bool,
    ) -> Result<Vec<SymbolReport>> {
        self.run_pass(PassKind::Buy, symbols, limit, exclude_held).await
    }

    async fn run_pass(
        &self,
        kind: PassKind,
        symbols: &[String],
        limit: Option<u32>,
        exclude_held: bool,
    ) -> Result<Vec<SymbolReport>> {
        let mut reports = Vec::new();

        if symbols.is_empty() {
            reports.push(SymbolReport::NothingToDo { kind });
            return Ok(reports);
        }

        // One fetch per pass; read-only until the pass ends.
        let portfolio = self.broker.portfolio_snapshot().await?;

        info!(
            kind = kind.verb(),
            symbols = symbols.len(),
            buying_power = %portfolio.buying_power,
            total_equity = %portfolio.total_equity,
            "Starting pass"
        );

        let mut processed = 0u32;
        for symbol in symbols {
            if let Some(limit) = limit {
                if processed >= limit {
                    reports.push(SymbolReport::LimitReached { kind, limit });
                    break;
                }
            }
            processed += 1;

            let market = match self.broker.market_snapshot(symbol).await {
                Ok(market) => market,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Market data unavailable, skipping");
                    reports.push(SymbolReport::Failed {
                        kind,
                        symbol: symbol.clone(),
                        error: format!("{:#}", e),
                    });
                    continue;
                }
            };

            let decision = match kind {
                PassKind::Sell => self.evaluator.sell_decision(&market, &portfolio),
                PassKind::Buy => self.evaluator.buy_decision(&market, &portfolio, exclude_held),
            };

            let result = self.executor.execute(&self.broker, &market, decision).await;
            reports.push(SymbolReport::from_execution(kind, symbol, result));
        }

        Ok(reports)
    }
}
