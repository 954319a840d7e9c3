//! Decision engine: policy config, eligibility, sizing, execution, passes.

mod config;
mod evaluator;
mod executor;
mod runner;
mod sizer;

pub use config::{AppConfig, ConfigError, ThresholdConfig};
pub use evaluator::{Decision, Evaluator};
pub use executor::{ExecutionResult, OrderExecutor};
pub use runner::{BatchRunner, PassKind, SymbolReport};
pub use sizer::{PositionSizer, SellSize};
