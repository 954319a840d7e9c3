//! Brokerage API: collaborator traits, wire types, and the HTTP client.

mod broker;
mod gateway;
mod types;

pub use broker::BrokerClient;
pub use gateway::{
    MarketData, OrderGateway, OrderMode, OrderOutcome, OrderReceipt, RejectReason,
};
