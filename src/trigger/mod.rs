//! Sell trigger dispatch

pub mod dispatcher;
pub mod executor;

pub use dispatcher::{TriggerDispatcher, TriggerOutcome};
pub use executor::{CommandExecutor, ExecutorConfig, TradeExecutor, TriggerRequest};
