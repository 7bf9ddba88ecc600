//! Trade detection for the tracked asset
//!
//! Resolved transactions are normalized into a canonical form, then classified
//! by the first signer's token balance change and native balance change rather
//! than by parsing program instructions.

pub mod balance_analyzer;
pub mod fee_estimator;
pub mod normalize;
pub mod trade_classifier;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use balance_analyzer::BalanceAnalyzer;
pub use fee_estimator::{FeeEstimate, FeeEstimator};
pub use normalize::normalize_transaction;
pub use trade_classifier::TradeClassifier;
pub use types::{AccountEntry, BalanceDelta, ObservedTransaction, TokenBalanceRecord};
