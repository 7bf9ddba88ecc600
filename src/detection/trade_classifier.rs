use crate::detection::balance_analyzer::BalanceAnalyzer;
use crate::detection::fee_estimator::FeeEstimator;
use crate::detection::types::ObservedTransaction;
use crate::types::{ClassifiedTrade, OwnedAccountSet, TradeDirection, TrackedAsset};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Decides whether a transaction buys or sells the tracked asset.
///
/// Stateless between calls; the asset and owned accounts are borrowed per call.
#[derive(Debug, Default)]
pub struct TradeClassifier {
    balance_analyzer: BalanceAnalyzer,
    fee_estimator: FeeEstimator,
}

impl TradeClassifier {
    pub fn new() -> Self {
        Self {
            balance_analyzer: BalanceAnalyzer::new(),
            fee_estimator: FeeEstimator::new(),
        }
    }

    pub fn classify(
        &self,
        tx: &ObservedTransaction,
        asset: &TrackedAsset,
        owned: &OwnedAccountSet,
    ) -> Option<ClassifiedTrade> {
        self.classify_at(tx, asset, owned, now_ms())
    }

    pub fn classify_at(
        &self,
        tx: &ObservedTransaction,
        asset: &TrackedAsset,
        owned: &OwnedAccountSet,
        timestamp_ms: i64,
    ) -> Option<ClassifiedTrade> {
        if !tx.mentions_account(&asset.mint) && !tx.mentions_mint(&asset.mint) {
            debug!("{} does not touch {}", tx.signature, asset);
            return None;
        }

        let actor = tx.first_signer()?;

        let delta = self
            .balance_analyzer
            .owner_delta(tx, &actor.id, &asset.mint)?;

        let direction = if delta.is_increase() {
            TradeDirection::Buy
        } else {
            TradeDirection::Sell
        };

        let raw_amount = actor.native_change_sol();
        let net_amount = self.fee_estimator.net_amount(raw_amount);

        let trade = ClassifiedTrade {
            signature: tx.signature.clone(),
            direction,
            actor: actor.id.clone(),
            is_owned: owned.contains(&actor.id),
            net_amount,
            raw_amount,
            timestamp_ms,
        };

        debug!(
            "Classified {}: {} {:.6} SOL (raw {:.6}) by {}{}",
            trade.signature,
            trade.direction,
            trade.net_amount,
            trade.raw_amount,
            trade.actor,
            if trade.is_owned { " (owned)" } else { "" }
        );

        Some(trade)
    }
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
