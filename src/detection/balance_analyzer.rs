use crate::detection::types::{BalanceDelta, ObservedTransaction, TokenBalanceRecord};
use crate::types::AccountId;
use std::collections::{HashMap, HashSet};
use tracing::debug;

type BalanceKey = (AccountId, AccountId);

#[derive(Debug, Clone, Copy, Default)]
struct Holding {
    amount: u64,
    decimals: u8,
}

/// Analyzes token balance changes in resolved transactions
#[derive(Debug, Default)]
pub struct BalanceAnalyzer;

impl BalanceAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Sum balances per (owner, mint). Records without an owner cannot be
    /// attributed and are skipped.
    fn holdings(records: &[TokenBalanceRecord]) -> HashMap<BalanceKey, Holding> {
        let mut holdings: HashMap<BalanceKey, Holding> = HashMap::new();

        for record in records {
            let Some(owner) = record.owner.clone() else {
                debug!("Token balance at index {} has no owner", record.account_index);
                continue;
            };

            let holding = holdings.entry((owner, record.mint.clone())).or_default();
            holding.amount = holding.amount.saturating_add(record.amount);
            holding.decimals = record.decimals;
        }

        holdings
    }

    /// All non-zero token balance deltas, decreases first
    pub fn calculate_deltas(&self, tx: &ObservedTransaction) -> Vec<BalanceDelta> {
        let pre = Self::holdings(&tx.pre_token_balances);
        let post = Self::holdings(&tx.post_token_balances);

        let keys: HashSet<&BalanceKey> = pre.keys().chain(post.keys()).collect();

        let mut deltas: Vec<BalanceDelta> = keys
            .into_iter()
            .filter_map(|key| {
                let before = pre.get(key).copied();
                let after = post.get(key).copied();
                let pre_amount = before.map(|h| h.amount).unwrap_or(0);
                let post_amount = after.map(|h| h.amount).unwrap_or(0);
                let delta = post_amount as i128 - pre_amount as i128;

                if delta == 0 {
                    return None;
                }

                let decimals = after.or(before).map(|h| h.decimals).unwrap_or(9);
                Some(BalanceDelta {
                    owner: key.0.clone(),
                    mint: key.1.clone(),
                    delta,
                    pre_balance: pre_amount,
                    post_balance: post_amount,
                    decimals,
                })
            })
            .collect();

        deltas.sort_by_key(|d| d.delta);
        deltas
    }

    /// Token delta of `owner` for `mint`, or `None` when unchanged or absent
    pub fn owner_delta(
        &self,
        tx: &ObservedTransaction,
        owner: &AccountId,
        mint: &AccountId,
    ) -> Option<BalanceDelta> {
        let delta = self
            .calculate_deltas(tx)
            .into_iter()
            .find(|d| d.owner.eq_ignore_case(owner) && d.mint.eq_ignore_case(mint));

        if let Some(ref d) = delta {
            debug!(
                "Delta detected: {}{} {} for {}",
                if d.is_decrease() { "-" } else { "+" },
                d.ui_amount(),
                d.mint,
                d.owner
            );
        }

        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::fixtures::{SOL, TxFixture, key};

    #[test]
    fn test_owner_delta_sums_multiple_token_accounts() {
        let trader = key();
        let mint = key();

        let tx = TxFixture::new()
            .account(&trader, true, 2 * SOL, SOL)
            .pre_token(1, &mint, &trader, 100)
            .pre_token(2, &mint, &trader, 50)
            .post_token(1, &mint, &trader, 400)
            .post_token(2, &mint, &trader, 50)
            .observed();

        let analyzer = BalanceAnalyzer::new();
        let delta = analyzer
            .owner_delta(&tx, &trader.parse().unwrap(), &mint.parse().unwrap())
            .unwrap();
        assert_eq!(delta.delta, 300);
        assert_eq!(delta.pre_balance, 150);
        assert_eq!(delta.post_balance, 450);
    }

    #[test]
    fn test_new_position_has_no_pre_balance() {
        let trader = key();
        let mint = key();

        let tx = TxFixture::new()
            .account(&trader, true, 2 * SOL, SOL)
            .post_token(1, &mint, &trader, 1_000)
            .observed();

        let deltas = BalanceAnalyzer::new().calculate_deltas(&tx);
        assert_eq!(deltas.len(), 1);
        assert!(deltas[0].is_increase());
        assert_eq!(deltas[0].pre_balance, 0);
    }

    #[test]
    fn test_unchanged_balance_has_no_delta() {
        let trader = key();
        let mint = key();

        let tx = TxFixture::new()
            .account(&trader, true, SOL, SOL)
            .pre_token(1, &mint, &trader, 10)
            .post_token(1, &mint, &trader, 10)
            .observed();

        let analyzer = BalanceAnalyzer::new();
        assert!(analyzer.calculate_deltas(&tx).is_empty());
        assert!(
            analyzer
                .owner_delta(&tx, &trader.parse().unwrap(), &mint.parse().unwrap())
                .is_none()
        );
    }
}
