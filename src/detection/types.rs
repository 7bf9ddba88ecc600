use crate::types::AccountId;

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// One account of a resolved transaction with its native balances
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEntry {
    pub id: AccountId,
    pub signer: bool,
    pub pre_lamports: u64,
    pub post_lamports: u64,
}

impl AccountEntry {
    /// Absolute native balance change in SOL
    pub fn native_change_sol(&self) -> f64 {
        self.pre_lamports.abs_diff(self.post_lamports) as f64 / LAMPORTS_PER_SOL
    }
}

/// A token balance record, either before or after the transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalanceRecord {
    pub account_index: u8,
    pub mint: AccountId,
    pub owner: Option<AccountId>,
    /// Raw amount in the token's smallest unit
    pub amount: u64,
    pub decimals: u8,
}

/// A resolved transaction in canonical form.
///
/// Only produced for transactions that carry execution metadata and did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTransaction {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub accounts: Vec<AccountEntry>,
    pub pre_token_balances: Vec<TokenBalanceRecord>,
    pub post_token_balances: Vec<TokenBalanceRecord>,
}

impl ObservedTransaction {
    /// The first signing account, falling back to the fee payer position
    pub fn first_signer(&self) -> Option<&AccountEntry> {
        self.accounts
            .iter()
            .find(|entry| entry.signer)
            .or_else(|| self.accounts.first())
    }

    pub fn account(&self, id: &AccountId) -> Option<&AccountEntry> {
        self.accounts.iter().find(|entry| entry.id.eq_ignore_case(id))
    }

    pub fn mentions_account(&self, id: &AccountId) -> bool {
        self.account(id).is_some()
    }

    /// Whether any token balance record (pre or post) is for `mint`
    pub fn mentions_mint(&self, mint: &AccountId) -> bool {
        self.pre_token_balances
            .iter()
            .chain(self.post_token_balances.iter())
            .any(|record| record.mint.eq_ignore_case(mint))
    }
}

/// Token balance change of a single owner for a single mint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    pub mint: AccountId,
    pub owner: AccountId,
    /// Change in raw units (negative = sold, positive = bought)
    pub delta: i128,
    pub pre_balance: u64,
    pub post_balance: u64,
    pub decimals: u8,
}

impl BalanceDelta {
    pub fn is_decrease(&self) -> bool {
        self.delta < 0
    }

    pub fn is_increase(&self) -> bool {
        self.delta > 0
    }

    /// Human-readable absolute amount
    pub fn ui_amount(&self) -> f64 {
        self.delta.unsigned_abs() as f64 / 10_f64.powi(self.decimals as i32)
    }
}
