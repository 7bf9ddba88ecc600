//! Builders for encoded RPC transactions used across unit tests.

use crate::detection::normalize::normalize_transaction;
use crate::detection::types::ObservedTransaction;
use serde_json::{Value, json};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_transaction_status::EncodedConfirmedTransactionWithStatusMeta;

pub(crate) fn key() -> String {
    Pubkey::new_unique().to_string()
}

pub(crate) const SOL: u64 = 1_000_000_000;

#[derive(Clone)]
pub(crate) struct TxFixture {
    pub signature: String,
    accounts: Vec<(String, bool, u64, u64)>,
    pre_tokens: Vec<Value>,
    post_tokens: Vec<Value>,
    failed: bool,
}

impl TxFixture {
    pub fn new() -> Self {
        Self {
            signature: Signature::new_unique().to_string(),
            accounts: Vec::new(),
            pre_tokens: Vec::new(),
            post_tokens: Vec::new(),
            failed: false,
        }
    }

    pub fn account(mut self, key: &str, signer: bool, pre: u64, post: u64) -> Self {
        self.accounts.push((key.to_string(), signer, pre, post));
        self
    }

    pub fn pre_token(mut self, index: u8, mint: &str, owner: &str, amount: u64) -> Self {
        self.pre_tokens.push(token_balance(index, mint, owner, amount));
        self
    }

    pub fn post_token(mut self, index: u8, mint: &str, owner: &str, amount: u64) -> Self {
        self.post_tokens.push(token_balance(index, mint, owner, amount));
        self
    }

    pub fn failed(mut self) -> Self {
        self.failed = true;
        self
    }

    pub fn encoded(&self) -> EncodedConfirmedTransactionWithStatusMeta {
        let account_keys: Vec<Value> = self
            .accounts
            .iter()
            .map(|(key, signer, _, _)| {
                json!({
                    "pubkey": key,
                    "writable": true,
                    "signer": signer,
                    "source": "transaction"
                })
            })
            .collect();
        let pre: Vec<u64> = self.accounts.iter().map(|a| a.2).collect();
        let post: Vec<u64> = self.accounts.iter().map(|a| a.3).collect();

        let (err, status) = if self.failed {
            (
                json!({ "InstructionError": [0, { "Custom": 1 }] }),
                json!({ "Err": { "InstructionError": [0, { "Custom": 1 }] } }),
            )
        } else {
            (Value::Null, json!({ "Ok": null }))
        };

        let value = json!({
            "slot": 1,
            "blockTime": 1_700_000_000,
            "transaction": {
                "signatures": [self.signature],
                "message": {
                    "accountKeys": account_keys,
                    "recentBlockhash": "11111111111111111111111111111111",
                    "instructions": []
                }
            },
            "meta": {
                "err": err,
                "status": status,
                "fee": 5000,
                "preBalances": pre,
                "postBalances": post,
                "innerInstructions": [],
                "logMessages": [],
                "preTokenBalances": self.pre_tokens,
                "postTokenBalances": self.post_tokens,
                "rewards": []
            }
        });

        serde_json::from_value(value).expect("fixture deserializes")
    }

    pub fn observed(&self) -> ObservedTransaction {
        normalize_transaction(&self.encoded()).expect("fixture normalizes")
    }
}

fn token_balance(index: u8, mint: &str, owner: &str, amount: u64) -> Value {
    json!({
        "accountIndex": index,
        "mint": mint,
        "owner": owner,
        "programId": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
        "uiTokenAmount": {
            "uiAmount": amount as f64 / 1_000_000.0,
            "decimals": 6,
            "amount": amount.to_string(),
            "uiAmountString": (amount as f64 / 1_000_000.0).to_string()
        }
    })
}
