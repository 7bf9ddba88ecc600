//! Conversion of RPC transaction payloads into [`ObservedTransaction`].
//!
//! Account keys arrive either as plain strings (raw messages, plus loaded
//! addresses in the metadata) or as parsed-account objects. Both shapes are
//! reduced to [`AccountId`] here and nowhere else. Malformed individual records
//! are skipped, never fatal.

use crate::detection::types::{AccountEntry, ObservedTransaction, TokenBalanceRecord};
use crate::types::AccountId;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiMessage,
    UiTransactionTokenBalance,
};
use tracing::{debug, warn};

struct RawKey<'a> {
    key: &'a str,
    signer: bool,
}

/// Normalize a resolved transaction.
///
/// Returns `None` for transactions without execution metadata, failed
/// transactions and non-JSON encodings.
pub fn normalize_transaction(
    encoded: &EncodedConfirmedTransactionWithStatusMeta,
) -> Option<ObservedTransaction> {
    let Some(meta) = encoded.transaction.meta.as_ref() else {
        debug!("Transaction has no metadata, discarding");
        return None;
    };

    if let Some(err) = &meta.err {
        debug!("Transaction failed on chain ({:?}), discarding", err);
        return None;
    }

    let ui_transaction = match &encoded.transaction.transaction {
        EncodedTransaction::Json(tx) => tx,
        _ => {
            warn!("Transaction not in JSON format");
            return None;
        }
    };

    let Some(signature) = ui_transaction.signatures.first().cloned() else {
        warn!("No signature found");
        return None;
    };

    let mut raw_keys: Vec<RawKey<'_>> = match &ui_transaction.message {
        UiMessage::Parsed(message) => message
            .account_keys
            .iter()
            .map(|account| RawKey {
                key: account.pubkey.as_str(),
                signer: account.signer,
            })
            .collect(),
        UiMessage::Raw(message) => {
            let signers = message.header.num_required_signatures as usize;
            message
                .account_keys
                .iter()
                .enumerate()
                .map(|(index, key)| RawKey {
                    key: key.as_str(),
                    signer: index < signers,
                })
                .collect()
        }
    };

    // Raw v0 messages list lookup-table addresses only in the metadata
    if matches!(ui_transaction.message, UiMessage::Raw(_)) {
        if let OptionSerializer::Some(loaded) = &meta.loaded_addresses {
            raw_keys.extend(
                loaded
                    .writable
                    .iter()
                    .chain(loaded.readonly.iter())
                    .map(|key| RawKey {
                        key: key.as_str(),
                        signer: false,
                    }),
            );
        }
    }

    let accounts = raw_keys
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| match AccountId::parse(raw.key) {
            Some(id) => Some(AccountEntry {
                id,
                signer: raw.signer,
                pre_lamports: meta.pre_balances.get(index).copied().unwrap_or(0),
                post_lamports: meta.post_balances.get(index).copied().unwrap_or(0),
            }),
            None => {
                debug!("Skipping malformed account key at index {}: {}", index, raw.key);
                None
            }
        })
        .collect();

    Some(ObservedTransaction {
        signature,
        slot: encoded.slot,
        block_time: encoded.block_time,
        accounts,
        pre_token_balances: token_records(&meta.pre_token_balances),
        post_token_balances: token_records(&meta.post_token_balances),
    })
}

fn token_records(
    balances: &OptionSerializer<Vec<UiTransactionTokenBalance>>,
) -> Vec<TokenBalanceRecord> {
    match balances {
        OptionSerializer::Some(balances) => balances.iter().filter_map(token_record).collect(),
        OptionSerializer::None | OptionSerializer::Skip => Vec::new(),
    }
}

fn token_record(balance: &UiTransactionTokenBalance) -> Option<TokenBalanceRecord> {
    let Some(mint) = AccountId::parse(&balance.mint) else {
        debug!("Skipping token balance with invalid mint: {}", balance.mint);
        return None;
    };

    let amount = match balance.ui_token_amount.amount.parse::<u64>() {
        Ok(amount) => amount,
        Err(e) => {
            debug!(
                "Skipping token balance with invalid amount {:?}: {}",
                balance.ui_token_amount.amount, e
            );
            return None;
        }
    };

    let owner = match &balance.owner {
        OptionSerializer::Some(owner) => AccountId::parse(owner),
        _ => None,
    };

    Some(TokenBalanceRecord {
        account_index: balance.account_index,
        mint,
        owner,
        amount,
        decimals: balance.ui_token_amount.decimals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::fixtures::{TxFixture, key};
    use serde_json::json;

    #[test]
    fn test_parsed_message_normalization() {
        let signer = key();
        let other = key();
        let mint = key();

        let fixture = TxFixture::new()
            .account(&signer, true, 5_000_000_000, 3_000_000_000)
            .account(&other, false, 10, 10)
            .pre_token(2, &mint, &signer, 0)
            .post_token(2, &mint, &signer, 1_000_000);

        let tx = normalize_transaction(&fixture.encoded()).unwrap();
        assert_eq!(tx.signature, fixture.signature);
        assert_eq!(tx.accounts.len(), 2);
        assert!(tx.accounts[0].signer);
        assert_eq!(tx.accounts[0].pre_lamports, 5_000_000_000);
        assert_eq!(tx.accounts[0].post_lamports, 3_000_000_000);
        assert_eq!(tx.post_token_balances[0].amount, 1_000_000);
        assert_eq!(
            tx.post_token_balances[0].owner.as_ref().map(AccountId::as_str),
            Some(signer.as_str())
        );
    }

    #[test]
    fn test_malformed_key_keeps_balance_alignment() {
        let signer = key();
        let after = key();

        let fixture = TxFixture::new()
            .account(&signer, true, 100, 50)
            .account("definitely-not-base58!", false, 1, 2)
            .account(&after, false, 7, 9);

        let tx = normalize_transaction(&fixture.encoded()).unwrap();
        assert_eq!(tx.accounts.len(), 2);
        assert_eq!(tx.accounts[1].id.as_str(), after);
        assert_eq!(tx.accounts[1].pre_lamports, 7);
        assert_eq!(tx.accounts[1].post_lamports, 9);
    }

    #[test]
    fn test_malformed_token_record_is_skipped() {
        let signer = key();
        let mint = key();

        let fixture = TxFixture::new()
            .account(&signer, true, 100, 50)
            .pre_token(1, "bad mint", &signer, 5)
            .pre_token(1, &mint, &signer, 5);

        let tx = normalize_transaction(&fixture.encoded()).unwrap();
        assert_eq!(tx.pre_token_balances.len(), 1);
        assert_eq!(tx.pre_token_balances[0].mint.as_str(), mint);
    }

    #[test]
    fn test_failed_transaction_discarded() {
        let fixture = TxFixture::new().account(&key(), true, 100, 50).failed();
        assert!(normalize_transaction(&fixture.encoded()).is_none());
    }

    #[test]
    fn test_missing_meta_discarded() {
        let mut encoded = TxFixture::new().account(&key(), true, 100, 50).encoded();
        encoded.transaction.meta = None;
        assert!(normalize_transaction(&encoded).is_none());
    }

    #[test]
    fn test_raw_message_with_loaded_addresses() {
        let signer = key();
        let program = key();
        let loaded = key();

        let value = json!({
            "slot": 42,
            "blockTime": 1_700_000_000,
            "transaction": {
                "signatures": ["raw-sig"],
                "message": {
                    "header": {
                        "numRequiredSignatures": 1,
                        "numReadonlySignedAccounts": 0,
                        "numReadonlyUnsignedAccounts": 1
                    },
                    "accountKeys": [signer, program],
                    "recentBlockhash": "11111111111111111111111111111111",
                    "instructions": []
                }
            },
            "meta": {
                "err": null,
                "status": { "Ok": null },
                "fee": 5000,
                "preBalances": [2_000_000_000u64, 1, 30],
                "postBalances": [1_000_000_000u64, 1, 31],
                "loadedAddresses": { "writable": [loaded], "readonly": [] }
            }
        });
        let encoded: EncodedConfirmedTransactionWithStatusMeta =
            serde_json::from_value(value).unwrap();

        let tx = normalize_transaction(&encoded).unwrap();
        assert_eq!(tx.slot, 42);
        assert_eq!(tx.accounts.len(), 3);
        assert!(tx.accounts[0].signer);
        assert!(!tx.accounts[1].signer);
        assert_eq!(tx.accounts[2].id.as_str(), loaded);
        assert_eq!(tx.accounts[2].post_lamports, 31);
    }
}
